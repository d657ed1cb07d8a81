use std::net::SocketAddr;
use std::str::FromStr;

use newsgraph_api::Server;
use newsgraph_core::config::Settings;
use secrecy::SecretString;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("newsgraph={},tower_http=info", settings.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let llm_api_key = SecretString::from(std::env::var("LLM_API_KEY").unwrap_or_default());
    let addr = SocketAddr::from_str(&format!("{}:{}", settings.server_host, settings.server_port))
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], settings.server_port)));

    let server = Server::new(&settings, llm_api_key, addr)?;
    server.run().await
}
