use std::net::SocketAddr;

use newsgraph_core::config::Settings;
use secrecy::SecretString;
use tokio::signal;
use tracing::info;

use crate::routes::create_router;
use crate::state::AppState;

pub struct Server {
    state: AppState,
    addr: SocketAddr,
}

impl Server {
    pub fn new(settings: &Settings, llm_api_key: SecretString, addr: SocketAddr) -> anyhow::Result<Self> {
        let state = AppState::from_settings(settings, llm_api_key)?;
        Ok(Self { state, addr })
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let router = create_router(self.state);

        info!("starting extraction engine API on {}", self.addr);
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!("listening on http://{}", self.addr);
        info!("  POST /process_article");
        info!("  POST /process_fragment");
        info!("  GET  /status/:job_id");
        info!("  GET  /health");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received ctrl+c, shutting down gracefully");
        },
        _ = terminate => {
            info!("received sigterm, shutting down gracefully");
        },
    }
}
