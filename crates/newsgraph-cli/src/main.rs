use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use newsgraph_core::config::Settings;
use newsgraph_llm::TEMPLATE_NAMES;
use secrecy::SecretString;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "newsgraph")]
#[command(about = "News/document knowledge-graph extraction engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Boot the HTTP surface (spec.md §4.12)
    Serve,

    /// Configuration inspection
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Prompt template inspection
    #[command(subcommand)]
    Prompts(PromptsCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Load settings from the environment and report whether they validate
    Check,
}

#[derive(Subcommand)]
enum PromptsCommands {
    /// List the four named prompt templates
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve => serve().await,
        Commands::Config(ConfigCommands::Check) => config_check(),
        Commands::Prompts(PromptsCommands::List) => {
            prompts_list();
            Ok(())
        }
    }
}

async fn serve() -> Result<()> {
    let settings = Settings::from_env().context("failed to load settings")?;

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

    let server = newsgraph_api::Server::new(&settings, llm_api_key, addr)?;
    server.run().await
}

fn config_check() -> Result<()> {
    match Settings::from_env() {
        Ok(settings) => {
            println!("{}", "configuration OK".green().bold());
            println!("  {}: {}", "llm_model_id".cyan(), settings.llm_model_id);
            println!("  {}: {}", "directory_url".cyan(), settings.directory_url);
            println!("  {}: {}", "working_language".cyan(), settings.working_language);
            println!(
                "  {}: {}",
                "async_processing_threshold_chars".cyan(),
                settings.async_processing_threshold_chars
            );
            println!("  {}: {}", "job_retention_minutes".cyan(), settings.job_retention_minutes);
            println!("  {}: {}", "max_retries".cyan(), settings.max_retries);
            println!("  {}: {}", "log_level".cyan(), settings.log_level);
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {e}", "configuration invalid:".red().bold());
            std::process::exit(1);
        }
    }
}

fn prompts_list() {
    for name in TEMPLATE_NAMES {
        println!("{}", name.cyan());
    }
}
