use clap::Parser;
use tracing_subscriber::EnvFilter;

use athenaviz_server::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    athenaviz_core::config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    cli::run(Cli::parse()).await
}
