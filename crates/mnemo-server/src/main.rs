//! mnemo-server binary: config load plus the management API.

use anyhow::Context;
use clap::Parser;
use mnemo_config::MnemoConfig;
use std::path::PathBuf;

/// Command-line options for the management server.
#[derive(Parser)]
#[command(name = "mnemo-server", version)]
struct Cli {
    /// Optional path to a mnemo.json5 config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the bind address from the config file
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => mnemo_config::load_from_path(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => MnemoConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }

    mnemo_server::serve(config).await
}
