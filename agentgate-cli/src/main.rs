mod cli;

use std::sync::Arc;

use agentgate_core::ClaudeCliFactory;
use agentgate_http::{start_server, ServerConfig};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;

/// Initialize the tracing subscriber with the given default log level.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.effective_log_level());
    tracing::debug!("Parsed arguments: {:?}", cli);

    let config = ServerConfig::new(cli.host.clone(), cli.port)
        .with_reload(cli.reload)
        .with_max_sessions(cli.max_sessions)
        .with_frame_outcome(cli.frame_outcome);
    let factory = ClaudeCliFactory::new().with_cli_path(cli.claude_path.clone());

    start_server(config, Arc::new(factory)).await
}
