//! Command line arguments for the gateway binary.

use clap::Parser;
use std::path::PathBuf;

/// HTTP gateway exposing an agent CLI as a REST + SSE API
#[derive(Debug, Parser)]
#[command(name = "agentgate", version, about)]
pub struct Cli {
    /// Host to bind to
    #[arg(long, env = "AGENTGATE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind to
    #[arg(long, short, env = "AGENTGATE_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Development mode: reusable port for `cargo watch` restarts, debug logging
    #[arg(long)]
    pub reload: bool,

    /// Maximum number of live sessions
    #[arg(long, env = "AGENTGATE_MAX_SESSIONS")]
    pub max_sessions: Option<usize>,

    /// Add an `outcome` field to every streamed frame
    #[arg(long)]
    pub frame_outcome: bool,

    /// Agent CLI binary used when a request does not set `cli_path`
    #[arg(long, env = "AGENTGATE_CLAUDE_PATH")]
    pub claude_path: Option<PathBuf>,

    /// Default log level, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Log level after taking development mode into account
    pub fn effective_log_level(&self) -> &str {
        if self.reload {
            "debug"
        } else {
            &self.log_level
        }
    }
}
