use thiserror::Error;

/// Errors raised by an agent client
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("failed to start agent process `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("client is not open")]
    NotOpen,

    #[error("client was closed before the response completed")]
    Closed,

    #[error("agent process exited before the response completed")]
    ProcessExited,

    #[error("i/o error talking to agent: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed message from agent: {0}")]
    Protocol(String),

    #[error("{0}")]
    Upstream(String),
}
