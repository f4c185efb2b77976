mod lifecycle;
mod registry;
mod session;

pub use lifecycle::SessionLease;
pub use registry::{RegistryConfig, SessionRegistry};
pub use session::AgentSession;

use agentgate_core::ClientError;
use thiserror::Error;

/// Failures of registry operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found")]
    NotFound,

    /// The client could not be constructed or opened
    #[error("{0}")]
    ClientInit(#[source] ClientError),

    #[error("Maximum number of sessions reached: {0}")]
    LimitReached(usize),

    /// The client failed while serving a query
    #[error("{0}")]
    Client(#[from] ClientError),
}
