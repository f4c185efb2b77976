use agentgate_core::{AgentClient, AgentOptions, ClientError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{SessionError, SessionLease};

/// A live session - one opened agent client addressed by id.
/// The registry is the only owner allowed to close it.
pub struct AgentSession {
    client: Arc<Mutex<Box<dyn AgentClient>>>,
    closing: CancellationToken,
    pub session_id: String,
    pub options: AgentOptions,
    pub created_at: DateTime<Utc>,
}

impl AgentSession {
    pub(super) fn new(client: Box<dyn AgentClient>, options: AgentOptions, session_id: String) -> Self {
        Self {
            client: Arc::new(Mutex::new(client)),
            closing: CancellationToken::new(),
            session_id,
            options,
            created_at: Utc::now(),
        }
    }

    /// Wait for exclusive use of the client.
    /// Fails with `NotFound` once the session is being closed.
    pub async fn lease(&self, http_request_id: &str) -> Result<SessionLease, SessionError> {
        debug!("[{}] - [{}] Acquiring session lock", http_request_id, self.session_id);
        let guard = tokio::select! {
            biased;
            _ = self.closing.cancelled() => None,
            guard = self.client.clone().lock_owned() => Some(guard),
        };

        match guard {
            Some(guard) if !self.closing.is_cancelled() => {
                debug!("[{}] - [{}] Session lock acquired", http_request_id, self.session_id);
                Ok(SessionLease::new(
                    guard,
                    self.closing.clone(),
                    self.session_id.clone(),
                    http_request_id.to_string(),
                ))
            }
            _ => {
                debug!("[{}] - [{}] Session closed while waiting", http_request_id, self.session_id);
                Err(SessionError::NotFound)
            }
        }
    }

    /// Close the underlying client. An in-flight query is cut short
    /// rather than waited for.
    pub(super) async fn close(&self) -> Result<(), ClientError> {
        self.closing.cancel();
        let mut client = self.client.lock().await;
        client.close().await
    }
}
