use agentgate_core::{AgentClient, ClientError, Message};
use futures::stream::{Stream, StreamExt};
use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::SessionError;

/// Exclusive access to a session's client for the duration of one query.
///
/// Holds the session lock until dropped, so a second query on the same
/// session waits until the first response (streamed or buffered) is drained.
/// Closing the session interrupts the query instead of waiting for it.
pub struct SessionLease {
    client_guard: OwnedMutexGuard<Box<dyn AgentClient>>,
    closing: CancellationToken,
    session_id: String,
    request_id: String,
}

impl SessionLease {
    pub(super) fn new(
        client_guard: OwnedMutexGuard<Box<dyn AgentClient>>,
        closing: CancellationToken,
        session_id: String,
        request_id: String,
    ) -> Self {
        Self {
            client_guard,
            closing,
            session_id,
            request_id,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Send a prompt, giving up with `NotFound` if the session is closed meanwhile
    pub async fn submit(&mut self, prompt: &str) -> Result<(), SessionError> {
        tokio::select! {
            biased;
            _ = self.closing.cancelled() => Err(SessionError::NotFound),
            sent = self.client_guard.send(prompt) => sent.map_err(SessionError::from),
        }
    }

    /// Drain the current turn, keeping the lease alive until the stream ends
    /// or is dropped. The stream stops after the first error, and ends with
    /// `ClientError::Closed` if the session is closed mid-turn.
    pub fn into_turn(mut self) -> impl Stream<Item = Result<Message, ClientError>> + Send + 'static {
        async_stream::stream! {
            let closing = self.closing.clone();
            let mut messages = self.client_guard.receive();
            loop {
                let item = tokio::select! {
                    biased;
                    _ = closing.cancelled() => Some(Err(ClientError::Closed)),
                    item = messages.next() => item,
                };
                let Some(item) = item else {
                    break;
                };

                let failed = item.is_err();
                yield item;
                if failed {
                    break;
                }
            }

            // Release the lock as soon as the turn is over
            drop(messages);
            drop(self);
        }
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        debug!("[{}] - [{}] Releasing session lock", self.request_id, self.session_id);
    }
}
