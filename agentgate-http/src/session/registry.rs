use agentgate_core::{AgentOptions, ClientFactory};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{AgentSession, SessionError};

/// Configuration for the session registry
#[derive(Clone, Debug, Default)]
pub struct RegistryConfig {
    /// Maximum number of live sessions (None = unlimited)
    pub max_sessions: Option<usize>,
}

/// Session registry - owns every live agent client by session id.
/// It is the only path through which session clients are closed.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<AgentSession>>>,
    factory: Arc<dyn ClientFactory>,
    max_sessions: Option<usize>,
}

impl SessionRegistry {
    pub fn new(factory: Arc<dyn ClientFactory>, config: RegistryConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            factory,
            max_sessions: config.max_sessions,
        }
    }

    fn check_capacity(&self, live: usize) -> Result<(), SessionError> {
        match self.max_sessions {
            Some(max) if live >= max => Err(SessionError::LimitReached(max)),
            _ => Ok(()),
        }
    }

    /// Build and open a client, then register it under a fresh id
    pub async fn create(
        &self,
        http_request_id: &str,
        options: AgentOptions,
    ) -> Result<String, SessionError> {
        self.check_capacity(self.sessions.lock().await.len())?;

        // Opening may be slow; the map stays unlocked meanwhile
        let mut client = self.factory.create(options.clone());
        client.open().await.map_err(|e| {
            error!("[{}] Failed to open agent client: {}", http_request_id, e);
            SessionError::ClientInit(e)
        })?;

        let mut sessions = self.sessions.lock().await;
        if let Err(e) = self.check_capacity(sessions.len()) {
            drop(sessions);
            if let Err(close_err) = client.close().await {
                warn!("[{}] Failed to close surplus client: {}", http_request_id, close_err);
            }
            return Err(e);
        }

        let mut session_id = Uuid::new_v4().to_string();
        while sessions.contains_key(&session_id) {
            session_id = Uuid::new_v4().to_string();
        }

        let session = AgentSession::new(client, options, session_id.clone());
        sessions.insert(session_id.clone(), Arc::new(session));
        info!("[{}] - [{}] Session created ({} live)", http_request_id, session_id, sessions.len());

        Ok(session_id)
    }

    /// Look up a live session
    pub async fn get(&self, session_id: &str) -> Option<Arc<AgentSession>> {
        self.sessions.lock().await.get(session_id).cloned()
    }

    /// Remove a session and close its client. Returns whether it existed.
    /// The entry is gone even if the client fails to close.
    pub async fn close(&self, session_id: &str) -> bool {
        let Some(session) = self.sessions.lock().await.remove(session_id) else {
            return false;
        };

        info!("[] - [{}] Closing session", session_id);
        if let Err(e) = session.close().await {
            warn!("[] - [{}] Client did not close cleanly: {}", session_id, e);
        }
        true
    }

    /// Close every live session, independently of one another
    pub async fn close_all(&self) {
        let ids = self.list().await;
        info!("Closing {} session(s)", ids.len());
        for session_id in ids {
            self.close(&session_id).await;
        }
    }

    /// Ids of live sessions, oldest first
    pub async fn list(&self) -> Vec<String> {
        let sessions = self.sessions.lock().await;
        let mut live: Vec<_> = sessions.values().collect();
        live.sort_by_key(|s| s.created_at);
        live.into_iter().map(|s| s.session_id.clone()).collect()
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
