//! Programmable clients for exercising the gateway without a real agent.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::{AgentClient, AgentOptions, ClientError, ClientFactory, Message, MessageStream};

#[derive(Debug, Default)]
struct ProbeState {
    created: usize,
    opened: usize,
    closed: usize,
    prompts: Vec<String>,
    options: Vec<AgentOptions>,
}

/// Shared view of what scripted clients have been asked to do
#[derive(Debug, Clone, Default)]
pub struct Probe(Arc<Mutex<ProbeState>>);

impl Probe {
    fn with<R>(&self, f: impl FnOnce(&mut ProbeState) -> R) -> R {
        let mut state = self.0.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    pub fn created(&self) -> usize {
        self.with(|s| s.created)
    }

    pub fn opened(&self) -> usize {
        self.with(|s| s.opened)
    }

    pub fn close_calls(&self) -> usize {
        self.with(|s| s.closed)
    }

    pub fn closed(&self) -> bool {
        self.close_calls() > 0
    }

    pub fn prompts(&self) -> Vec<String> {
        self.with(|s| s.prompts.clone())
    }

    pub fn options(&self) -> Vec<AgentOptions> {
        self.with(|s| s.options.clone())
    }
}

/// What a scripted client does on each call
#[derive(Debug, Clone, Default)]
pub struct Script {
    replies: Vec<String>,
    fail_open: Option<String>,
    fail_send: Option<String>,
    fail_close: Option<String>,
    fail_after: Option<(usize, String)>,
    delay: Option<Duration>,
    hang: bool,
    probe: Probe,
}

impl Script {
    /// Every turn answers with one `assistant` message per reply
    pub fn replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: replies.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn fail_open(mut self, error: impl Into<String>) -> Self {
        self.fail_open = Some(error.into());
        self
    }

    pub fn fail_send(mut self, error: impl Into<String>) -> Self {
        self.fail_send = Some(error.into());
        self
    }

    pub fn fail_close(mut self, error: impl Into<String>) -> Self {
        self.fail_close = Some(error.into());
        self
    }

    /// Emit `count` replies, then fail the stream
    pub fn fail_after(mut self, count: usize, error: impl Into<String>) -> Self {
        self.fail_after = Some((count, error.into()));
        self
    }

    /// Wait this long before each reply
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Never finish a turn: after the replies the stream stays pending
    pub fn hang(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn probe(&self) -> Probe {
        self.probe.clone()
    }

    /// The message a scripted client emits for `reply`
    pub fn message_for(reply: &str) -> Message {
        Message::new(json!({ "type": "assistant", "content": reply }))
    }
}

pub struct ScriptedClient {
    script: Script,
    open: bool,
}

impl ScriptedClient {
    pub fn new(script: Script) -> Self {
        script.probe.with(|s| s.created += 1);
        Self {
            script,
            open: false,
        }
    }
}

#[async_trait]
impl AgentClient for ScriptedClient {
    async fn open(&mut self) -> Result<(), ClientError> {
        if let Some(error) = &self.script.fail_open {
            return Err(ClientError::Upstream(error.clone()));
        }
        self.open = true;
        self.script.probe.with(|s| s.opened += 1);
        Ok(())
    }

    async fn send(&mut self, prompt: &str) -> Result<(), ClientError> {
        if !self.open {
            return Err(ClientError::NotOpen);
        }
        if let Some(error) = &self.script.fail_send {
            return Err(ClientError::Upstream(error.clone()));
        }
        self.script.probe.with(|s| s.prompts.push(prompt.to_string()));
        Ok(())
    }

    fn receive(&mut self) -> MessageStream<'_> {
        if !self.open {
            return stream::once(async { Err(ClientError::NotOpen) }).boxed();
        }

        let mut items: Vec<Result<Message, ClientError>> = self
            .script
            .replies
            .iter()
            .map(|r| Ok(Script::message_for(r)))
            .collect();

        if let Some((count, error)) = &self.script.fail_after {
            items.truncate(*count);
            items.push(Err(ClientError::Upstream(error.clone())));
        }

        let replies = match self.script.delay {
            Some(delay) => stream::iter(items)
                .then(move |item| async move {
                    tokio::time::sleep(delay).await;
                    item
                })
                .boxed(),
            None => stream::iter(items).boxed(),
        };

        if self.script.hang {
            replies.chain(stream::pending()).boxed()
        } else {
            replies
        }
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.open = false;
        self.script.probe.with(|s| s.closed += 1);
        match &self.script.fail_close {
            Some(error) => Err(ClientError::Upstream(error.clone())),
            None => Ok(()),
        }
    }
}

/// Hands out scripted clients that all report to the same probe
#[derive(Debug, Clone, Default)]
pub struct ScriptedFactory {
    script: Script,
}

impl ScriptedFactory {
    pub fn new(script: Script) -> Self {
        Self { script }
    }

    pub fn probe(&self) -> Probe {
        self.script.probe()
    }
}

impl ClientFactory for ScriptedFactory {
    fn create(&self, options: AgentOptions) -> Box<dyn AgentClient> {
        self.script.probe.with(|s| s.options.push(options));
        Box::new(ScriptedClient::new(self.script.clone()))
    }
}
