use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};
use tracing::warn;

use crate::{AgentOptions, ClientError, Message};

/// Lazy, single-pass sequence of messages for one turn
pub type MessageStream<'a> = BoxStream<'a, Result<Message, ClientError>>;

/// Capability interface over a conversational agent.
///
/// A client is an owned resource: whoever holds it is responsible for
/// calling `close` once it is no longer needed.
#[async_trait]
pub trait AgentClient: Send {
    /// Start the agent. Must succeed before `send` is called.
    async fn open(&mut self) -> Result<(), ClientError>;

    /// Submit one user turn
    async fn send(&mut self, prompt: &str) -> Result<(), ClientError>;

    /// Messages answering the last prompt. The stream ends after the
    /// turn's terminal message or on the first error.
    fn receive(&mut self) -> MessageStream<'_>;

    /// Stop the agent. Calling it twice is a no-op.
    async fn close(&mut self) -> Result<(), ClientError>;
}

/// Builds unopened clients from request options
pub trait ClientFactory: Send + Sync {
    fn create(&self, options: AgentOptions) -> Box<dyn AgentClient>;
}

/// Run a single prompt on a fresh client, closing it afterwards.
///
/// Open and send failures are reported as the first (and only) item of the
/// stream. Dropping the stream early drops the client without closing it.
pub fn one_shot(
    mut client: Box<dyn AgentClient>,
    prompt: String,
) -> impl Stream<Item = Result<Message, ClientError>> + Send + 'static {
    async_stream::stream! {
        let started = match client.open().await {
            Ok(()) => client.send(&prompt).await,
            Err(e) => Err(e),
        };

        if let Err(e) = started {
            if let Err(close_err) = client.close().await {
                warn!("Failed to close one-shot client: {}", close_err);
            }
            yield Err(e);
            return;
        }

        {
            let mut messages = client.receive();
            while let Some(item) = messages.next().await {
                let failed = item.is_err();
                yield item;
                if failed {
                    break;
                }
            }
        }

        if let Err(e) = client.close().await {
            warn!("Failed to close one-shot client: {}", e);
        }
    }
}
