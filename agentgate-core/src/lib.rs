pub mod client;
pub mod claude;
pub mod error;
pub mod message;
pub mod options;

#[cfg(any(test, feature = "test-util"))]
pub mod scripted;

pub use client::{one_shot, AgentClient, ClientFactory, MessageStream};
pub use claude::{ClaudeCliClient, ClaudeCliFactory};
pub use error::ClientError;
pub use message::Message;
pub use options::{AgentOptions, PermissionMode};
