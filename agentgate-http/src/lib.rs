pub mod http;
pub mod apis;
pub mod error;
pub mod session;
pub mod streaming;

pub use error::{ApiJson, ErrorResponse};
pub use session::{AgentSession, RegistryConfig, SessionError, SessionLease, SessionRegistry};
pub use streaming::{collect_messages, event_stream, message_frames, sse_response, Frame, FrameFormat, Outcome};
pub use http::{router, start_server, ServerConfig, ServerState};
