use agentgate_core::{ClientError, Message};
use axum::response::{
    sse::{Event, Sse},
    IntoResponse, Response,
};
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tracing::{debug, error};

/// One event of a streamed response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    Message { content: String },
    Done,
    Error { error: String },
}

/// Logical outcome carried on every frame when enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pending,
    Success,
    Error,
}

/// Wire layout of frames
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FrameFormat {
    /// `{"type": ...}` frames only; consumers learn the outcome from the terminal frame
    #[default]
    Compat,
    /// Every frame also carries an `outcome` field
    WithOutcome,
}

#[derive(Serialize)]
struct WireFrame<'a> {
    #[serde(flatten)]
    frame: &'a Frame,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<Outcome>,
}

impl Frame {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Frame::Message { .. })
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            Frame::Message { .. } => Outcome::Pending,
            Frame::Done => Outcome::Success,
            Frame::Error { .. } => Outcome::Error,
        }
    }

    /// JSON text placed in the `data:` field
    pub fn to_json(&self, format: FrameFormat) -> String {
        let wire = WireFrame {
            frame: self,
            outcome: match format {
                FrameFormat::Compat => None,
                FrameFormat::WithOutcome => Some(self.outcome()),
            },
        };
        serde_json::to_string(&wire).unwrap_or_else(|e| {
            error!("Failed to serialize frame: {}", e);
            r#"{"type":"error","error":"failed to serialize frame"}"#.to_string()
        })
    }
}

/// Turn a message stream into frames: one `message` frame per message, then
/// exactly one `done` or `error` frame. Nothing follows the terminal frame.
pub fn message_frames<S>(messages: S, label: String) -> impl Stream<Item = Frame> + Send + 'static
where
    S: Stream<Item = Result<Message, ClientError>> + Send + 'static,
{
    futures::stream::unfold((messages.boxed(), false), move |(mut rx, done)| {
        let label = label.clone();
        async move {
            if done {
                return None;
            }

            let frame = match rx.next().await {
                Some(Ok(message)) => Frame::Message {
                    content: message.to_string(),
                },
                Some(Err(e)) => {
                    error!("[{}] Upstream error mid-stream: {}", label, e);
                    Frame::Error {
                        error: e.to_string(),
                    }
                }
                None => {
                    debug!("[{}] Stream completed", label);
                    Frame::Done
                }
            };

            let done = frame.is_terminal();
            Some((frame, (rx, done)))
        }
    })
}

/// Build an SSE stream from a message stream
pub fn event_stream<S>(
    messages: S,
    format: FrameFormat,
    label: String,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static
where
    S: Stream<Item = Result<Message, ClientError>> + Send + 'static,
{
    message_frames(messages, label).map(move |frame| Ok(Event::default().data(frame.to_json(format))))
}

/// Streamed mode: the status line is sent before the first message
pub fn sse_response<S>(messages: S, format: FrameFormat, label: String) -> Response
where
    S: Stream<Item = Result<Message, ClientError>> + Send + 'static,
{
    Sse::new(event_stream(messages, format, label)).into_response()
}

/// Buffered mode: drain everything, or fail as a whole
pub async fn collect_messages<S>(messages: S) -> Result<Vec<String>, ClientError>
where
    S: Stream<Item = Result<Message, ClientError>>,
{
    let mut messages = std::pin::pin!(messages);
    let mut collected = Vec::new();
    while let Some(item) = messages.next().await {
        collected.push(item?.to_string());
    }
    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use serde_json::json;

    fn msg(text: &str) -> Result<Message, ClientError> {
        Ok(Message::new(json!({ "type": "assistant", "content": text })))
    }

    #[tokio::test]
    async fn normal_completion_ends_with_done() {
        let frames: Vec<_> = message_frames(stream::iter(vec![msg("a"), msg("b")]), "t".into())
            .collect()
            .await;

        assert_eq!(frames.len(), 3);
        assert!(matches!(frames[0], Frame::Message { .. }));
        assert!(matches!(frames[1], Frame::Message { .. }));
        assert_eq!(frames[2], Frame::Done);
    }

    #[tokio::test]
    async fn error_is_terminal_and_exclusive() {
        let upstream = stream::iter(vec![
            msg("a"),
            Err(ClientError::Upstream("boom".into())),
            msg("never"),
        ]);
        let frames: Vec<_> = message_frames(upstream, "t".into()).collect().await;

        assert_eq!(frames.len(), 2);
        assert_eq!(
            frames[1],
            Frame::Error {
                error: "boom".into()
            }
        );
        assert!(!frames.contains(&Frame::Done));
    }

    #[tokio::test]
    async fn empty_upstream_yields_only_done() {
        let frames: Vec<_> = message_frames(stream::iter(Vec::new()), "t".into()).collect().await;
        assert_eq!(frames, vec![Frame::Done]);
    }

    #[test]
    fn frame_json_layouts() {
        let message = Frame::Message {
            content: "x".into(),
        };
        assert_eq!(message.to_json(FrameFormat::Compat), r#"{"type":"message","content":"x"}"#);
        assert_eq!(Frame::Done.to_json(FrameFormat::Compat), r#"{"type":"done"}"#);
        assert_eq!(
            Frame::Error { error: "e".into() }.to_json(FrameFormat::Compat),
            r#"{"type":"error","error":"e"}"#
        );
        assert_eq!(
            message.to_json(FrameFormat::WithOutcome),
            r#"{"type":"message","content":"x","outcome":"pending"}"#
        );
        assert_eq!(
            Frame::Done.to_json(FrameFormat::WithOutcome),
            r#"{"type":"done","outcome":"success"}"#
        );
    }

    #[tokio::test]
    async fn buffered_mode_fails_whole_request() {
        let ok = collect_messages(stream::iter(vec![msg("a"), msg("b")])).await.unwrap();
        assert_eq!(ok.len(), 2);
        assert!(ok[0].contains("\"a\""));

        let err = collect_messages(stream::iter(vec![msg("a"), Err(ClientError::Upstream("x".into()))]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "x");
    }
}
