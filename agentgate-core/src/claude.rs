use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::json;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{AgentClient, AgentOptions, ClientError, ClientFactory, Message, MessageStream};

const DEFAULT_PROGRAM: &str = "claude";

/// How long `close` waits for the CLI to exit after stdin is closed
const CLOSE_GRACE: Duration = Duration::from_secs(5);

struct ClaudeProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
    stderr_task: JoinHandle<()>,
    /// Prompts sent whose `result` line has not been read yet
    unanswered: usize,
}

impl ClaudeProcess {
    /// Discard what is left of turns whose readers stopped early, so the
    /// next line read belongs to the most recent prompt
    async fn skip_stale_turns(&mut self) -> Result<(), ClientError> {
        let mut skipped = 0usize;
        while self.unanswered > 1 {
            let Some(line) = self.stdout.next_line().await? else {
                return Err(ClientError::ProcessExited);
            };
            skipped += 1;
            if Message::parse_line(line.trim()).is_ok_and(|m| m.is_result()) {
                self.unanswered -= 1;
            }
        }
        if skipped > 0 {
            debug!("Skipped {} line(s) left over from an unfinished turn", skipped);
        }
        Ok(())
    }
}

/// Agent client driving the `claude` CLI over stream-json stdio
pub struct ClaudeCliClient {
    options: AgentOptions,
    default_program: Option<PathBuf>,
    process: Option<ClaudeProcess>,
}

impl ClaudeCliClient {
    pub fn new(options: AgentOptions) -> Self {
        Self {
            options,
            default_program: None,
            process: None,
        }
    }

    fn program(&self) -> PathBuf {
        self.options
            .cli_path
            .clone()
            .or_else(|| self.default_program.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROGRAM))
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(self.program());
        cmd.arg("--output-format")
            .arg("stream-json")
            .arg("--input-format")
            .arg("stream-json")
            .arg("--verbose")
            .args(self.options.to_cli_args())
            .envs(&self.options.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(cwd) = &self.options.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }
}

#[async_trait]
impl AgentClient for ClaudeCliClient {
    async fn open(&mut self) -> Result<(), ClientError> {
        if self.process.is_some() {
            return Ok(());
        }

        let program = self.program().display().to_string();
        let mut child = self
            .command()
            .spawn()
            .map_err(|source| ClientError::Spawn {
                program: program.clone(),
                source,
            })?;

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            let _ = child.kill().await;
            return Err(ClientError::Protocol("agent stdio was not piped".to_string()));
        };

        let pid = child.id().unwrap_or_default();
        info!("[{}] Agent process started (pid {})", program, pid);

        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("[pid {}] stderr: {}", pid, line);
            }
        });

        self.process = Some(ClaudeProcess {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout).lines(),
            stderr_task,
            unanswered: 0,
        });
        Ok(())
    }

    async fn send(&mut self, prompt: &str) -> Result<(), ClientError> {
        let process = self.process.as_mut().ok_or(ClientError::NotOpen)?;
        let stdin = process.stdin.as_mut().ok_or(ClientError::NotOpen)?;

        let envelope = json!({
            "type": "user",
            "message": { "role": "user", "content": prompt },
            "parent_tool_use_id": null,
            "session_id": "default",
        });
        let mut line = envelope.to_string();
        line.push('\n');

        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        process.unanswered += 1;
        Ok(())
    }

    fn receive(&mut self) -> MessageStream<'_> {
        let Some(process) = self.process.as_mut() else {
            return stream::once(async { Err(ClientError::NotOpen) }).boxed();
        };

        let messages = async_stream::stream! {
            if let Err(e) = process.skip_stale_turns().await {
                yield Err(e);
                return;
            }

            loop {
                match process.stdout.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match Message::parse_line(line.trim()) {
                            Ok(message) => {
                                let last = message.is_result();
                                if last {
                                    process.unanswered = process.unanswered.saturating_sub(1);
                                }
                                yield Ok(message);
                                if last {
                                    break;
                                }
                            }
                            Err(e) => {
                                yield Err(e);
                                break;
                            }
                        }
                    }
                    Ok(None) => {
                        yield Err(ClientError::ProcessExited);
                        break;
                    }
                    Err(e) => {
                        yield Err(ClientError::Io(e));
                        break;
                    }
                }
            }
        };
        messages.boxed()
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        let Some(mut process) = self.process.take() else {
            return Ok(());
        };

        // EOF on stdin asks the CLI to finish
        drop(process.stdin.take());

        let result = match tokio::time::timeout(CLOSE_GRACE, process.child.wait()).await {
            Ok(Ok(status)) => {
                debug!("Agent process exited with {}", status);
                Ok(())
            }
            Ok(Err(e)) => Err(ClientError::Io(e)),
            Err(_) => {
                warn!("Agent process did not exit within {:?}, killing it", CLOSE_GRACE);
                process.child.kill().await.map_err(ClientError::Io)
            }
        };

        process.stderr_task.abort();
        result
    }
}

/// Builds [`ClaudeCliClient`]s, optionally pinned to a specific CLI binary
#[derive(Debug, Clone, Default)]
pub struct ClaudeCliFactory {
    cli_path: Option<PathBuf>,
}

impl ClaudeCliFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binary used when a request does not set `cli_path`
    pub fn with_cli_path(mut self, cli_path: Option<PathBuf>) -> Self {
        self.cli_path = cli_path;
        self
    }
}

impl ClientFactory for ClaudeCliFactory {
    fn create(&self, options: AgentOptions) -> Box<dyn AgentClient> {
        let mut client = ClaudeCliClient::new(options);
        client.default_program = self.cli_path.clone();
        Box::new(client)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// Write an executable shell script standing in for the claude CLI
    fn fake_cli(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("fake-claude");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn client_for(path: PathBuf) -> ClaudeCliClient {
        ClaudeCliClient::new(AgentOptions {
            cli_path: Some(path),
            ..AgentOptions::default()
        })
    }

    #[tokio::test]
    async fn reads_one_turn_until_result() {
        let dir = TempDir::new().unwrap();
        let path = fake_cli(
            &dir,
            r#"read line
echo '{"type":"system","subtype":"init"}'
echo ''
echo '{"type":"assistant","content":"hi"}'
echo '{"type":"result","subtype":"success"}'
cat > /dev/null"#,
        );

        let mut client = client_for(path);
        client.open().await.unwrap();
        client.send("hello").await.unwrap();

        let messages: Vec<_> = client.receive().collect().await;
        assert_eq!(messages.len(), 3);
        let kinds: Vec<_> = messages
            .iter()
            .map(|m| m.as_ref().unwrap().kind().unwrap().to_string())
            .collect();
        assert_eq!(kinds, vec!["system", "assistant", "result"]);

        client.close().await.unwrap();
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn early_exit_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = fake_cli(&dir, r#"read line
echo '{"type":"assistant","content":"partial"}'"#);

        let mut client = client_for(path);
        client.open().await.unwrap();
        client.send("hello").await.unwrap();

        let messages: Vec<_> = client.receive().collect().await;
        assert_eq!(messages.len(), 2);
        assert!(messages[0].is_ok());
        assert!(matches!(messages[1], Err(ClientError::ProcessExited)));
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn non_json_output_is_a_protocol_error() {
        let dir = TempDir::new().unwrap();
        let path = fake_cli(&dir, "read line\necho 'Error: not logged in'\ncat > /dev/null");

        let mut client = client_for(path);
        client.open().await.unwrap();
        client.send("hello").await.unwrap();

        let messages: Vec<_> = client.receive().collect().await;
        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0], Err(ClientError::Protocol(_))));
        client.close().await.unwrap();
    }

    /// Answers every input line with two assistant parts and a result, tagged by turn
    const NUMBERED_TURNS: &str = r#"n=0
while read line; do
  n=$((n+1))
  echo "{\"type\":\"assistant\",\"turn\":$n,\"part\":1}"
  echo "{\"type\":\"assistant\",\"turn\":$n,\"part\":2}"
  echo "{\"type\":\"result\",\"turn\":$n}"
done"#;

    fn turns_of(messages: &[Result<Message, ClientError>]) -> Vec<u64> {
        messages
            .iter()
            .map(|m| m.as_ref().unwrap().as_value()["turn"].as_u64().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn abandoned_turn_does_not_leak_into_the_next() {
        let dir = TempDir::new().unwrap();
        let path = fake_cli(&dir, NUMBERED_TURNS);

        let mut client = client_for(path);
        client.open().await.unwrap();

        client.send("one").await.unwrap();
        {
            let mut first = client.receive();
            let head = first.next().await.unwrap().unwrap();
            assert_eq!(head.as_value()["turn"], 1);
        }

        client.send("two").await.unwrap();
        let messages: Vec<_> = client.receive().collect().await;
        assert_eq!(turns_of(&messages), vec![2, 2, 2]);
        assert!(messages[2].as_ref().unwrap().is_result());

        client.send("three").await.unwrap();
        let messages: Vec<_> = client.receive().collect().await;
        assert_eq!(turns_of(&messages), vec![3, 3, 3]);

        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn turn_after_protocol_error_starts_clean() {
        let dir = TempDir::new().unwrap();
        let path = fake_cli(
            &dir,
            r#"n=0
while read line; do
  n=$((n+1))
  if [ $n -eq 1 ]; then echo "warning: slow network"; fi
  echo "{\"type\":\"assistant\",\"turn\":$n}"
  echo "{\"type\":\"result\",\"turn\":$n}"
done"#,
        );

        let mut client = client_for(path);
        client.open().await.unwrap();

        client.send("one").await.unwrap();
        let messages: Vec<_> = client.receive().collect().await;
        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0], Err(ClientError::Protocol(_))));

        client.send("two").await.unwrap();
        let messages: Vec<_> = client.receive().collect().await;
        assert_eq!(turns_of(&messages), vec![2, 2]);

        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn missing_binary_fails_to_open() {
        let mut client = client_for(PathBuf::from("/nonexistent/claude"));
        let err = client.open().await.unwrap_err();
        assert!(matches!(err, ClientError::Spawn { .. }));
    }

    #[tokio::test]
    async fn send_before_open_is_rejected() {
        let mut client = ClaudeCliClient::new(AgentOptions::default());
        assert!(matches!(client.send("hi").await, Err(ClientError::NotOpen)));
        let messages: Vec<_> = client.receive().collect().await;
        assert!(matches!(messages[0], Err(ClientError::NotOpen)));
    }
}
