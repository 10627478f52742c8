//! UCI engine subprocess transport.

use crate::search_engine::{ResponseSender, SearchEngine};
use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use strictly_chess::{
    decode_uci_line, handshake_commands, EngineError, EngineMessage, EngineResponse,
    SearchRequest, SessionId,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

/// Sessions of submitted searches, oldest first.
type PendingSearches = Arc<Mutex<VecDeque<SessionId>>>;

/// An engine process spoken to over piped stdio.
///
/// Each `bestmove` answers the oldest unanswered `go`, so requests are
/// tagged first-in first-out.
pub struct UciEngine {
    name: String,
    child: Child,
    stdin: ChildStdin,
    pending: PendingSearches,
    reader: JoinHandle<()>,
}

impl std::fmt::Debug for UciEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UciEngine")
            .field("name", &self.name)
            .field("pid", &self.child.id())
            .finish_non_exhaustive()
    }
}

impl UciEngine {
    /// Spawns the engine; replies are sent on `responses`.
    #[instrument(skip(responses))]
    pub fn spawn(command: &[String], responses: ResponseSender) -> Result<Self, EngineError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| EngineError::new("Engine command is empty"))?;

        info!(program = %program, "Spawning engine process");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::new(format!("Failed to spawn engine {program}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::new("Engine stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::new("Engine stdout unavailable"))?;

        let pending = PendingSearches::default();
        let reader = tokio::spawn(read_engine_output(
            BufReader::new(stdout),
            pending.clone(),
            responses,
        ));

        let name = Path::new(program)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.clone());
        Ok(Self {
            name,
            child,
            stdin,
            pending,
            reader,
        })
    }

    async fn send_line(&mut self, line: &str) -> Result<(), EngineError> {
        debug!(line, "To engine");
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SearchEngine for UciEngine {
    #[instrument(skip(self), fields(engine = %self.name))]
    async fn initialize(&mut self) -> Result<(), EngineError> {
        for command in handshake_commands() {
            self.send_line(command).await?;
        }
        Ok(())
    }

    #[instrument(skip(self, request), fields(engine = %self.name, session = %request.session))]
    async fn submit(&mut self, request: &SearchRequest) -> Result<(), EngineError> {
        {
            let mut pending = self
                .pending
                .lock()
                .map_err(|_| EngineError::new("Pending search queue poisoned"))?;
            pending.push_back(request.session);
        }
        for command in request.uci_commands() {
            self.send_line(&command).await?;
        }
        Ok(())
    }

    #[instrument(skip(self), fields(engine = %self.name))]
    async fn stop(&mut self) -> Result<(), EngineError> {
        self.send_line("stop").await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        info!(engine = %self.name, "Shutting down engine process");
        self.reader.abort();
        let _ = self.child.start_kill();
    }
}

/// Tags a decoded message with the session it answers.
pub fn tag_message(
    message: EngineMessage,
    pending: &mut VecDeque<SessionId>,
) -> Option<EngineResponse> {
    if message == EngineMessage::Ready {
        return Some(EngineResponse {
            session: SessionId::default(),
            message,
        });
    }
    match pending.pop_front() {
        Some(session) => Some(EngineResponse { session, message }),
        None => {
            warn!(?message, "Engine reply with no search outstanding");
            None
        }
    }
}

/// Decodes engine output until it closes, forwarding tagged replies.
pub(crate) async fn read_engine_output<R>(
    reader: R,
    pending: PendingSearches,
    responses: ResponseSender,
) where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                trace!(%line, "From engine");
                let Some(message) = decode_uci_line(&line) else {
                    continue;
                };
                let tagged = match pending.lock() {
                    Ok(mut queue) => tag_message(message, &mut queue),
                    Err(_) => {
                        warn!("Pending search queue poisoned");
                        break;
                    }
                };
                if let Some(response) = tagged {
                    if responses.send(response).is_err() {
                        debug!("Response receiver dropped");
                        break;
                    }
                }
            }
            Ok(None) => {
                warn!("Engine closed its output");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Failed reading engine output");
                break;
            }
        }
    }
}
