//! Engine process session: owns one UCI engine subprocess.
//!
//! A session wraps a child process and serializes all interaction with it.
//! A reader thread turns the engine's stdout into parsed [`EngineEvent`]s
//! on a channel, so the session can offer blocking-but-bounded waits and
//! can tell a silent engine apart from a dead one: the channel
//! disconnecting while a search is in flight means the process is gone.
//!
//! # Lifecycle
//!
//! ```text
//! spawn() -> Ready -> begin_search() -> Searching -> bestmove -> Ready
//!                                                 -> stop()   -> Ready
//! shutdown() -> Stopped (terminal, idempotent)
//! any I/O failure / crash -> Failed (terminal)
//! ```
//!
//! Only one search may be in flight per session; concurrent
//! `begin_search` calls are rejected with [`SessionError::Busy`], not
//! queued. Queueing across positions is the scheduler's job.

use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use thiserror::Error;
use uci_codec::{write_command, EngineCommand, EngineEvent, GoLimits, SearchInfo};

/// Upper bound for the `uci`/`uciok` and `isready`/`readyok` round-trips.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a stopped search may take to deliver its terminal `bestmove`.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Grace period between `quit` and a forced kill.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Errors from engine process management and protocol sequencing.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Engine executable was not found at the specified path.
    #[error("Engine not found at path: {0}")]
    NotFound(String),
    /// Failed to spawn the engine process or perform pipe I/O.
    #[error("Engine I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// The initialization handshake did not complete.
    #[error("Engine handshake failed: {0}")]
    Handshake(String),
    /// The engine process died while a request was outstanding.
    #[error("Engine process exited unexpectedly")]
    Crashed,
    /// A search is already in flight on this session.
    #[error("Session busy: a search is already in flight")]
    Busy,
    /// The session is in a state that cannot accept this request.
    #[error("Session is not ready (state: {0:?})")]
    NotReady(SessionState),
}

/// Observable lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Ready,
    Searching,
    Stopped,
    Failed,
}

/// Events surfaced to callers while a search is in flight.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchEvent {
    /// Streamed search information.
    Info(SearchInfo),
    /// Terminal answer; the session is back to `Ready` once delivered.
    BestMove { mv: String },
}

/// One running engine process and the channel to talk to it.
///
/// The session exclusively owns the process: no other component may write
/// to its stdin. Dropping the session shuts the engine down.
pub struct EngineSession {
    process: Child,
    stdin: ChildStdin,
    events: Receiver<EngineEvent>,
    reader: Option<JoinHandle<()>>,
    state: SessionState,
    name: String,
}

impl EngineSession {
    /// Spawn an engine and complete the initialization handshake.
    ///
    /// Sends `uci`, waits for `uciok` (capturing the engine name from the
    /// `id name` line), applies the given options, then confirms with an
    /// `isready`/`readyok` round-trip. The whole sequence is bounded by
    /// [`HANDSHAKE_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotFound`] if the executable does not exist
    /// - [`SessionError::Io`] if the process fails to start
    /// - [`SessionError::Handshake`] if the engine exits or stays silent
    ///   before completing the handshake
    pub fn spawn<P: AsRef<Path>>(
        path: P,
        options: &HashMap<String, String>,
    ) -> Result<Self, SessionError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SessionError::NotFound(path.display().to_string()));
        }

        let mut process = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| SessionError::Handshake("engine stdin unavailable".to_string()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| SessionError::Handshake("engine stdout unavailable".to_string()))?;

        let (tx, rx) = mpsc::channel();
        let reader = std::thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                let Ok(line) = line else { break };
                match EngineEvent::parse(&line) {
                    Some(event) => {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    None => tracing::trace!("ignoring engine output: {}", line),
                }
            }
        });

        let mut session = Self {
            process,
            stdin,
            events: rx,
            reader: Some(reader),
            state: SessionState::Starting,
            name: String::new(),
        };

        if let Err(e) = session.handshake(options) {
            session.state = SessionState::Failed;
            let _ = session.shutdown();
            return Err(e);
        }

        session.state = SessionState::Ready;
        tracing::info!("engine started: {}", session.name);
        Ok(session)
    }

    fn handshake(&mut self, options: &HashMap<String, String>) -> Result<(), SessionError> {
        self.send(&EngineCommand::Uci)?;

        let deadline = Instant::now() + HANDSHAKE_TIMEOUT;
        loop {
            match self.recv_until(deadline, "uciok")? {
                EngineEvent::Id { name: Some(name), .. } => self.name = name,
                EngineEvent::UciOk => break,
                _ => {}
            }
        }
        if self.name.is_empty() {
            self.name = "Unknown Engine".to_string();
        }

        // Engines do not acknowledge setoption; a rejected option only
        // shows up as stderr chatter.
        for (name, value) in options {
            tracing::debug!("setting engine option {} = {}", name, value);
            self.send(&EngineCommand::SetOption {
                name: name.clone(),
                value: value.clone(),
            })?;
        }

        self.send(&EngineCommand::IsReady)?;
        loop {
            if let EngineEvent::ReadyOk = self.recv_until(deadline, "readyok")? {
                break;
            }
        }
        Ok(())
    }

    fn recv_until(&mut self, deadline: Instant, expect: &str) -> Result<EngineEvent, SessionError> {
        let remaining = deadline
            .checked_duration_since(Instant::now())
            .ok_or_else(|| SessionError::Handshake(format!("timed out waiting for {}", expect)))?;
        match self.events.recv_timeout(remaining) {
            Ok(event) => Ok(event),
            Err(RecvTimeoutError::Timeout) => Err(SessionError::Handshake(format!(
                "timed out waiting for {}",
                expect
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(SessionError::Handshake(format!(
                "engine exited before {}",
                expect
            ))),
        }
    }

    /// The engine's name as reported via `id name`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Reset engine state before analyzing a new game.
    ///
    /// Sends `ucinewgame` followed by a readiness round-trip so stale hash
    /// contents never leak between games.
    pub fn new_game(&mut self) -> Result<(), SessionError> {
        self.require_ready()?;
        self.send(&EngineCommand::NewGame)?;
        self.send(&EngineCommand::IsReady)?;
        let deadline = Instant::now() + HANDSHAKE_TIMEOUT;
        loop {
            match self.events.recv_timeout(
                deadline
                    .checked_duration_since(Instant::now())
                    .unwrap_or(Duration::ZERO),
            ) {
                Ok(EngineEvent::ReadyOk) => return Ok(()),
                Ok(_) => {}
                Err(RecvTimeoutError::Timeout) => {
                    self.state = SessionState::Failed;
                    return Err(SessionError::Crashed);
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.state = SessionState::Failed;
                    return Err(SessionError::Crashed);
                }
            }
        }
    }

    /// Set a UCI option outside the handshake.
    ///
    /// Engines do not acknowledge `setoption`; failures only surface as
    /// ignored values.
    pub fn set_option(&mut self, name: &str, value: &str) -> Result<(), SessionError> {
        self.require_ready()?;
        self.send(&EngineCommand::SetOption {
            name: name.to_string(),
            value: value.to_string(),
        })
    }

    /// Start a search on the given position.
    ///
    /// Transitions `Ready -> Searching`. The caller consumes the resulting
    /// event stream with [`next_event`](Self::next_event) until the
    /// terminal [`SearchEvent::BestMove`], or aborts with
    /// [`stop`](Self::stop).
    pub fn begin_search(
        &mut self,
        fen: Option<&str>,
        moves: &[String],
        limits: &GoLimits,
    ) -> Result<(), SessionError> {
        self.require_ready()?;
        self.send(&EngineCommand::Position {
            fen: fen.map(str::to_string),
            moves: moves.to_vec(),
        })?;
        self.send(&EngineCommand::Go(limits.clone()))?;
        self.state = SessionState::Searching;
        Ok(())
    }

    /// Wait up to `wait` for the next search event.
    ///
    /// Returns `Ok(None)` if nothing arrived within the window. A
    /// [`SearchEvent::BestMove`] returns the session to `Ready`.
    ///
    /// # Errors
    ///
    /// [`SessionError::Crashed`] if the engine process died; the session
    /// is then `Failed` and must be replaced.
    pub fn next_event(&mut self, wait: Duration) -> Result<Option<SearchEvent>, SessionError> {
        if self.state != SessionState::Searching {
            return Err(SessionError::NotReady(self.state));
        }
        let deadline = Instant::now() + wait;
        loop {
            let remaining = match deadline.checked_duration_since(Instant::now()) {
                Some(d) => d,
                None => return Ok(None),
            };
            match self.events.recv_timeout(remaining) {
                Ok(EngineEvent::Info(info)) => return Ok(Some(SearchEvent::Info(info))),
                Ok(EngineEvent::BestMove { mv, .. }) => {
                    self.state = SessionState::Ready;
                    return Ok(Some(SearchEvent::BestMove { mv }));
                }
                Ok(_) => {} // stray handshake echoes, keep waiting
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => {
                    self.state = SessionState::Failed;
                    return Err(SessionError::Crashed);
                }
            }
        }
    }

    /// Abort the in-flight search and wait for its terminal `bestmove`.
    ///
    /// Engines are required to still answer a stopped search, so this
    /// blocks (bounded by [`STOP_TIMEOUT`]) until the `bestmove` arrives
    /// and the session is `Ready` again.
    pub fn stop(&mut self) -> Result<String, SessionError> {
        if self.state != SessionState::Searching {
            return Err(SessionError::NotReady(self.state));
        }
        self.send(&EngineCommand::Stop)?;
        let deadline = Instant::now() + STOP_TIMEOUT;
        loop {
            let remaining = deadline.checked_duration_since(Instant::now());
            match self.next_event(remaining.unwrap_or(Duration::ZERO))? {
                Some(SearchEvent::BestMove { mv }) => return Ok(mv),
                Some(SearchEvent::Info(_)) => {}
                None => {
                    self.state = SessionState::Failed;
                    return Err(SessionError::Crashed);
                }
            }
        }
    }

    /// Shut the engine down. Idempotent.
    ///
    /// Sends `quit`, waits up to [`SHUTDOWN_GRACE`] for the process to
    /// exit, then kills it.
    pub fn shutdown(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::Stopped {
            return Ok(());
        }
        // Best effort: the pipe may already be gone.
        let _ = write_command(&mut self.stdin, &EngineCommand::Quit);

        let deadline = Instant::now() + SHUTDOWN_GRACE;
        let exited = loop {
            match self.process.try_wait() {
                Ok(Some(_)) => break true,
                Ok(None) if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(25));
                }
                _ => break false,
            }
        };
        if !exited {
            tracing::warn!("engine {} did not quit, killing process", self.name);
            let _ = self.process.kill();
            let _ = self.process.wait();
        }
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
        self.state = SessionState::Stopped;
        tracing::info!("engine stopped: {}", self.name);
        Ok(())
    }

    fn require_ready(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Ready => Ok(()),
            SessionState::Searching => Err(SessionError::Busy),
            other => Err(SessionError::NotReady(other)),
        }
    }

    fn send(&mut self, cmd: &EngineCommand) -> Result<(), SessionError> {
        write_command(&mut self.stdin, cmd).map_err(|e| match e {
            uci_codec::CodecError::Io(io) => SessionError::Io(io),
        })
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
