//! Line codec for the UCI (Universal Chess Interface) protocol, GUI side.
//!
//! This crate translates between structured commands/events and the
//! line-based text protocol spoken by external chess engines. It is
//! stateless: callers own the process and the pipes, the codec only
//! formats outgoing command lines and parses incoming event lines.
//!
//! # Command flow
//!
//! - `uci` / `uciok` - Initialization handshake
//! - `isready` / `readyok` - Synchronization
//! - `setoption name <k> value <v>` - Engine configuration
//! - `ucinewgame` - Reset engine state between games
//! - `position [fen <fen> | startpos] [moves <move>...]` - Set position
//! - `go [depth <d>] [movetime <ms>] [infinite]` - Start search
//! - `stop` / `quit` - Abort search / exit engine
//!
//! Engine output parsing is tolerant: lines the codec does not recognize
//! (vendor extensions, debug chatter) parse to `None` and are expected to
//! be skipped by the caller, never treated as fatal.

mod command;
mod event;

pub use command::{EngineCommand, GoLimits};
pub use event::{EngineEvent, Score, SearchInfo};

use std::io::Write;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Write a command as a single terminated line.
///
/// The line terminator is appended before the write so a command is never
/// split across writes, and the writer is flushed immediately.
pub fn write_command<W: Write>(writer: &mut W, cmd: &EngineCommand) -> Result<(), CodecError> {
    let line = format!("{}\n", cmd.to_uci());
    writer.write_all(line.as_bytes())?;
    writer.flush()?;
    Ok(())
}
