//! Parsing of engine-to-GUI output lines.

use serde::{Deserialize, Serialize};

/// Score in centipawns or mate distance.
///
/// The sign is exactly as reported by the engine, relative to the side to
/// move. Normalizing to a fixed perspective needs turn information the
/// codec does not have, so it is left to the analysis layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Score {
    /// Centipawn score (100 = 1 pawn advantage).
    Cp(i32),
    /// Mate in N moves (positive = side to move mates, negative = gets mated).
    Mate(i32),
}

/// Search information from an `info` line.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchInfo {
    /// Search depth in plies.
    pub depth: Option<u32>,
    /// Selective search depth.
    pub seldepth: Option<u32>,
    /// Variation rank, 1 = principal variation.
    pub multipv: Option<u32>,
    /// Score evaluation, side-to-move relative.
    pub score: Option<Score>,
    /// Nodes searched.
    pub nodes: Option<u64>,
    /// Nodes per second.
    pub nps: Option<u64>,
    /// Time spent in milliseconds.
    pub time_ms: Option<u64>,
    /// The reported line, best move first.
    pub pv: Vec<String>,
}

/// Messages the engine sends back over its stdout.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Engine identification.
    Id {
        name: Option<String>,
        author: Option<String>,
    },
    /// UCI initialization complete.
    UciOk,
    /// Engine is ready.
    ReadyOk,
    /// Streamed search information.
    Info(SearchInfo),
    /// Terminal search answer.
    BestMove { mv: String, ponder: Option<String> },
}

impl EngineEvent {
    /// Parse one output line into an event.
    ///
    /// Returns `None` for anything unrecognized. Engines emit plenty of
    /// vendor-specific output (option lists, debug strings); those lines
    /// are skipped by the caller, never an error.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let mut parts = line.split_whitespace();

        match parts.next()? {
            "uciok" => Some(EngineEvent::UciOk),
            "readyok" => Some(EngineEvent::ReadyOk),
            "id" => match parts.next()? {
                "name" => Some(EngineEvent::Id {
                    name: Some(parts.collect::<Vec<_>>().join(" ")),
                    author: None,
                }),
                "author" => Some(EngineEvent::Id {
                    name: None,
                    author: Some(parts.collect::<Vec<_>>().join(" ")),
                }),
                _ => None,
            },
            "bestmove" => {
                let mv = parts.next()?.to_string();
                let ponder = match (parts.next(), parts.next()) {
                    (Some("ponder"), Some(p)) => Some(p.to_string()),
                    _ => None,
                };
                Some(EngineEvent::BestMove { mv, ponder })
            }
            "info" => SearchInfo::parse_fields(line).map(EngineEvent::Info),
            _ => None,
        }
    }
}

impl SearchInfo {
    /// Parse the fields of an `info` line.
    ///
    /// Unknown keywords are skipped; an `info` line that carries neither a
    /// depth nor a score nor a pv (e.g. `info currmove ...` progress
    /// chatter) yields `None`.
    fn parse_fields(line: &str) -> Option<Self> {
        let mut info = SearchInfo::default();
        let parts: Vec<&str> = line.split_whitespace().collect();
        let mut i = 1; // Skip "info"

        while i < parts.len() {
            match parts[i] {
                "depth" => {
                    i += 1;
                    if i < parts.len() {
                        info.depth = parts[i].parse().ok();
                    }
                }
                "seldepth" => {
                    i += 1;
                    if i < parts.len() {
                        info.seldepth = parts[i].parse().ok();
                    }
                }
                "multipv" => {
                    i += 1;
                    if i < parts.len() {
                        info.multipv = parts[i].parse().ok();
                    }
                }
                "score" => {
                    i += 1;
                    if i < parts.len() {
                        match parts[i] {
                            "cp" => {
                                i += 1;
                                if i < parts.len() {
                                    if let Ok(cp) = parts[i].parse() {
                                        info.score = Some(Score::Cp(cp));
                                    }
                                }
                            }
                            "mate" => {
                                i += 1;
                                if i < parts.len() {
                                    if let Ok(m) = parts[i].parse() {
                                        info.score = Some(Score::Mate(m));
                                    }
                                }
                            }
                            _ => {}
                        }
                    }
                }
                "nodes" => {
                    i += 1;
                    if i < parts.len() {
                        info.nodes = parts[i].parse().ok();
                    }
                }
                "nps" => {
                    i += 1;
                    if i < parts.len() {
                        info.nps = parts[i].parse().ok();
                    }
                }
                "time" => {
                    i += 1;
                    if i < parts.len() {
                        info.time_ms = parts[i].parse().ok();
                    }
                }
                "pv" => {
                    i += 1;
                    // Collect all remaining moves until another keyword or end
                    while i < parts.len() && !is_info_keyword(parts[i]) {
                        info.pv.push(parts[i].to_string());
                        i += 1;
                    }
                    continue; // Don't increment i again
                }
                _ => {}
            }
            i += 1;
        }

        if info.depth.is_none() && info.score.is_none() && info.pv.is_empty() {
            return None;
        }
        Some(info)
    }
}

fn is_info_keyword(s: &str) -> bool {
    matches!(
        s,
        "depth"
            | "seldepth"
            | "multipv"
            | "score"
            | "nodes"
            | "nps"
            | "time"
            | "pv"
            | "currmove"
            | "currmovenumber"
            | "hashfull"
            | "tbhits"
            | "lowerbound"
            | "upperbound"
            | "wdl"
            | "cpuload"
            | "string"
    )
}
