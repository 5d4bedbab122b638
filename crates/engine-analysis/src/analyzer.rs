//! Runs one analysis request against a session to completion.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use thiserror::Error;
use uci_codec::GoLimits;

use crate::evaluation::{white_centipawns, Color, PositionEvaluation, VariationLine, MATE_SCORE_CP};
use crate::scheduler::CancelToken;
use crate::session::{EngineSession, SearchEvent, SessionError};

/// Poll interval while waiting for search events.
const EVENT_POLL: Duration = Duration::from_millis(50);

/// Extra slack past the time budget before the search is force-stopped.
/// Engines that honor `movetime` answer within the budget on their own.
const STOP_SLACK: Duration = Duration::from_millis(150);

/// Errors from running analysis requests.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Error from the engine session.
    #[error("Engine session error: {0}")]
    Session(#[from] SessionError),
    /// The request was rejected before anything was sent to the engine.
    #[error("Invalid analysis request: {0}")]
    InvalidRequest(String),
    /// The run was cancelled cooperatively.
    #[error("Analysis cancelled")]
    Cancelled,
}

/// A position to analyze: an optional FEN base plus moves played from it.
///
/// With no FEN, moves are counted from the standard starting position.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSpec {
    pub fen: Option<String>,
    pub moves: Vec<String>,
}

impl PositionSpec {
    /// Position after the given moves from the starting position.
    pub fn startpos(moves: Vec<String>) -> Self {
        Self { fen: None, moves }
    }

    /// Which side is to move, derived from the FEN field and move parity.
    pub fn side_to_move(&self) -> Result<Color, AnalysisError> {
        let base = match &self.fen {
            None => Color::White,
            Some(fen) => match fen.split_whitespace().nth(1) {
                Some("w") => Color::White,
                Some("b") => Color::Black,
                _ => {
                    return Err(AnalysisError::InvalidRequest(format!(
                        "malformed FEN: {}",
                        fen
                    )))
                }
            },
        };
        Ok(if self.moves.len() % 2 == 0 {
            base
        } else {
            base.opponent()
        })
    }
}

/// One immutable analysis request.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub position: PositionSpec,
    /// Depth budget in plies.
    pub depth: Option<u32>,
    /// Time budget; whichever budget is reached first ends the search.
    pub movetime: Option<Duration>,
    /// Number of variation ranks requested (MultiPV).
    pub multipv: u32,
}

impl AnalysisRequest {
    /// Reject malformed requests before anything reaches the engine.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.depth.is_none() && self.movetime.is_none() {
            return Err(AnalysisError::InvalidRequest(
                "a depth or time budget is required".to_string(),
            ));
        }
        if self.depth == Some(0) {
            return Err(AnalysisError::InvalidRequest(
                "depth budget must be positive".to_string(),
            ));
        }
        if self.movetime == Some(Duration::ZERO) {
            return Err(AnalysisError::InvalidRequest(
                "time budget must be positive".to_string(),
            ));
        }
        if self.multipv == 0 {
            return Err(AnalysisError::InvalidRequest(
                "at least one variation must be requested".to_string(),
            ));
        }
        self.position.side_to_move()?;
        Ok(())
    }
}

/// Run one request against a session and collect the result.
///
/// Streams `info` events, keeping for each variation rank only the
/// deepest report seen, and finalizes on `bestmove`. The time budget is
/// enforced through the session's `stop()`; a raised cancel token also
/// stops the search, returning [`AnalysisError::Cancelled`] after the
/// session is back to `Ready`.
pub fn analyze_position(
    session: &mut EngineSession,
    request: &AnalysisRequest,
    move_index: usize,
    cancel: &CancelToken,
) -> Result<PositionEvaluation, AnalysisError> {
    request.validate()?;
    let side_to_move = request.position.side_to_move()?;

    // The engine only reports alternative lines when MultiPV is set; it
    // also has to be reset once a single-line request follows.
    session.set_option("MultiPV", &request.multipv.to_string())?;
    let limits = GoLimits {
        depth: request.depth,
        movetime: request.movetime.map(|d| d.as_millis() as u64),
        infinite: false,
    };
    session.begin_search(request.position.fen.as_deref(), &request.position.moves, &limits)?;

    let deadline = request.movetime.map(|d| Instant::now() + d + STOP_SLACK);
    let mut lines: BTreeMap<u32, VariationLine> = BTreeMap::new();

    let best_move = loop {
        if cancel.is_cancelled() {
            session.stop()?;
            return Err(AnalysisError::Cancelled);
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                tracing::debug!("time budget reached at move index {}, stopping", move_index);
                break session.stop()?;
            }
        }
        match session.next_event(EVENT_POLL)? {
            Some(SearchEvent::Info(info)) => {
                let Some(score) = info.score else { continue };
                let rank = info.multipv.unwrap_or(1);
                if rank == 0 || rank > request.multipv {
                    continue;
                }
                let depth = info.depth.unwrap_or(0);
                // Engines continuously overwrite shallower reports for the
                // same rank; only a strictly deeper report replaces ours.
                let deeper = lines.get(&rank).map_or(true, |l| depth > l.depth);
                if deeper {
                    lines.insert(
                        rank,
                        VariationLine {
                            rank,
                            depth,
                            score,
                            moves: info.pv,
                        },
                    );
                }
            }
            Some(SearchEvent::BestMove { mv }) => break mv,
            None => {}
        }
    };

    // Ranks must be contiguous from 1; a gap means the engine produced no
    // further alternatives and everything past it is dropped.
    let mut ordered = Vec::new();
    for rank in 1..=request.multipv {
        match lines.remove(&rank) {
            Some(line) => ordered.push(line),
            None => break,
        }
    }

    let white_score_cp = ordered
        .first()
        .map(|l| white_centipawns(l.score, side_to_move, MATE_SCORE_CP))
        .unwrap_or(0);
    let depth = ordered.first().map(|l| l.depth).unwrap_or(0);
    let best_move = match best_move.as_str() {
        "" | "(none)" | "0000" => None,
        _ => Some(best_move),
    };

    Ok(PositionEvaluation {
        move_index,
        side_to_move,
        lines: ordered,
        white_score_cp,
        depth,
        best_move,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(depth: Option<u32>, movetime: Option<Duration>, multipv: u32) -> AnalysisRequest {
        AnalysisRequest {
            position: PositionSpec::startpos(vec![]),
            depth,
            movetime,
            multipv,
        }
    }

    #[test]
    fn request_needs_some_budget() {
        let err = request(None, None, 1).validate().unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidRequest(_)));
    }

    #[test]
    fn zero_budgets_are_rejected() {
        assert!(request(Some(0), None, 1).validate().is_err());
        assert!(request(None, Some(Duration::ZERO), 1).validate().is_err());
        assert!(request(Some(10), None, 0).validate().is_err());
    }

    #[test]
    fn valid_request_passes() {
        assert!(request(Some(18), Some(Duration::from_millis(500)), 3)
            .validate()
            .is_ok());
    }

    #[test]
    fn side_to_move_from_move_parity() {
        let start = PositionSpec::startpos(vec![]);
        assert_eq!(start.side_to_move().unwrap(), Color::White);

        let after_e4 = PositionSpec::startpos(vec!["e2e4".to_string()]);
        assert_eq!(after_e4.side_to_move().unwrap(), Color::Black);
    }

    #[test]
    fn side_to_move_from_fen() {
        let spec = PositionSpec {
            fen: Some("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1".to_string()),
            moves: vec!["e7e5".to_string()],
        };
        // Black to move in the FEN, one move played: White's turn.
        assert_eq!(spec.side_to_move().unwrap(), Color::White);
    }

    #[test]
    fn malformed_fen_is_invalid_request() {
        let spec = PositionSpec {
            fen: Some("garbage".to_string()),
            moves: vec![],
        };
        assert!(spec.side_to_move().is_err());
    }
}
