//! Move quality classification over an ordered evaluation sequence.
//!
//! Deltas are computed from the perspective of the player who just moved:
//! a negative delta always means the mover's position worsened, no matter
//! which side moved. Mate scores are saturated to a large centipawn
//! equivalent before differencing so mate-distance changes still produce
//! meaningful deltas.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::evaluation::{white_centipawns, Color, PositionEvaluation, MATE_SCORE_CP};

/// Classification of a move by how much the evaluation shifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveCategory {
    /// Major error (>= blunder threshold worsening).
    Blunder,
    /// Significant error.
    Mistake,
    /// Noticeable slip.
    Inaccuracy,
    /// Clear improvement.
    Good,
    /// Major improvement (>= blunder threshold the other way).
    Excellent,
    /// Nothing noteworthy happened.
    Neutral,
}

impl MoveCategory {
    /// A position is critical iff its move was not neutral.
    pub fn is_critical(self) -> bool {
        self != MoveCategory::Neutral
    }
}

/// Centipawn thresholds for classification.
///
/// Bounds are inclusive at the more severe category: a delta of exactly
/// `-blunder_cp` classifies as a blunder, not a mistake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifyThresholds {
    #[serde(default = "default_blunder")]
    pub blunder_cp: i32,
    #[serde(default = "default_mistake")]
    pub mistake_cp: i32,
    #[serde(default = "default_inaccuracy")]
    pub inaccuracy_cp: i32,
    /// Saturation base for mate scores before differencing.
    #[serde(default = "default_mate_score")]
    pub mate_score_cp: i32,
}

fn default_blunder() -> i32 {
    300
}
fn default_mistake() -> i32 {
    150
}
fn default_inaccuracy() -> i32 {
    50
}
fn default_mate_score() -> i32 {
    MATE_SCORE_CP
}

impl Default for ClassifyThresholds {
    fn default() -> Self {
        Self {
            blunder_cp: default_blunder(),
            mistake_cp: default_mistake(),
            inaccuracy_cp: default_inaccuracy(),
            mate_score_cp: default_mate_score(),
        }
    }
}

/// The classified evaluation shift caused by one move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MoveDelta {
    /// Index of the move that was played (0-based ply).
    pub move_index: usize,
    /// The side that played the move.
    pub mover: Color,
    /// White-positive evaluation before the move.
    pub prev_white_cp: i32,
    /// White-positive evaluation after the move.
    pub new_white_cp: i32,
    /// Shift from the mover's perspective; negative = mover worsened.
    pub delta_cp: i32,
    pub category: MoveCategory,
}

/// Final per-move record: classified delta plus generated comment.
///
/// Derived data, never mutated after creation.
#[derive(Debug, Clone, Serialize)]
pub struct MoveAssessment {
    pub move_index: usize,
    pub mover: Color,
    /// Centipawn shift from the mover's perspective, sign-normalized.
    pub delta_cp: i32,
    pub category: MoveCategory,
    pub comment: String,
}

impl MoveAssessment {
    pub fn is_critical(&self) -> bool {
        self.category.is_critical()
    }
}

/// Classify a delta into a category.
pub fn categorize(delta_cp: i32, t: &ClassifyThresholds) -> MoveCategory {
    if delta_cp <= -t.blunder_cp {
        MoveCategory::Blunder
    } else if delta_cp <= -t.mistake_cp {
        MoveCategory::Mistake
    } else if delta_cp <= -t.inaccuracy_cp {
        MoveCategory::Inaccuracy
    } else if delta_cp >= t.blunder_cp {
        MoveCategory::Excellent
    } else if delta_cp >= t.mistake_cp {
        MoveCategory::Good
    } else {
        MoveCategory::Neutral
    }
}

/// White-positive centipawns for a position, per these thresholds.
///
/// Uses the rank-1 line when present so the configured mate saturation
/// applies; positions without any line count as level.
pub fn position_white_cp(eval: &PositionEvaluation, t: &ClassifyThresholds) -> i32 {
    eval.principal()
        .map(|line| white_centipawns(line.score, eval.side_to_move, t.mate_score_cp))
        .unwrap_or(eval.white_score_cp)
}

/// Derive classified deltas for every adjacent pair of evaluations.
///
/// `positions` must be ordered by move index. Pairs whose indices are not
/// consecutive (positions skipped by a store pre-check) produce no delta.
pub fn classify(positions: &[PositionEvaluation], t: &ClassifyThresholds) -> Vec<MoveDelta> {
    let mut deltas = Vec::new();
    for pair in positions.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        if cur.move_index != prev.move_index + 1 {
            continue;
        }
        // The side to move before the transition is the side that moved;
        // ply parity is wrong for games starting from a Black-to-move FEN.
        let mover = prev.side_to_move;
        let prev_white_cp = position_white_cp(prev, t);
        let new_white_cp = position_white_cp(cur, t);
        let delta_cp = match mover {
            Color::White => new_white_cp - prev_white_cp,
            Color::Black => prev_white_cp - new_white_cp,
        };
        deltas.push(MoveDelta {
            move_index: prev.move_index,
            mover,
            prev_white_cp,
            new_white_cp,
            delta_cp,
            category: categorize(delta_cp, t),
        });
    }
    deltas
}

/// Position indices worth a full-budget re-analysis in selective mode.
///
/// Selects the position after each move whose delta magnitude meets the
/// threshold, plus the position immediately preceding it to anchor the
/// explanation.
pub fn select_critical(deltas: &[MoveDelta], threshold_cp: i32) -> BTreeSet<usize> {
    let mut selected = BTreeSet::new();
    for delta in deltas {
        if delta.delta_cp.abs() >= threshold_cp {
            selected.insert(delta.move_index);
            selected.insert(delta.move_index + 1);
        }
    }
    selected
}
