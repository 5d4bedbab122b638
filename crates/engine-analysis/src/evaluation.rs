//! Evaluation entities produced per analyzed position.

use serde::{Deserialize, Serialize};
use uci_codec::Score;

/// Saturation value for mate scores when mapped to centipawns.
///
/// Mate-in-N maps to this base minus the distance, so shorter mates
/// compare as larger and any mate outranks any finite evaluation.
pub const MATE_SCORE_CP: i32 = 10_000;

/// The side to move in a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Color {
    White,
    Black,
}

impl Color {
    /// Side that plays the move at this ply (0 = White's first move).
    pub fn from_ply(ply: usize) -> Self {
        if ply % 2 == 0 {
            Color::White
        } else {
            Color::Black
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

/// Flip a score to the opponent's perspective.
pub fn flip(score: Score) -> Score {
    match score {
        Score::Cp(cp) => Score::Cp(-cp),
        Score::Mate(m) => Score::Mate(-m),
    }
}

/// Map a mover-relative score to centipawns, saturating mate distances.
///
/// `Mate(0)` means the side to move is already mated.
pub fn mover_centipawns(score: Score, mate_cp: i32) -> i32 {
    match score {
        Score::Cp(cp) => cp,
        Score::Mate(m) if m > 0 => mate_cp - m,
        Score::Mate(m) => -(mate_cp + m),
    }
}

/// Map a mover-relative score to White-positive centipawns.
///
/// Engines report scores from the perspective of the side to move; this
/// flips the sign for Black-to-move reports after mate saturation, so the
/// `Mate(0)` case keeps its meaning.
pub fn white_centipawns(score: Score, side_to_move: Color, mate_cp: i32) -> i32 {
    let cp = mover_centipawns(score, mate_cp);
    match side_to_move {
        Color::White => cp,
        Color::Black => -cp,
    }
}

/// One engine line for an analyzed position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariationLine {
    /// Variation rank, 1 = principal variation.
    pub rank: u32,
    /// Depth the line was reported at.
    pub depth: u32,
    /// Score as reported by the engine (side-to-move relative).
    pub score: Score,
    /// Move sequence in engine notation, best move first.
    pub moves: Vec<String>,
}

/// The finalized analysis of one position in a game.
///
/// `move_index` counts moves played from the start: index `k` is the
/// position after `k` moves, so index 0 is the starting position.
/// Variation ranks are contiguous from 1; fewer ranks than requested
/// means the engine had no further alternatives, which is not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionEvaluation {
    pub move_index: usize,
    pub side_to_move: Color,
    /// All reported lines, ordered by rank. Rank 1 is authoritative.
    pub lines: Vec<VariationLine>,
    /// Best score normalized so that positive favors White, with mate
    /// scores saturated via [`MATE_SCORE_CP`].
    pub white_score_cp: i32,
    /// Depth the principal variation reached.
    pub depth: u32,
    /// The engine's chosen move, absent for terminal positions.
    pub best_move: Option<String>,
}

impl PositionEvaluation {
    /// The principal variation, if any line was reported.
    pub fn principal(&self) -> Option<&VariationLine> {
        self.lines.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_from_ply_alternates() {
        assert_eq!(Color::from_ply(0), Color::White);
        assert_eq!(Color::from_ply(1), Color::Black);
        assert_eq!(Color::from_ply(2), Color::White);
    }

    #[test]
    fn flip_negates_both_kinds() {
        assert_eq!(flip(Score::Cp(35)), Score::Cp(-35));
        assert_eq!(flip(Score::Mate(-2)), Score::Mate(2));
    }

    #[test]
    fn mate_outranks_any_centipawn_score() {
        let mate_in_3 = mover_centipawns(Score::Mate(3), MATE_SCORE_CP);
        assert_eq!(mate_in_3, 9_997);
        assert!(mate_in_3 > mover_centipawns(Score::Cp(2_500), MATE_SCORE_CP));

        let mated_in_2 = mover_centipawns(Score::Mate(-2), MATE_SCORE_CP);
        assert_eq!(mated_in_2, -9_998);
        assert!(mated_in_2 < mover_centipawns(Score::Cp(-2_500), MATE_SCORE_CP));
    }

    #[test]
    fn shorter_mate_is_better() {
        let m2 = mover_centipawns(Score::Mate(2), MATE_SCORE_CP);
        let m8 = mover_centipawns(Score::Mate(8), MATE_SCORE_CP);
        assert!(m2 > m8);
    }

    #[test]
    fn mate_zero_means_mover_is_mated() {
        assert_eq!(mover_centipawns(Score::Mate(0), MATE_SCORE_CP), -10_000);
        // Black to move and mated: White-positive view is winning for White.
        assert_eq!(
            white_centipawns(Score::Mate(0), Color::Black, MATE_SCORE_CP),
            10_000
        );
    }

    #[test]
    fn white_centipawns_flips_for_black() {
        assert_eq!(white_centipawns(Score::Cp(80), Color::White, MATE_SCORE_CP), 80);
        assert_eq!(white_centipawns(Score::Cp(80), Color::Black, MATE_SCORE_CP), -80);
    }
}
