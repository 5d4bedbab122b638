//! Deterministic English comments for classified moves.

use crate::classifier::{MoveAssessment, MoveCategory, MoveDelta};
use crate::evaluation::PositionEvaluation;

/// Scores at or beyond this magnitude are described as forced mates.
const MATE_DISPLAY_CP: i32 = 9_000;

/// Render a White-positive centipawn value for a comment.
///
/// Finite scores appear in pawns with an explicit sign; saturated mate
/// scores are named rather than printed as numbers.
pub fn format_eval(white_cp: i32) -> String {
    if white_cp >= MATE_DISPLAY_CP {
        "a forced mate for White".to_string()
    } else if white_cp <= -MATE_DISPLAY_CP {
        "a forced mate for Black".to_string()
    } else {
        format!("{:+.2}", f64::from(white_cp) / 100.0)
    }
}

/// The comment for one classified move.
///
/// `prev` is the position before the move and `played` the move made from
/// it. When the mover went wrong and the engine preferred a different
/// move, the recommended line is quoted, truncated to
/// `max_variation_moves`.
pub fn comment_for(
    delta: &MoveDelta,
    prev: &PositionEvaluation,
    played: Option<&str>,
    max_variation_moves: usize,
) -> String {
    let prev_eval = format_eval(delta.prev_white_cp);
    let new_eval = format_eval(delta.new_white_cp);
    let mut comment = match delta.category {
        MoveCategory::Blunder => format!(
            "Blunder. The evaluation changes from {} to {}.",
            prev_eval, new_eval
        ),
        MoveCategory::Mistake => format!(
            "Mistake. The evaluation changes from {} to {}.",
            prev_eval, new_eval
        ),
        MoveCategory::Inaccuracy => format!(
            "Inaccuracy. The evaluation changes from {} to {}.",
            prev_eval, new_eval
        ),
        MoveCategory::Good => format!(
            "Good move. The evaluation changes from {} to {}.",
            prev_eval, new_eval
        ),
        MoveCategory::Excellent => format!(
            "Excellent move. The evaluation changes from {} to {}.",
            prev_eval, new_eval
        ),
        MoveCategory::Neutral => format!("The evaluation holds at {}.", new_eval),
    };

    let worsening = matches!(
        delta.category,
        MoveCategory::Blunder | MoveCategory::Mistake | MoveCategory::Inaccuracy
    );
    if worsening {
        if let Some(better) = recommended_line(prev, played, max_variation_moves) {
            comment.push_str(&format!(" Better was {}.", better));
        }
    }
    comment
}

/// The engine's preferred line from the previous position, unless it is
/// the move that was actually played.
fn recommended_line(
    prev: &PositionEvaluation,
    played: Option<&str>,
    max_variation_moves: usize,
) -> Option<String> {
    let line = prev.principal()?;
    let first = line.moves.first()?;
    if played == Some(first.as_str()) {
        return None;
    }
    let shown: Vec<&str> = line
        .moves
        .iter()
        .take(max_variation_moves.max(1))
        .map(String::as_str)
        .collect();
    Some(shown.join(" "))
}

/// Assemble assessments for a classified game.
///
/// `moves[i]` is the move played at index `i`; a shorter or empty slice
/// just drops the "Better was" suggestions for the missing entries.
pub fn assess(
    positions: &[PositionEvaluation],
    deltas: &[MoveDelta],
    moves: &[String],
    max_variation_moves: usize,
) -> Vec<MoveAssessment> {
    deltas
        .iter()
        .filter_map(|delta| {
            let prev = positions.iter().find(|p| p.move_index == delta.move_index)?;
            let played = moves.get(delta.move_index).map(String::as_str);
            Some(MoveAssessment {
                move_index: delta.move_index,
                mover: delta.mover,
                delta_cp: delta.delta_cp,
                category: delta.category,
                comment: comment_for(delta, prev, played, max_variation_moves),
            })
        })
        .collect()
}
