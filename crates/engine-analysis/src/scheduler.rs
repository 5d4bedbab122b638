//! Whole-game analysis orchestration.
//!
//! The scheduler walks a game position by position over a single engine
//! session, collects evaluations, classifies the moves between them and
//! attaches generated comments. It owns the run-level policies: full
//! versus selective analysis, cooperative cancellation at position
//! boundaries, skipping positions a store already holds, and recovering
//! from one engine crash per run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::analyzer::{analyze_position, AnalysisError, AnalysisRequest, PositionSpec};
use crate::annotate::assess;
use crate::classifier::{classify, select_critical, MoveAssessment};
use crate::config::AnalysisSettings;
use crate::evaluation::PositionEvaluation;
use crate::session::{EngineSession, SessionError};

/// Errors that abort a run before any position was analyzed.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// The engine could not be started for this run.
    #[error("Engine session error: {0}")]
    Session(#[from] SessionError),
}

/// Cooperative cancellation flag, cloneable across threads.
///
/// Raising the token stops the run at the next position boundary or poll
/// tick; work already completed is kept.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress report emitted after each analyzed position.
///
/// In selective mode `total` grows once the screening pass has chosen
/// which positions get a full-strength look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    /// Index of the position that just finished.
    pub position_index: usize,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every planned position was analyzed.
    Complete,
    /// The run was cancelled; results cover the positions finished so far.
    Cancelled,
    /// The engine failed twice; results cover the positions finished so far.
    Failed { message: String },
}

/// One game to analyze: identifier, optional FEN base and played moves.
#[derive(Debug, Clone)]
pub struct GameRecord {
    pub game_id: String,
    /// Starting position, standard start when absent.
    pub starting_fen: Option<String>,
    /// Moves in engine notation, in playing order.
    pub moves: Vec<String>,
}

/// Everything produced by one run over one game.
#[derive(Debug, Clone, Serialize)]
pub struct GameAnalysisResult {
    pub game_id: String,
    pub engine_name: String,
    pub analyzed_at: DateTime<Utc>,
    /// Evaluations ordered by position index; gaps where a store already
    /// held the position or the run ended early.
    pub positions: Vec<PositionEvaluation>,
    pub assessments: Vec<MoveAssessment>,
    pub outcome: RunOutcome,
}

/// Pre-check against previously persisted evaluations.
///
/// Positions the store already holds are skipped, leaving gaps in the
/// result; moves adjacent to a gap get no assessment.
pub trait EvaluationStore {
    /// Whether an evaluation for this position already exists under an
    /// equivalent settings profile.
    fn contains(&self, game_id: &str, position_index: usize, settings: &AnalysisSettings) -> bool;
}

enum PassEnd {
    Done,
    Cancelled,
    Failed(String),
}

/// Runs game analyses according to a settings profile.
pub struct GameScheduler {
    settings: AnalysisSettings,
}

impl GameScheduler {
    pub fn new(settings: AnalysisSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// Analyze a whole game.
    ///
    /// In full mode every position from the start through the final one
    /// gets the configured budget. In selective mode a shallow screening
    /// pass runs first and only positions around large evaluation swings
    /// are re-analyzed at full strength; assessments are then limited to
    /// the noteworthy moves.
    ///
    /// Cancellation and engine failures do not discard finished work: the
    /// returned result carries the partial data with the matching
    /// [`RunOutcome`]. One engine crash per run is absorbed by restarting
    /// the session and retrying the position; a second failure ends the
    /// run.
    ///
    /// # Errors
    ///
    /// Returns an error only when the engine cannot be started at all.
    pub fn analyze_game<F>(
        &self,
        game: &GameRecord,
        cancel: &CancelToken,
        store: Option<&dyn EvaluationStore>,
        mut on_progress: F,
    ) -> Result<GameAnalysisResult, SchedulerError>
    where
        F: FnMut(&Progress),
    {
        let mut session = self.spawn_session()?;
        let engine_name = session.name().to_string();
        tracing::info!(
            "analyzing game {} ({} moves) with {}",
            game.game_id,
            game.moves.len(),
            engine_name
        );

        let planned: Vec<usize> = (0..=game.moves.len())
            .filter(|&idx| !store.map_or(false, |s| s.contains(&game.game_id, idx, &self.settings)))
            .collect();

        let mut positions: Vec<PositionEvaluation> = Vec::new();
        let mut restarted = false;
        let mut completed = 0;
        let mut total = planned.len();

        let end = if self.settings.selective {
            self.run_selective(
                &mut session,
                game,
                &planned,
                cancel,
                &mut restarted,
                &mut completed,
                &mut total,
                &mut on_progress,
                &mut positions,
            )
        } else {
            self.run_pass(
                &mut session,
                game,
                &planned,
                self.settings.depth,
                Some(self.settings.time_per_position()),
                self.settings.multipv,
                cancel,
                &mut restarted,
                &mut completed,
                total,
                &mut on_progress,
                &mut positions,
            )
        };

        let _ = session.shutdown();

        positions.sort_by_key(|p| p.move_index);
        let deltas = classify(&positions, &self.settings.thresholds);
        let mut assessments = assess(
            &positions,
            &deltas,
            &game.moves,
            self.settings.max_variation_moves,
        );
        if self.settings.selective {
            assessments.retain(MoveAssessment::is_critical);
        }

        let outcome = match end {
            PassEnd::Done => RunOutcome::Complete,
            PassEnd::Cancelled => RunOutcome::Cancelled,
            PassEnd::Failed(message) => {
                tracing::warn!("game {} analysis failed: {}", game.game_id, message);
                RunOutcome::Failed { message }
            }
        };
        tracing::info!(
            "game {} done: {} positions, {} assessments",
            game.game_id,
            positions.len(),
            assessments.len()
        );

        Ok(GameAnalysisResult {
            game_id: game.game_id.clone(),
            engine_name,
            analyzed_at: Utc::now(),
            positions,
            assessments,
            outcome,
        })
    }

    /// Shallow screening pass, then full-strength re-analysis of the
    /// positions around every swing at or above the critical threshold.
    #[allow(clippy::too_many_arguments)]
    fn run_selective<F>(
        &self,
        session: &mut EngineSession,
        game: &GameRecord,
        planned: &[usize],
        cancel: &CancelToken,
        restarted: &mut bool,
        completed: &mut usize,
        total: &mut usize,
        on_progress: &mut F,
        positions: &mut Vec<PositionEvaluation>,
    ) -> PassEnd
    where
        F: FnMut(&Progress),
    {
        let end = self.run_pass(
            session,
            game,
            planned,
            self.settings.shallow_depth,
            None,
            1,
            cancel,
            restarted,
            completed,
            *total,
            on_progress,
            positions,
        );
        if !matches!(end, PassEnd::Done) {
            return end;
        }

        let deltas = classify(positions, &self.settings.thresholds);
        let critical: Vec<usize> = select_critical(&deltas, self.settings.critical_threshold_cp)
            .into_iter()
            .collect();
        tracing::info!(
            "game {}: {} critical positions after screening",
            game.game_id,
            critical.len()
        );
        *total += critical.len();

        self.run_pass(
            session,
            game,
            &critical,
            self.settings.depth,
            Some(self.settings.time_per_position()),
            self.settings.multipv,
            cancel,
            restarted,
            completed,
            *total,
            on_progress,
            positions,
        )
    }

    /// Analyze the given position indices, recovering from one crash.
    #[allow(clippy::too_many_arguments)]
    fn run_pass<F>(
        &self,
        session: &mut EngineSession,
        game: &GameRecord,
        indices: &[usize],
        depth: u32,
        movetime: Option<Duration>,
        multipv: u32,
        cancel: &CancelToken,
        restarted: &mut bool,
        completed: &mut usize,
        total: usize,
        on_progress: &mut F,
        positions: &mut Vec<PositionEvaluation>,
    ) -> PassEnd
    where
        F: FnMut(&Progress),
    {
        let mut queue = indices.iter().copied();
        let mut current = queue.next();
        while let Some(index) = current {
            if cancel.is_cancelled() {
                return PassEnd::Cancelled;
            }
            let request = AnalysisRequest {
                position: PositionSpec {
                    fen: game.starting_fen.clone(),
                    moves: game.moves[..index].to_vec(),
                },
                depth: Some(depth),
                movetime,
                multipv,
            };
            match analyze_position(session, &request, index, cancel) {
                Ok(eval) => {
                    merge_evaluation(positions, eval);
                    *completed += 1;
                    on_progress(&Progress {
                        completed: *completed,
                        total,
                        position_index: index,
                    });
                    current = queue.next();
                }
                Err(AnalysisError::Cancelled) => return PassEnd::Cancelled,
                Err(AnalysisError::Session(e)) => {
                    if *restarted {
                        return PassEnd::Failed(e.to_string());
                    }
                    tracing::warn!(
                        "engine failed at position {} ({}), restarting once",
                        index,
                        e
                    );
                    *restarted = true;
                    *session = match self.spawn_session() {
                        Ok(replacement) => replacement,
                        Err(spawn_err) => return PassEnd::Failed(spawn_err.to_string()),
                    };
                    // Same index again on the fresh session.
                }
                Err(AnalysisError::InvalidRequest(msg)) => return PassEnd::Failed(msg),
            }
        }
        PassEnd::Done
    }

    fn spawn_session(&self) -> Result<EngineSession, SessionError> {
        let mut session =
            EngineSession::spawn(&self.settings.engine_path, &self.settings.engine_options)?;
        session.new_game()?;
        Ok(session)
    }
}

/// A full-strength result replaces the screening result for its index.
fn merge_evaluation(positions: &mut Vec<PositionEvaluation>, eval: PositionEvaluation) {
    match positions.iter_mut().find(|p| p.move_index == eval.move_index) {
        Some(slot) => *slot = eval,
        None => positions.push(eval),
    }
}
