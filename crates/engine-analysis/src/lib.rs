//! Game analysis driven by an external UCI engine.
//!
//! Spawns an engine process, walks a game position by position, keeps the
//! deepest multi-variation evaluations, classifies every move by how much
//! the evaluation shifted and generates human-readable comments for the
//! noteworthy ones.
//!
//! # Example
//!
//! ```no_run
//! use engine_analysis::{AnalysisSettings, CancelToken, GameRecord, GameScheduler};
//!
//! let settings = AnalysisSettings::for_engine("/usr/bin/stockfish");
//! let scheduler = GameScheduler::new(settings);
//! let game = GameRecord {
//!     game_id: "game-1".to_string(),
//!     starting_fen: None,
//!     moves: vec!["e2e4".to_string(), "e7e5".to_string()],
//! };
//! let result = scheduler
//!     .analyze_game(&game, &CancelToken::new(), None, |_| {})
//!     .unwrap();
//! for assessment in &result.assessments {
//!     println!("move {}: {}", assessment.move_index + 1, assessment.comment);
//! }
//! ```

pub mod analyzer;
pub mod annotate;
pub mod classifier;
pub mod config;
pub mod evaluation;
pub mod scheduler;
pub mod session;

pub use analyzer::{analyze_position, AnalysisError, AnalysisRequest, PositionSpec};
pub use annotate::{assess, comment_for, format_eval};
pub use classifier::{
    categorize, classify, select_critical, ClassifyThresholds, MoveAssessment, MoveCategory,
    MoveDelta,
};
pub use config::{AnalysisSettings, ConfigError};
pub use evaluation::{
    flip, mover_centipawns, white_centipawns, Color, PositionEvaluation, VariationLine,
    MATE_SCORE_CP,
};
pub use scheduler::{
    CancelToken, EvaluationStore, GameAnalysisResult, GameRecord, GameScheduler, Progress,
    RunOutcome, SchedulerError,
};
pub use session::{EngineSession, SearchEvent, SessionError, SessionState};
