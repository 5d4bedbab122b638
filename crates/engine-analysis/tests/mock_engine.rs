//! End-to-end tests against a scripted mock engine.
//!
//! The mock is a small shell script speaking just enough of the protocol
//! for each scenario, so these tests run without a real engine installed.
//! A final test against a locally installed Stockfish is ignored by
//! default.

#![cfg(unix)]

use std::collections::HashMap;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;

use engine_analysis::{
    analyze_position, AnalysisError, AnalysisRequest, AnalysisSettings, CancelToken, Color,
    EvaluationStore, GameRecord, GameScheduler, MoveCategory, PositionSpec, RunOutcome,
    SessionError, SessionState,
};
use engine_analysis::session::EngineSession;
use tempfile::TempDir;
use uci_codec::GoLimits;

/// Write an executable mock engine whose per-command behavior is `body`,
/// a set of shell `case` arms matched against each incoming line.
fn write_engine(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("mock-engine.sh");
    let script = format!(
        "#!/bin/sh\n\
         while read -r line; do\n\
         case \"$line\" in\n\
         uci)\n\
           echo 'id name MockFish 1.0'\n\
           echo 'id author nobody'\n\
           echo 'uciok'\n\
           ;;\n\
         isready) echo 'readyok' ;;\n\
         quit) exit 0 ;;\n\
         {body}\n\
         *) : ;;\n\
         esac\n\
         done\n"
    );
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(script.as_bytes()).unwrap();
    drop(file);
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Engine that answers any `go` instantly with a fixed line.
const INSTANT_GO: &str = "go*)\n\
    echo 'info depth 10 multipv 1 score cp 30 pv e2e4 e7e5'\n\
    echo 'bestmove e2e4'\n\
    ;;";

/// Engine that keeps searching until told to stop.
const HANGING_GO: &str = "go*)\n\
    echo 'info depth 6 multipv 1 score cp 12 pv e2e4'\n\
    while read -r inner; do\n\
      case \"$inner\" in\n\
        stop) echo 'bestmove e2e4'; break ;;\n\
        quit) exit 0 ;;\n\
      esac\n\
    done\n\
    ;;";

/// Three-position game script: start, after f2f3, after f2f3 e7e5.
/// Scores are side-to-move relative; White's first move is a blunder.
/// Screening requests (depth 8) are reported at depth 8, everything else
/// at depth 18.
const GAME_GO: &str = "position*) last=\"$line\" ;;\n\
    go*)\n\
    case \"$line\" in\n\
      'go depth 8'*) d=8 ;;\n\
      *) d=18 ;;\n\
    esac\n\
    case \"$last\" in\n\
      'position startpos moves f2f3 e7e5') cp=-305; pv='g1f3 g8f6' ;;\n\
      'position startpos moves f2f3') cp=310; pv='d8h4 g2g3' ;;\n\
      *) cp=20; pv='e2e4 e7e5 g1f3' ;;\n\
    esac\n\
    echo \"info depth $d multipv 1 score cp $cp pv $pv\"\n\
    echo 'bestmove e2e4'\n\
    ;;";

/// Two-position game from a FEN base: level before the move, +350 for
/// White after it. Scores are side-to-move relative.
const FEN_GAME_GO: &str = "position*) last=\"$line\" ;;\n\
    go*)\n\
    case \"$last\" in\n\
      *moves*) cp=350; pv='e2e4 d7d5' ;;\n\
      *) cp=0; pv='d7d5 e2e4' ;;\n\
    esac\n\
    echo \"info depth 18 multipv 1 score cp $cp pv $pv\"\n\
    echo 'bestmove e2e4'\n\
    ;;";

fn game() -> GameRecord {
    GameRecord {
        game_id: "test-game".to_string(),
        starting_fen: None,
        moves: vec!["f2f3".to_string(), "e7e5".to_string()],
    }
}

fn settings_for(path: PathBuf) -> AnalysisSettings {
    let mut settings = AnalysisSettings::for_engine(path);
    settings.time_per_position_ms = 2_000;
    settings.multipv = 1;
    settings
}

#[test]
fn handshake_captures_engine_name() {
    let dir = TempDir::new().unwrap();
    let engine = write_engine(&dir, INSTANT_GO);
    let mut session = EngineSession::spawn(&engine, &HashMap::new()).unwrap();
    assert_eq!(session.name(), "MockFish 1.0");
    assert_eq!(session.state(), SessionState::Ready);
    session.shutdown().unwrap();
    assert_eq!(session.state(), SessionState::Stopped);
}

#[test]
fn second_search_while_in_flight_is_busy() {
    let dir = TempDir::new().unwrap();
    let engine = write_engine(&dir, HANGING_GO);
    let mut session = EngineSession::spawn(&engine, &HashMap::new()).unwrap();

    let limits = GoLimits {
        depth: None,
        movetime: None,
        infinite: true,
    };
    session.begin_search(None, &[], &limits).unwrap();
    let err = session.begin_search(None, &[], &limits).unwrap_err();
    assert!(matches!(err, SessionError::Busy));

    let best = session.stop().unwrap();
    assert_eq!(best, "e2e4");
    assert_eq!(session.state(), SessionState::Ready);
}

#[test]
fn deeper_reports_replace_shallower_per_rank() {
    let dir = TempDir::new().unwrap();
    // Two ranks, a deeper rank-1 update, then a late shallower rank-1
    // report that must not win.
    let body = "go*)\n\
        echo 'info depth 10 multipv 1 score cp 50 pv e2e4 e7e5'\n\
        echo 'info depth 10 multipv 2 score cp 10 pv d2d4 d7d5'\n\
        echo 'info depth 12 multipv 1 score cp 55 pv e2e4 c7c5'\n\
        echo 'info depth 9 multipv 1 score cp 99 pv a2a3'\n\
        echo 'bestmove e2e4'\n\
        ;;";
    let engine = write_engine(&dir, body);
    let mut session = EngineSession::spawn(&engine, &HashMap::new()).unwrap();

    let request = AnalysisRequest {
        position: PositionSpec::startpos(vec![]),
        depth: Some(12),
        movetime: None,
        multipv: 2,
    };
    let eval = analyze_position(&mut session, &request, 0, &CancelToken::new()).unwrap();

    assert_eq!(eval.lines.len(), 2);
    assert_eq!(eval.lines[0].depth, 12);
    assert_eq!(eval.lines[0].moves, vec!["e2e4", "c7c5"]);
    assert_eq!(eval.lines[1].rank, 2);
    assert_eq!(eval.lines[1].depth, 10);
    assert_eq!(eval.white_score_cp, 55);
}

#[test]
fn time_budget_stops_a_hanging_search() {
    let dir = TempDir::new().unwrap();
    let engine = write_engine(&dir, HANGING_GO);
    let mut session = EngineSession::spawn(&engine, &HashMap::new()).unwrap();

    let request = AnalysisRequest {
        position: PositionSpec::startpos(vec![]),
        depth: None,
        movetime: Some(Duration::from_millis(200)),
        multipv: 1,
    };
    let eval = analyze_position(&mut session, &request, 0, &CancelToken::new()).unwrap();

    assert_eq!(eval.best_move.as_deref(), Some("e2e4"));
    assert_eq!(eval.lines.len(), 1);
    assert_eq!(session.state(), SessionState::Ready);
}

#[test]
fn cancelled_search_returns_session_to_ready() {
    let dir = TempDir::new().unwrap();
    let engine = write_engine(&dir, HANGING_GO);
    let mut session = EngineSession::spawn(&engine, &HashMap::new()).unwrap();

    let cancel = CancelToken::new();
    cancel.cancel();
    let request = AnalysisRequest {
        position: PositionSpec::startpos(vec![]),
        depth: Some(10),
        movetime: None,
        multipv: 1,
    };
    let err = analyze_position(&mut session, &request, 0, &cancel).unwrap_err();
    assert!(matches!(err, AnalysisError::Cancelled));
    assert_eq!(session.state(), SessionState::Ready);
}

#[test]
fn full_run_classifies_the_blunder() {
    let dir = TempDir::new().unwrap();
    let engine = write_engine(&dir, GAME_GO);
    let scheduler = GameScheduler::new(settings_for(engine));

    let mut seen = Vec::new();
    let result = scheduler
        .analyze_game(&game(), &CancelToken::new(), None, |p| {
            seen.push((p.completed, p.total, p.position_index));
        })
        .unwrap();

    assert_eq!(result.outcome, RunOutcome::Complete);
    assert_eq!(result.engine_name, "MockFish 1.0");
    assert_eq!(result.positions.len(), 3);
    assert_eq!(seen, vec![(1, 3, 0), (2, 3, 1), (3, 3, 2)]);

    // White-positive sequence is +20, -310, -305.
    assert_eq!(result.positions[0].white_score_cp, 20);
    assert_eq!(result.positions[1].white_score_cp, -310);
    assert_eq!(result.positions[2].white_score_cp, -305);

    assert_eq!(result.assessments.len(), 2);
    let blunder = &result.assessments[0];
    assert_eq!(blunder.move_index, 0);
    assert_eq!(blunder.delta_cp, -330);
    assert_eq!(blunder.category, MoveCategory::Blunder);
    assert!(blunder.comment.contains("from +0.20 to -3.10"));
    assert!(blunder.comment.contains("Better was e2e4"));
    assert_eq!(result.assessments[1].category, MoveCategory::Neutral);
}

#[test]
fn fen_start_attributes_the_move_to_the_recorded_turn() {
    let dir = TempDir::new().unwrap();
    let engine = write_engine(&dir, FEN_GAME_GO);
    let scheduler = GameScheduler::new(settings_for(engine));

    // Black to move in the base position; Black's move loses 350 cp.
    let game = GameRecord {
        game_id: "fen-game".to_string(),
        starting_fen: Some(
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1".to_string(),
        ),
        moves: vec!["g8f6".to_string()],
    };
    let result = scheduler
        .analyze_game(&game, &CancelToken::new(), None, |_| {})
        .unwrap();

    assert_eq!(result.outcome, RunOutcome::Complete);
    assert_eq!(result.positions.len(), 2);
    assert_eq!(result.positions[0].side_to_move, Color::Black);
    assert_eq!(result.positions[0].white_score_cp, 0);
    assert_eq!(result.positions[1].side_to_move, Color::White);
    assert_eq!(result.positions[1].white_score_cp, 350);

    let assessment = &result.assessments[0];
    assert_eq!(assessment.mover, Color::Black);
    assert_eq!(assessment.delta_cp, -350);
    assert_eq!(assessment.category, MoveCategory::Blunder);
    assert!(assessment.comment.contains("Better was d7d5"));
}

#[test]
fn selective_run_deepens_only_critical_positions() {
    let dir = TempDir::new().unwrap();
    let engine = write_engine(&dir, GAME_GO);
    let mut settings = settings_for(engine);
    settings.selective = true;
    let scheduler = GameScheduler::new(settings);

    let result = scheduler
        .analyze_game(&game(), &CancelToken::new(), None, |_| {})
        .unwrap();

    assert_eq!(result.outcome, RunOutcome::Complete);
    assert_eq!(result.positions.len(), 3);
    // The 330 cp swing selects positions 0 and 1 for a full-depth look;
    // position 2 keeps its screening evaluation.
    assert_eq!(result.positions[0].depth, 18);
    assert_eq!(result.positions[1].depth, 18);
    assert_eq!(result.positions[2].depth, 8);

    // Only the noteworthy move is reported.
    assert_eq!(result.assessments.len(), 1);
    assert_eq!(result.assessments[0].category, MoveCategory::Blunder);
}

#[test]
fn cancellation_keeps_finished_positions() {
    let dir = TempDir::new().unwrap();
    let engine = write_engine(&dir, GAME_GO);
    let scheduler = GameScheduler::new(settings_for(engine));

    let cancel = CancelToken::new();
    let handle = cancel.clone();
    let result = scheduler
        .analyze_game(&game(), &cancel, None, move |p| {
            if p.completed == 1 {
                handle.cancel();
            }
        })
        .unwrap();

    assert_eq!(result.outcome, RunOutcome::Cancelled);
    assert_eq!(result.positions.len(), 1);
    assert!(result.assessments.is_empty());
}

#[test]
fn one_crash_is_absorbed_by_a_restart() {
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("crashed-once");
    let body = format!(
        "position*) last=\"$line\" ;;\n\
         go*)\n\
         if [ ! -f '{m}' ]; then touch '{m}'; exit 1; fi\n\
         echo 'info depth 18 multipv 1 score cp 20 pv e2e4'\n\
         echo 'bestmove e2e4'\n\
         ;;",
        m = marker.display()
    );
    let engine = write_engine(&dir, &body);
    let scheduler = GameScheduler::new(settings_for(engine));

    let result = scheduler
        .analyze_game(&game(), &CancelToken::new(), None, |_| {})
        .unwrap();

    assert_eq!(result.outcome, RunOutcome::Complete);
    assert_eq!(result.positions.len(), 3);
}

#[test]
fn repeated_crashes_end_the_run_with_partial_results() {
    let dir = TempDir::new().unwrap();
    let body = "go*) exit 1 ;;";
    let engine = write_engine(&dir, body);
    let scheduler = GameScheduler::new(settings_for(engine));

    let result = scheduler
        .analyze_game(&game(), &CancelToken::new(), None, |_| {})
        .unwrap();

    assert!(matches!(result.outcome, RunOutcome::Failed { .. }));
    assert!(result.positions.is_empty());
    assert!(result.assessments.is_empty());
}

struct FixedStore(Vec<usize>);

impl EvaluationStore for FixedStore {
    fn contains(&self, _game_id: &str, position_index: usize, _settings: &AnalysisSettings) -> bool {
        self.0.contains(&position_index)
    }
}

#[test]
fn stored_positions_are_skipped_and_leave_gaps() {
    let dir = TempDir::new().unwrap();
    let engine = write_engine(&dir, GAME_GO);
    let scheduler = GameScheduler::new(settings_for(engine));

    let store = FixedStore(vec![1]);
    let result = scheduler
        .analyze_game(&game(), &CancelToken::new(), Some(&store), |_| {})
        .unwrap();

    assert_eq!(result.outcome, RunOutcome::Complete);
    let indices: Vec<usize> = result.positions.iter().map(|p| p.move_index).collect();
    assert_eq!(indices, vec![0, 2]);
    // Both moves touch the missing position, so neither is assessed.
    assert!(result.assessments.is_empty());
}

#[test]
fn missing_engine_fails_the_spawn() {
    let settings = AnalysisSettings::for_engine("/nonexistent/engine");
    let scheduler = GameScheduler::new(settings);
    let err = scheduler
        .analyze_game(&game(), &CancelToken::new(), None, |_| {})
        .unwrap_err();
    assert!(err.to_string().contains("/nonexistent/engine"));
}

#[test]
#[ignore = "requires Stockfish installed at /usr/bin/stockfish"]
fn real_stockfish_finds_the_hanging_queen() {
    let mut settings = AnalysisSettings::for_engine("/usr/bin/stockfish");
    settings.depth = 12;
    settings.multipv = 2;
    let scheduler = GameScheduler::new(settings);

    // 1. e4 e5 2. Qh5?? Nc6 3. Qxe5+?? loses the queen to ...Nxe5.
    let game = GameRecord {
        game_id: "stockfish-smoke".to_string(),
        starting_fen: None,
        moves: ["e2e4", "e7e5", "d1h5", "b8c6", "h5e5"]
            .iter()
            .map(|m| m.to_string())
            .collect(),
    };
    let result = scheduler
        .analyze_game(&game, &CancelToken::new(), None, |_| {})
        .unwrap();

    assert_eq!(result.outcome, RunOutcome::Complete);
    assert_eq!(result.positions.len(), 6);
    let last_move = result.assessments.last().unwrap();
    assert_eq!(last_move.category, MoveCategory::Blunder);
}
