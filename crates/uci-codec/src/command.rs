//! Encoding of GUI-to-engine commands.

/// Commands sent from the GUI side to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    /// Initialize UCI mode.
    Uci,
    /// Check if the engine is ready.
    IsReady,
    /// Set an engine option.
    SetOption { name: String, value: String },
    /// Reset state for a new game.
    NewGame,
    /// Set up a position, from FEN or the starting position, plus moves.
    Position {
        fen: Option<String>,
        moves: Vec<String>,
    },
    /// Start calculating.
    Go(GoLimits),
    /// Stop calculating. The engine still answers with `bestmove`.
    Stop,
    /// Quit the engine.
    Quit,
}

/// Search limits for the `go` command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GoLimits {
    /// Search to this depth in plies.
    pub depth: Option<u32>,
    /// Search for exactly this time in milliseconds.
    pub movetime: Option<u64>,
    /// Search indefinitely until `stop`.
    pub infinite: bool,
}

impl EngineCommand {
    /// Render the command as a protocol line, without the terminator.
    pub fn to_uci(&self) -> String {
        match self {
            EngineCommand::Uci => "uci".to_string(),
            EngineCommand::IsReady => "isready".to_string(),
            EngineCommand::SetOption { name, value } => {
                format!("setoption name {} value {}", name, value)
            }
            EngineCommand::NewGame => "ucinewgame".to_string(),
            EngineCommand::Position { fen, moves } => {
                let mut line = match fen {
                    Some(fen) => format!("position fen {}", fen),
                    None => "position startpos".to_string(),
                };
                if !moves.is_empty() {
                    line.push_str(" moves ");
                    line.push_str(&moves.join(" "));
                }
                line
            }
            EngineCommand::Go(limits) => {
                let mut parts = vec!["go".to_string()];
                if let Some(d) = limits.depth {
                    parts.push(format!("depth {}", d));
                }
                if let Some(ms) = limits.movetime {
                    parts.push(format!("movetime {}", ms));
                }
                if limits.infinite {
                    parts.push("infinite".to_string());
                }
                parts.join(" ")
            }
            EngineCommand::Stop => "stop".to_string(),
            EngineCommand::Quit => "quit".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_handshake_commands() {
        assert_eq!(EngineCommand::Uci.to_uci(), "uci");
        assert_eq!(EngineCommand::IsReady.to_uci(), "isready");
        assert_eq!(EngineCommand::NewGame.to_uci(), "ucinewgame");
        assert_eq!(EngineCommand::Stop.to_uci(), "stop");
        assert_eq!(EngineCommand::Quit.to_uci(), "quit");
    }

    #[test]
    fn encode_setoption() {
        let cmd = EngineCommand::SetOption {
            name: "MultiPV".to_string(),
            value: "3".to_string(),
        };
        assert_eq!(cmd.to_uci(), "setoption name MultiPV value 3");
    }

    #[test]
    fn encode_position_startpos() {
        let cmd = EngineCommand::Position {
            fen: None,
            moves: vec![],
        };
        assert_eq!(cmd.to_uci(), "position startpos");
    }

    #[test]
    fn encode_position_startpos_with_moves() {
        let cmd = EngineCommand::Position {
            fen: None,
            moves: vec!["e2e4".to_string(), "e7e5".to_string()],
        };
        assert_eq!(cmd.to_uci(), "position startpos moves e2e4 e7e5");
    }

    #[test]
    fn encode_position_fen() {
        let cmd = EngineCommand::Position {
            fen: Some("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1".to_string()),
            moves: vec!["e7e5".to_string()],
        };
        assert_eq!(
            cmd.to_uci(),
            "position fen rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1 moves e7e5"
        );
    }

    #[test]
    fn encode_go_depth_and_movetime() {
        let cmd = EngineCommand::Go(GoLimits {
            depth: Some(18),
            movetime: Some(500),
            infinite: false,
        });
        assert_eq!(cmd.to_uci(), "go depth 18 movetime 500");
    }

    #[test]
    fn encode_go_infinite() {
        let cmd = EngineCommand::Go(GoLimits {
            infinite: true,
            ..Default::default()
        });
        assert_eq!(cmd.to_uci(), "go infinite");
    }
}
