//! Game and pair results.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::rules::DrawReason;
use crate::types::{Color, MatchPair};

/// Numeric result of a game in PGN notation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameResult {
    #[serde(rename = "1-0")]
    WhiteWins,
    #[serde(rename = "0-1")]
    BlackWins,
    #[serde(rename = "1/2-1/2")]
    Draw,
    #[serde(rename = "*")]
    Unknown,
}

impl GameResult {
    pub fn win_for(color: Color) -> Self {
        match color {
            Color::White => GameResult::WhiteWins,
            Color::Black => GameResult::BlackWins,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GameResult::WhiteWins => "1-0",
            GameResult::BlackWins => "0-1",
            GameResult::Draw => "1/2-1/2",
            GameResult::Unknown => "*",
        }
    }

    /// Points earned by `color`: win 1, draw 0.5, loss 0, unknown 0.
    pub fn points(self, color: Color) -> f64 {
        match (self, color) {
            (GameResult::WhiteWins, Color::White) | (GameResult::BlackWins, Color::Black) => 1.0,
            (GameResult::Draw, _) => 0.5,
            _ => 0.0,
        }
    }

    pub fn winner(self) -> Option<Color> {
        match self {
            GameResult::WhiteWins => Some(Color::White),
            GameResult::BlackWins => Some(Color::Black),
            _ => None,
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The ten ways a game can end.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Checkmate,
    Stalemate,
    Draw,
    MaxMovesReached,
    TimeForfeit,
    EngineCrashed,
    IllegalMove,
    Resigned,
    Timeout,
    InternalError,
}

impl Termination {
    /// Forfeits end the game for a non-chess reason.
    pub fn is_forfeit(self) -> bool {
        matches!(
            self,
            Termination::TimeForfeit
                | Termination::EngineCrashed
                | Termination::IllegalMove
                | Termination::Resigned
                | Termination::Timeout
                | Termination::InternalError
        )
    }
}

/// Terminal state of a game. Variants carrying `loser` favor the other side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Checkmate { winner: Color },
    Stalemate,
    Draw(DrawReason),
    MaxMovesReached,
    TimeForfeit { loser: Color },
    EngineCrashed { loser: Color },
    IllegalMove { loser: Color, attempted: String },
    Resigned { loser: Color },
    Timeout { loser: Color },
    InternalError { reason: String },
}

impl Outcome {
    pub fn termination(&self) -> Termination {
        match self {
            Outcome::Checkmate { .. } => Termination::Checkmate,
            Outcome::Stalemate => Termination::Stalemate,
            Outcome::Draw(_) => Termination::Draw,
            Outcome::MaxMovesReached => Termination::MaxMovesReached,
            Outcome::TimeForfeit { .. } => Termination::TimeForfeit,
            Outcome::EngineCrashed { .. } => Termination::EngineCrashed,
            Outcome::IllegalMove { .. } => Termination::IllegalMove,
            Outcome::Resigned { .. } => Termination::Resigned,
            Outcome::Timeout { .. } => Termination::Timeout,
            Outcome::InternalError { .. } => Termination::InternalError,
        }
    }

    pub fn result(&self) -> GameResult {
        match self {
            Outcome::Checkmate { winner } => GameResult::win_for(*winner),
            Outcome::Stalemate | Outcome::Draw(_) | Outcome::MaxMovesReached => GameResult::Draw,
            Outcome::TimeForfeit { loser }
            | Outcome::EngineCrashed { loser }
            | Outcome::IllegalMove { loser, .. }
            | Outcome::Resigned { loser }
            | Outcome::Timeout { loser } => GameResult::win_for(loser.other()),
            Outcome::InternalError { .. } => GameResult::Unknown,
        }
    }

    /// Reason string carried by `game_end` events and logs.
    pub fn reason(&self) -> String {
        match self {
            Outcome::Checkmate { .. } => "checkmate".to_string(),
            Outcome::Stalemate => "stalemate".to_string(),
            Outcome::Draw(reason) => reason.as_str().to_string(),
            Outcome::MaxMovesReached => "max_moves".to_string(),
            Outcome::TimeForfeit { .. } => "time_forfeit".to_string(),
            Outcome::EngineCrashed { .. } => "engine_crash".to_string(),
            Outcome::IllegalMove { .. } => "illegal_move".to_string(),
            Outcome::Resigned { .. } => "resignation".to_string(),
            Outcome::Timeout { .. } => "timeout".to_string(),
            Outcome::InternalError { reason } => format!("internal_error: {reason}"),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::IllegalMove { loser, attempted } => {
                write!(f, "{} ({loser} played `{attempted}`)", self.result())
            }
            Outcome::TimeForfeit { loser }
            | Outcome::EngineCrashed { loser }
            | Outcome::Resigned { loser }
            | Outcome::Timeout { loser } => {
                write!(f, "{} ({} by {loser})", self.result(), self.reason())
            }
            _ => write!(f, "{} ({})", self.result(), self.reason()),
        }
    }
}

/// Immutable record of one finished game.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameRecord {
    pub game_id: u32,
    pub white: String,
    pub black: String,
    pub outcome: Outcome,
    /// Plies played.
    pub move_count: u32,
}

impl GameRecord {
    pub fn result(&self) -> GameResult {
        self.outcome.result()
    }

    pub fn reason(&self) -> String {
        self.outcome.reason()
    }

    /// Points earned by the engine called `name` in this game.
    pub fn points_for(&self, name: &str) -> f64 {
        if name == self.white {
            self.result().points(Color::White)
        } else if name == self.black {
            self.result().points(Color::Black)
        } else {
            0.0
        }
    }
}

/// Both games of a pair. Game 1 has engine1 as white, game 2 swaps colors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PairOutcome {
    pub pair_id: u32,
    pub engine1: String,
    pub engine2: String,
    pub games: [GameRecord; 2],
}

impl PairOutcome {
    pub fn new(
        pair_id: u32,
        engine1: impl Into<String>,
        engine2: impl Into<String>,
        game1: GameRecord,
        game2: GameRecord,
    ) -> Self {
        Self {
            pair_id,
            engine1: engine1.into(),
            engine2: engine2.into(),
            games: [game1, game2],
        }
    }

    /// Both games reported as `InternalError` with the same reason. Used when
    /// the pair could not be played at all.
    pub fn forfeit(pair: &MatchPair, engine1: &str, engine2: &str, reason: &str) -> Self {
        let record = |game_id, white: &str, black: &str| GameRecord {
            game_id,
            white: white.to_string(),
            black: black.to_string(),
            outcome: Outcome::InternalError {
                reason: reason.to_string(),
            },
            move_count: 0,
        };
        Self::new(
            pair.pair_id,
            engine1,
            engine2,
            record(pair.game1_id(), engine1, engine2),
            record(pair.game2_id(), engine2, engine1),
        )
    }

    /// engine1 is white in game 1 and black in game 2.
    pub fn engine1_score(&self) -> f64 {
        self.games[0].result().points(Color::White) + self.games[1].result().points(Color::Black)
    }

    pub fn engine2_score(&self) -> f64 {
        self.games[0].result().points(Color::Black) + self.games[1].result().points(Color::White)
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod record_tests;
