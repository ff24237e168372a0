use serde::{Deserialize, Serialize};
use std::fmt;

/// Standard initial position, used whenever a game starts from `startpos`.
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn other(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    pub fn idx(self) -> usize {
        match self {
            Color::White => 0,
            Color::Black => 1,
        }
    }

    pub fn is_white(self) -> bool {
        self == Color::White
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => f.write_str("white"),
            Color::Black => f.write_str("black"),
        }
    }
}

/// Where a game starts: the standard array or an arbitrary FEN.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartPosition {
    #[default]
    Standard,
    Fen(String),
}

impl StartPosition {
    /// Builds a start position from a book entry. `startpos` and the
    /// standard FEN both map to [`StartPosition::Standard`].
    pub fn from_book_entry(entry: &str) -> Self {
        let entry = entry.trim();
        if entry.is_empty() || entry == "startpos" || entry == START_FEN {
            StartPosition::Standard
        } else {
            StartPosition::Fen(entry.to_string())
        }
    }

    pub fn fen(&self) -> &str {
        match self {
            StartPosition::Standard => START_FEN,
            StartPosition::Fen(fen) => fen,
        }
    }

    pub fn is_standard(&self) -> bool {
        matches!(self, StartPosition::Standard)
    }
}

/// Two games between the same engines with colors swapped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchPair {
    pub pair_id: u32,
    pub start: StartPosition,
}

impl MatchPair {
    pub fn new(pair_id: u32, start: StartPosition) -> Self {
        Self { pair_id, start }
    }

    /// Game played with engine1 as white.
    pub fn game1_id(&self) -> u32 {
        self.pair_id * 2
    }

    /// Game played with engine2 as white.
    pub fn game2_id(&self) -> u32 {
        self.pair_id * 2 + 1
    }
}

impl fmt::Display for MatchPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pair {} (Games {}-{}) [{}]",
            self.pair_id,
            self.game1_id(),
            self.game2_id(),
            if self.start.is_standard() { "Standard" } else { "FEN" }
        )
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;
