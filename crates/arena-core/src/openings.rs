//! Opening books: one FEN per line, `#` starts a comment.

use std::path::Path;

use crate::types::StartPosition;

/// A line that looked like a position but was not accepted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectedLine {
    /// 1-based.
    pub line_number: usize,
    pub text: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OpeningBook {
    pub positions: Vec<StartPosition>,
    pub rejected: Vec<RejectedLine>,
}

impl OpeningBook {
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }
}

/// Parses opening-book text. Blank lines and comments are skipped; entries
/// with fewer than six FEN fields are collected in `rejected`.
pub fn parse_opening_book(text: &str) -> OpeningBook {
    let mut book = OpeningBook::default();

    for (idx, raw) in text.lines().enumerate() {
        let line = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        }
        .trim();
        if line.is_empty() {
            continue;
        }

        if line.split_whitespace().count() < 6 {
            book.rejected.push(RejectedLine {
                line_number: idx + 1,
                text: line.to_string(),
            });
            continue;
        }

        book.positions.push(StartPosition::from_book_entry(line));
    }

    book
}

pub fn load_opening_book(path: &Path) -> std::io::Result<OpeningBook> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_opening_book(&text))
}

/// Cheap structural check: six fields, eight ranks of eight squares, a side
/// to move. Legality is left to the rules oracle.
pub fn is_plausible_fen(fen: &str) -> bool {
    let parts: Vec<&str> = fen.split_whitespace().collect();
    if parts.len() < 6 {
        return false;
    }

    let ranks: Vec<&str> = parts[0].split('/').collect();
    if ranks.len() != 8 {
        return false;
    }
    for rank in ranks {
        let mut squares = 0u32;
        for c in rank.chars() {
            match c {
                '1'..='8' => squares += c.to_digit(10).unwrap_or(0),
                'p' | 'n' | 'b' | 'r' | 'q' | 'k' | 'P' | 'N' | 'B' | 'R' | 'Q' | 'K' => {
                    squares += 1
                }
                _ => return false,
            }
        }
        if squares != 8 {
            return false;
        }
    }

    matches!(parts[1], "w" | "b")
}

/// A small built-in set of popular opening positions.
pub fn common_openings() -> Vec<StartPosition> {
    [
        crate::types::START_FEN,
        // 1.e4
        "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1",
        // 1.d4
        "rnbqkbnr/pppppppp/8/8/3P4/8/PPP1PPPP/RNBQKBNR b KQkq d3 0 1",
        // English
        "rnbqkbnr/pppppppp/8/8/2P5/8/PP1PPPPP/RNBQKBNR b KQkq c3 0 1",
        // 1.Nf3
        "rnbqkbnr/pppppppp/8/8/8/5N2/PPPPPPPP/RNBQKB1R b KQkq - 1 1",
        // Open game
        "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq e6 0 2",
        // Sicilian
        "rnbqkbnr/pp1ppppp/8/2p5/4P3/8/PPPP1PPP/RNBQKBNR w KQkq c6 0 2",
        // Closed game
        "rnbqkbnr/ppp1pppp/8/3p4/3P4/8/PPP1PPPP/RNBQKBNR w KQkq d6 0 2",
        // Indian defenses
        "rnbqkb1r/pppppppp/5n2/8/3P4/8/PPP1PPPP/RNBQKBNR w KQkq - 1 2",
    ]
    .into_iter()
    .map(StartPosition::from_book_entry)
    .collect()
}

#[cfg(test)]
#[path = "openings_tests.rs"]
mod openings_tests;
