//! Chess rules oracle.
//!
//! Games treat the oracle as the single source of truth for move legality and
//! for checkmate/stalemate/draw detection. [`RulesOracle`] is the narrow
//! query surface the game loop consumes; [`ChessRules`] implements it on top
//! of `cozy-chess`.

use cozy_chess::{Board, File, Move, Piece, Square};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Color, StartPosition};

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("invalid FEN `{fen}`: {reason}")]
    InvalidFen { fen: String, reason: String },
}

/// Why a position is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawReason {
    InsufficientMaterial,
    ThreefoldRepetition,
    FiftyMoveRule,
    Other,
}

impl DrawReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DrawReason::InsufficientMaterial => "insufficient_material",
            DrawReason::ThreefoldRepetition => "threefold_repetition",
            DrawReason::FiftyMoveRule => "fifty_move_rule",
            DrawReason::Other => "draw",
        }
    }
}

/// Terminal verdict on a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Checkmate { winner: Color },
    Stalemate,
    Draw(DrawReason),
}

pub trait RulesOracle: Send {
    /// Plays a UCI move. Returns `false` (and leaves the position untouched)
    /// if the move is not legal.
    fn apply_move(&mut self, uci_move: &str) -> bool;

    fn is_move_legal(&self, uci_move: &str) -> bool;

    fn is_checkmate(&self) -> bool;

    fn is_stalemate(&self) -> bool;

    fn is_insufficient_material(&self) -> bool;

    /// Any drawn position: stalemate, insufficient material, repetition or
    /// the fifty-move rule.
    fn is_draw(&self) -> bool;

    fn current_position_as_fen(&self) -> String;

    fn side_to_move(&self) -> Color;

    /// Terminal verdict for the current position, if any.
    fn verdict(&self) -> Option<Verdict> {
        if self.is_checkmate() {
            return Some(Verdict::Checkmate {
                winner: self.side_to_move().other(),
            });
        }
        if self.is_stalemate() {
            return Some(Verdict::Stalemate);
        }
        if self.is_insufficient_material() {
            return Some(Verdict::Draw(DrawReason::InsufficientMaterial));
        }
        if self.is_draw() {
            return Some(Verdict::Draw(DrawReason::Other));
        }
        None
    }
}

/// [`RulesOracle`] backed by a `cozy_chess::Board` plus the position history
/// needed for repetition detection.
#[derive(Debug, Clone)]
pub struct ChessRules {
    board: Board,
    history: Vec<u64>,
}

impl ChessRules {
    pub fn new() -> Self {
        Self::from_board(Board::default())
    }

    pub fn from_fen(fen: &str) -> Result<Self, RulesError> {
        let board = Board::from_fen(fen, false).map_err(|err| RulesError::InvalidFen {
            fen: fen.to_string(),
            reason: format!("{err:?}"),
        })?;
        Ok(Self::from_board(board))
    }

    pub fn from_start(start: &StartPosition) -> Result<Self, RulesError> {
        match start {
            StartPosition::Standard => Ok(Self::new()),
            StartPosition::Fen(fen) => Self::from_fen(fen),
        }
    }

    fn from_board(board: Board) -> Self {
        let history = vec![board.hash()];
        Self { board, history }
    }

    fn legal_moves(&self) -> Vec<Move> {
        let mut moves = Vec::new();
        self.board.generate_moves(|piece_moves| {
            moves.extend(piece_moves);
            false
        });
        moves
    }

    fn has_legal_moves(&self) -> bool {
        // generate_moves stops early when the callback returns true
        self.board.generate_moves(|_| true)
    }

    /// cozy-chess encodes castling as king-takes-rook; UCI uses the king's
    /// two-square step. Translate a legal move into its UCI spelling.
    fn to_uci(&self, mv: Move) -> String {
        let mut to = mv.to;
        let mover = self.board.side_to_move();
        if self.board.piece_on(mv.from) == Some(Piece::King)
            && self.board.colors(mover).has(mv.to)
        {
            let file = if (mv.to.file() as u8) > (mv.from.file() as u8) {
                File::G
            } else {
                File::C
            };
            to = Square::new(file, mv.from.rank());
        }
        let mut text = format!("{}{}", mv.from, to);
        if let Some(piece) = mv.promotion {
            text.push(promotion_char(piece));
        }
        text
    }

    fn find_legal(&self, uci_move: &str) -> Option<Move> {
        let wanted = uci_move.trim().to_ascii_lowercase();
        if wanted.len() < 4 {
            return None;
        }
        self.legal_moves()
            .into_iter()
            .find(|&mv| self.to_uci(mv) == wanted)
    }

    fn is_repetition(&self) -> bool {
        let current = self.board.hash();
        self.history.iter().filter(|&&hash| hash == current).count() >= 3
    }

    fn is_fifty_move_draw(&self) -> bool {
        self.board.halfmove_clock() >= 100
    }
}

impl Default for ChessRules {
    fn default() -> Self {
        Self::new()
    }
}

fn promotion_char(piece: Piece) -> char {
    match piece {
        Piece::Queen => 'q',
        Piece::Rook => 'r',
        Piece::Bishop => 'b',
        Piece::Knight => 'n',
        _ => 'q',
    }
}

/// 0 for dark squares, 1 for light ones.
fn square_shade(square: Square) -> u8 {
    (square.file() as u8 + square.rank() as u8) % 2
}

impl RulesOracle for ChessRules {
    fn apply_move(&mut self, uci_move: &str) -> bool {
        match self.find_legal(uci_move) {
            Some(mv) => {
                self.board.play_unchecked(mv);
                self.history.push(self.board.hash());
                true
            }
            None => false,
        }
    }

    fn is_move_legal(&self, uci_move: &str) -> bool {
        self.find_legal(uci_move).is_some()
    }

    fn is_checkmate(&self) -> bool {
        !self.board.checkers().is_empty() && !self.has_legal_moves()
    }

    fn is_stalemate(&self) -> bool {
        self.board.checkers().is_empty() && !self.has_legal_moves()
    }

    fn is_insufficient_material(&self) -> bool {
        let heavy_or_pawns = self.board.pieces(Piece::Pawn)
            | self.board.pieces(Piece::Rook)
            | self.board.pieces(Piece::Queen);
        if !heavy_or_pawns.is_empty() {
            return false;
        }
        let knights = self.board.pieces(Piece::Knight);
        let bishops = self.board.pieces(Piece::Bishop);
        if (knights | bishops).len() <= 1 {
            return true;
        }
        // bishops only, all on one square colour: no mate is possible
        if !knights.is_empty() {
            return false;
        }
        let mut shades = bishops.into_iter().map(square_shade);
        match shades.next() {
            Some(first) => shades.all(|shade| shade == first),
            None => true,
        }
    }

    fn is_draw(&self) -> bool {
        self.is_stalemate()
            || self.is_insufficient_material()
            || self.is_repetition()
            || self.is_fifty_move_draw()
    }

    fn current_position_as_fen(&self) -> String {
        self.board.to_string()
    }

    fn side_to_move(&self) -> Color {
        match self.board.side_to_move() {
            cozy_chess::Color::White => Color::White,
            cozy_chess::Color::Black => Color::Black,
        }
    }

    fn verdict(&self) -> Option<Verdict> {
        if !self.has_legal_moves() {
            return Some(if self.board.checkers().is_empty() {
                Verdict::Stalemate
            } else {
                Verdict::Checkmate {
                    winner: self.side_to_move().other(),
                }
            });
        }
        if self.is_insufficient_material() {
            return Some(Verdict::Draw(DrawReason::InsufficientMaterial));
        }
        if self.is_repetition() {
            return Some(Verdict::Draw(DrawReason::ThreefoldRepetition));
        }
        if self.is_fifty_move_draw() {
            return Some(Verdict::Draw(DrawReason::FiftyMoveRule));
        }
        None
    }
}

#[cfg(test)]
#[path = "rules_tests.rs"]
mod rules_tests;
