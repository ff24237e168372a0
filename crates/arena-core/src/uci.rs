//! UCI text spoken to engine processes: outbound commands and the few inbound
//! lines the arena cares about (`bestmove`, `info`).

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::types::StartPosition;

pub const UCI: &str = "uci";
pub const UCI_OK: &str = "uciok";
pub const IS_READY: &str = "isready";
pub const READY_OK: &str = "readyok";
pub const NEW_GAME: &str = "ucinewgame";
pub const STOP: &str = "stop";
pub const QUIT: &str = "quit";

/// Centipawn value reported for "mate in 0".
pub const MATE_SCORE: i32 = 10_000;
/// Centipawns subtracted per move of mate distance.
pub const MATE_STEP: i32 = 100;
/// Number of PV moves kept for telemetry.
pub const PV_PREVIEW_LEN: usize = 5;

/// `position startpos|fen <fen> [moves m1 m2 ...]`
pub fn position_command(start: &StartPosition, moves: &[String]) -> String {
    let mut cmd = String::from("position ");
    match start {
        StartPosition::Standard => cmd.push_str("startpos"),
        StartPosition::Fen(fen) => {
            cmd.push_str("fen ");
            cmd.push_str(fen);
        }
    }
    if !moves.is_empty() {
        cmd.push_str(" moves");
        for mv in moves {
            cmd.push(' ');
            cmd.push_str(mv);
        }
    }
    cmd
}

/// `go wtime <ms> btime <ms> winc <ms> binc <ms>`
pub fn go_command(clock: &Clock) -> String {
    use crate::types::Color::{Black, White};
    format!(
        "go wtime {} btime {} winc {} binc {}",
        clock.remaining(White),
        clock.remaining(Black),
        clock.increment(White),
        clock.increment(Black)
    )
}

/// Returns the move token of a `bestmove` line, ignoring any `ponder` suffix.
///
/// A bare `bestmove` yields `Some("")`; callers treat that as resignation.
pub fn parse_bestmove(line: &str) -> Option<&str> {
    let mut parts = line.split_whitespace();
    if parts.next()? != "bestmove" {
        return None;
    }
    Some(parts.next().unwrap_or(""))
}

/// Engine score as reported on an `info` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Centipawns(i32),
    /// Moves to mate; negative when the reporting side is being mated.
    Mate(i32),
}

impl Score {
    /// Single numeric scale for consumers: mate distances map to
    /// `±(MATE_SCORE - MATE_STEP * |n|)`.
    pub fn centipawns(self) -> i32 {
        match self {
            Score::Centipawns(cp) => cp,
            Score::Mate(n) if n > 0 => MATE_SCORE - MATE_STEP * n,
            Score::Mate(n) => -MATE_SCORE - MATE_STEP * n,
        }
    }
}

/// Fields of interest from one `info` line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchInfo {
    pub score: Option<Score>,
    pub depth: Option<u32>,
    pub pv: Option<String>,
}

impl SearchInfo {
    pub fn is_empty(&self) -> bool {
        self.score.is_none() && self.depth.is_none() && self.pv.is_none()
    }
}

/// Parses an `info ...` line. Returns `None` for anything else.
///
/// Unparseable fields are skipped rather than failing the whole line.
pub fn parse_info(line: &str) -> Option<SearchInfo> {
    let rest = line.strip_prefix("info ")?;
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    let mut info = SearchInfo::default();

    let mut i = 0;
    while i < tokens.len() {
        match tokens[i] {
            "depth" => {
                if let Some(depth) = tokens.get(i + 1).and_then(|t| t.parse().ok()) {
                    info.depth = Some(depth);
                }
                i += 2;
            }
            "score" => {
                let value = tokens.get(i + 2).and_then(|t| t.parse::<i32>().ok());
                match (tokens.get(i + 1).copied(), value) {
                    (Some("cp"), Some(cp)) => info.score = Some(Score::Centipawns(cp)),
                    (Some("mate"), Some(n)) => info.score = Some(Score::Mate(n)),
                    _ => {}
                }
                i += 3;
            }
            "pv" => {
                let moves = &tokens[i + 1..];
                if !moves.is_empty() {
                    let preview = moves[..moves.len().min(PV_PREVIEW_LEN)].join(" ");
                    info.pv = Some(preview);
                }
                // pv runs to the end of the line
                break;
            }
            _ => i += 1,
        }
    }

    Some(info)
}

/// Latest evaluation reported by one side, accumulated across `info` lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pv: Option<String>,
}

impl Evaluation {
    /// Fields present on `info` replace the stored ones; absent fields keep
    /// their previous value.
    pub fn absorb(&mut self, info: &SearchInfo) {
        if let Some(score) = info.score {
            self.score = Some(score.centipawns());
        }
        if let Some(depth) = info.depth {
            self.depth = Some(depth);
        }
        if let Some(pv) = &info.pv {
            self.pv = Some(pv.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.score.is_none() && self.depth.is_none() && self.pv.is_none()
    }
}

#[cfg(test)]
#[path = "uci_tests.rs"]
mod uci_tests;
