//! Broadcast records for spectators.
//!
//! Serialized as flat JSON objects with a `type` discriminator, camelCase
//! field names and a millisecond `timestamp`, e.g.
//! `{"timestamp":1700000000000,"type":"game_end","gameId":3,...}`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::clock::Clock;
use crate::record::GameRecord;
use crate::types::Color;
use crate::uci::Evaluation;

/// An event together with the time it was produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArenaEvent {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum EventKind {
    GameStart {
        game_id: u32,
        white: String,
        black: String,
        fen: String,
        base_time: u64,
        increment: u64,
    },
    Move {
        game_id: u32,
        #[serde(rename = "move")]
        mv: String,
        fen: String,
        white_time: u64,
        black_time: u64,
        move_number: u32,
        is_white_move: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        evaluation: Option<MoveEvaluation>,
    },
    EngineThinking {
        game_id: u32,
        is_white: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        score: Option<i32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        depth: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pv: Option<String>,
    },
    GameEnd {
        game_id: u32,
        result: String,
        reason: String,
        total_moves: u32,
    },
    Leaderboard {
        entries: Vec<LeaderboardEntry>,
    },
}

/// Last evaluation reported by each side, attached to a `move` event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveEvaluation {
    #[serde(default, skip_serializing_if = "Evaluation::is_empty")]
    pub white: Evaluation,
    #[serde(default, skip_serializing_if = "Evaluation::is_empty")]
    pub black: Evaluation,
}

impl MoveEvaluation {
    /// `None` when neither side has reported anything yet.
    pub fn from_sides(white: &Evaluation, black: &Evaluation) -> Option<Self> {
        if white.is_empty() && black.is_empty() {
            return None;
        }
        Some(Self {
            white: white.clone(),
            black: black.clone(),
        })
    }
}

/// Win/draw/loss tally, used both overall and per time control.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreLine {
    pub games: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
}

impl ScoreLine {
    pub fn points(&self) -> f64 {
        self.wins as f64 + self.draws as f64 * 0.5
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub name: String,
    pub elo: i32,
    pub peak_elo: i32,
    pub points: f64,
    #[serde(flatten)]
    pub overall: ScoreLine,
    pub time_controls: BTreeMap<String, ScoreLine>,
}

impl ArenaEvent {
    pub fn now(kind: EventKind) -> Self {
        Self {
            timestamp: Utc::now().timestamp_millis(),
            kind,
        }
    }

    pub fn game_start(game_id: u32, white: &str, black: &str, fen: &str, clock: &Clock) -> Self {
        Self::now(EventKind::GameStart {
            game_id,
            white: white.to_string(),
            black: black.to_string(),
            fen: fen.to_string(),
            base_time: clock.remaining(Color::White),
            increment: clock.increment(Color::White),
        })
    }

    pub fn engine_thinking(game_id: u32, side: Color, eval: &Evaluation) -> Self {
        Self::now(EventKind::EngineThinking {
            game_id,
            is_white: side.is_white(),
            score: eval.score,
            depth: eval.depth,
            pv: eval.pv.clone(),
        })
    }

    pub fn game_end(record: &GameRecord) -> Self {
        Self::now(EventKind::GameEnd {
            game_id: record.game_id,
            result: record.result().as_str().to_string(),
            reason: record.reason(),
            total_moves: record.move_count,
        })
    }

    pub fn leaderboard(entries: Vec<LeaderboardEntry>) -> Self {
        Self::now(EventKind::Leaderboard { entries })
    }

    /// Game the event belongs to, if any.
    pub fn game_id(&self) -> Option<u32> {
        match &self.kind {
            EventKind::GameStart { game_id, .. }
            | EventKind::Move { game_id, .. }
            | EventKind::EngineThinking { game_id, .. }
            | EventKind::GameEnd { game_id, .. } => Some(*game_id),
            EventKind::Leaderboard { .. } => None,
        }
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod events_tests;
