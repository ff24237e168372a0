//! Chess clock for engine-vs-engine games.
//!
//! A [`Clock`] tracks remaining time and increment for both sides in integer
//! milliseconds. It is a plain `Copy` value: every game takes its own copy of
//! a template, so concurrently running games never share clock state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::types::Color;

/// Remaining time and increment for each side, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    white_ms: u64,
    black_ms: u64,
    white_increment_ms: u64,
    black_increment_ms: u64,
}

impl Clock {
    /// Symmetric time control: both sides start with `base_ms` and gain
    /// `increment_ms` after each move.
    pub fn new(base_ms: u64, increment_ms: u64) -> Self {
        Self::asymmetric(base_ms, base_ms, increment_ms, increment_ms)
    }

    pub fn asymmetric(
        white_ms: u64,
        black_ms: u64,
        white_increment_ms: u64,
        black_increment_ms: u64,
    ) -> Self {
        Self {
            white_ms,
            black_ms,
            white_increment_ms,
            black_increment_ms,
        }
    }

    /// Charge `elapsed_ms` to `side` and credit its increment.
    ///
    /// Computed as `remaining - elapsed + increment`, clamped at zero.
    pub fn apply_move(&mut self, elapsed_ms: u64, side: Color) {
        let increment = self.increment(side);
        let remaining = match side {
            Color::White => &mut self.white_ms,
            Color::Black => &mut self.black_ms,
        };
        *remaining = remaining.saturating_add(increment).saturating_sub(elapsed_ms);
    }

    pub fn remaining(&self, side: Color) -> u64 {
        match side {
            Color::White => self.white_ms,
            Color::Black => self.black_ms,
        }
    }

    pub fn increment(&self, side: Color) -> u64 {
        match side {
            Color::White => self.white_increment_ms,
            Color::Black => self.black_increment_ms,
        }
    }

    pub fn has_time_left(&self, side: Color) -> bool {
        self.remaining(side) > 0
    }

    /// How long `side` may take before its reply is considered late:
    /// remaining time + increment + `overhead`.
    pub fn move_deadline(&self, side: Color, overhead: Duration) -> Duration {
        Duration::from_millis(self.remaining(side).saturating_add(self.increment(side))) + overhead
    }

    /// Compact label such as `1:00 + 1.0s` or `10.0s + 0.1s`, based on
    /// white's allotment.
    pub fn label(&self) -> String {
        let base_ms = self.white_ms;
        let base = if base_ms < 60_000 {
            format!("{:.1}s", base_ms as f64 / 1000.0)
        } else {
            format!("{}:{:02}", base_ms / 60_000, (base_ms % 60_000) / 1000)
        };
        format!("{} + {:.1}s", base, self.white_increment_ms as f64 / 1000.0)
    }

    /// Rough upper bound for one side's thinking time over a game:
    /// base + 60 moves worth of increment.
    pub fn expected_game_budget_ms(&self) -> u64 {
        self.white_ms
            .saturating_add(self.white_increment_ms.saturating_mul(60))
    }
}

impl fmt::Display for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "White: {:.1}s (+{:.1}s), Black: {:.1}s (+{:.1}s)",
            self.white_ms as f64 / 1000.0,
            self.white_increment_ms as f64 / 1000.0,
            self.black_ms as f64 / 1000.0,
            self.black_increment_ms as f64 / 1000.0
        )
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod clock_tests;
