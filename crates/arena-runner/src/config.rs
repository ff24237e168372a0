//! Tournament settings.

use arena_core::{Clock, StartPosition};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::TournamentConfigError;

/// One clock template, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeControlConfig {
    pub base_ms: u64,
    #[serde(default)]
    pub increment_ms: u64,
}

impl TimeControlConfig {
    pub fn clock(&self) -> Clock {
        Clock::new(self.base_ms, self.increment_ms)
    }
}

/// How a pair's starting position is picked from `openings`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpeningMode {
    /// Position index = pair index mod book length.
    #[default]
    Sequential,
    /// Uniform pick per pair.
    Random,
}

/// Configuration for a tournament run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TournamentConfig {
    /// Maximum pairings running at once
    pub concurrency: usize,
    /// Pairs to play before stopping
    pub total_pairs: u32,
    /// Clock templates; one is picked per pair
    pub time_controls: Vec<TimeControlConfig>,
    /// Starting FENs; empty means the standard start
    pub openings: Vec<String>,
    pub opening_mode: OpeningMode,
    /// Ply cap before a game is declared drawn
    pub max_moves: u32,
    /// Added to each move deadline to absorb pipe and scheduling latency
    pub move_overhead_ms: u64,
    /// Liveness check interval while waiting for a move
    pub poll_interval_ms: u64,
    /// Extra wait for a trailing `bestmove` after `stop`
    pub stop_grace_ms: u64,
    /// Deadline for the startup handshake and the between-games reset
    pub startup_timeout_ms: u64,
    /// Wait after `quit` before killing an engine
    pub quit_grace_ms: u64,
    /// Grace window for `force_shutdown`
    pub shutdown_grace_ms: u64,
    /// Seed for opponent, opening and time-control selection
    pub seed: Option<u64>,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            total_pairs: 10,
            time_controls: vec![TimeControlConfig {
                base_ms: 60_000,
                increment_ms: 1000,
            }],
            openings: Vec::new(),
            opening_mode: OpeningMode::Sequential,
            max_moves: 500,
            move_overhead_ms: 50,
            poll_interval_ms: 1000,
            stop_grace_ms: 500,
            startup_timeout_ms: 30_000,
            quit_grace_ms: 1000,
            shutdown_grace_ms: 5000,
            seed: None,
        }
    }
}

impl TournamentConfig {
    /// Parses and validates a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, TournamentConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TournamentConfigError> {
        if self.concurrency == 0 {
            return Err(TournamentConfigError::ZeroConcurrency);
        }
        if self.time_controls.is_empty() {
            return Err(TournamentConfigError::NoTimeControls);
        }
        Ok(())
    }

    pub fn clocks(&self) -> Vec<Clock> {
        self.time_controls.iter().map(TimeControlConfig::clock).collect()
    }

    pub fn start_positions(&self) -> Vec<StartPosition> {
        self.openings
            .iter()
            .map(|fen| StartPosition::from_book_entry(fen))
            .collect()
    }

    /// Per-game settings derived from this config.
    pub fn game_settings(&self) -> GameSettings {
        GameSettings {
            max_moves: self.max_moves,
            move_overhead: Duration::from_millis(self.move_overhead_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            stop_grace: Duration::from_millis(self.stop_grace_ms),
        }
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn quit_grace(&self) -> Duration {
        Duration::from_millis(self.quit_grace_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Knobs a single game needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSettings {
    pub max_moves: u32,
    pub move_overhead: Duration,
    pub poll_interval: Duration,
    pub stop_grace: Duration,
}

impl Default for GameSettings {
    fn default() -> Self {
        TournamentConfig::default().game_settings()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
