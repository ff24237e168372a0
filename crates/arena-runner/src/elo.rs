//! Elo rating calculation and tracking

use arena_core::{Color, GameRecord, GameResult, LeaderboardEntry, ScoreLine};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::sink::StatsSink;

/// Default starting Elo for new engines
pub const DEFAULT_ELO: i32 = 1500;

/// K-factor for Elo updates (higher = more volatile)
pub const K_FACTOR: f64 = 32.0;

/// Expected score of `rating` against `opponent`
pub fn expected_score(rating: i32, opponent: i32) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((opponent - rating) as f64 / 400.0))
}

/// Rating after one game with the given actual score (1, 0.5 or 0)
pub fn new_rating(rating: i32, opponent: i32, actual: f64) -> i32 {
    let change = K_FACTOR * (actual - expected_score(rating, opponent));
    (rating as f64 + change).round() as i32
}

/// Per-engine record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    pub elo: i32,
    pub peak_elo: i32,
    pub overall: ScoreLine,
    /// Breakdown by time-control label
    pub time_controls: BTreeMap<String, ScoreLine>,
}

impl Default for EngineStats {
    fn default() -> Self {
        Self {
            elo: DEFAULT_ELO,
            peak_elo: DEFAULT_ELO,
            overall: ScoreLine::default(),
            time_controls: BTreeMap::new(),
        }
    }
}

impl EngineStats {
    fn add(&mut self, points: f64, time_control: &str) {
        let tc = self.time_controls.entry(time_control.to_string()).or_default();
        for line in [&mut self.overall, tc] {
            line.games += 1;
            if points >= 1.0 {
                line.wins += 1;
            } else if points > 0.0 {
                line.draws += 1;
            } else {
                line.losses += 1;
            }
        }
    }

    fn set_elo(&mut self, elo: i32) {
        self.elo = elo;
        self.peak_elo = self.peak_elo.max(elo);
    }

    pub fn points(&self) -> f64 {
        self.overall.points()
    }

    /// Points as a share of games played, in percent
    pub fn points_percentage(&self) -> f64 {
        if self.overall.games == 0 {
            return 0.0;
        }
        self.points() / self.overall.games as f64 * 100.0
    }
}

/// Elo rating system for tracking engine strength
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EloTracker {
    pub engines: HashMap<String, EngineStats>,
}

impl EloTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load tracker from a JSON file
    pub fn load(path: &Path) -> Result<Self, String> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| format!("Failed to read file: {}", e))?;
        serde_json::from_str(&contents).map_err(|e| format!("Failed to parse JSON: {}", e))
    }

    /// Save tracker to a JSON file
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize: {}", e))?;
        std::fs::write(path, json).map_err(|e| format!("Failed to write file: {}", e))
    }

    /// Current rating, or the default for an engine never seen
    pub fn rating(&self, engine: &str) -> i32 {
        self.engines.get(engine).map_or(DEFAULT_ELO, |s| s.elo)
    }

    pub fn stats(&self, engine: &str) -> Option<&EngineStats> {
        self.engines.get(engine)
    }

    /// Update both engines after a game. Unknown results are ignored.
    pub fn record_result(&mut self, white: &str, black: &str, result: GameResult, time_control: &str) {
        if result == GameResult::Unknown {
            return;
        }

        let white_points = result.points(Color::White);
        let black_points = result.points(Color::Black);
        let white_elo = self.rating(white);
        let black_elo = self.rating(black);

        let white_stats = self.engines.entry(white.to_string()).or_default();
        white_stats.add(white_points, time_control);
        white_stats.set_elo(new_rating(white_elo, black_elo, white_points));

        let black_stats = self.engines.entry(black.to_string()).or_default();
        black_stats.add(black_points, time_control);
        black_stats.set_elo(new_rating(black_elo, white_elo, black_points));
    }

    /// Get a sorted leaderboard: Elo, then points, then wins, then name
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> = self
            .engines
            .iter()
            .map(|(name, stats)| LeaderboardEntry {
                name: name.clone(),
                elo: stats.elo,
                peak_elo: stats.peak_elo,
                points: stats.points(),
                overall: stats.overall.clone(),
                time_controls: stats.time_controls.clone(),
            })
            .collect();
        entries.sort_by(|a, b| {
            b.elo
                .cmp(&a.elo)
                .then_with(|| b.points.partial_cmp(&a.points).unwrap_or(Ordering::Equal))
                .then_with(|| b.overall.wins.cmp(&a.overall.wins))
                .then_with(|| a.name.cmp(&b.name))
        });
        entries
    }

    /// Text table of the leaderboard
    pub fn generate_report(&self) -> String {
        let mut report = String::from("=== Engine Leaderboard ===\n");
        report.push_str(&format!(
            "{:<30} {:>6} {:>6} {:>6} {:>5}-{:<5}-{:<5}\n",
            "Engine", "Elo", "Peak", "Games", "W", "D", "L"
        ));
        report.push_str(&"-".repeat(72));
        report.push('\n');
        for entry in self.leaderboard() {
            report.push_str(&format!(
                "{:<30} {:>6} {:>6} {:>6} {:>5}-{:<5}-{:<5}\n",
                entry.name,
                entry.elo,
                entry.peak_elo,
                entry.overall.games,
                entry.overall.wins,
                entry.overall.draws,
                entry.overall.losses
            ));
        }
        report
    }
}

impl StatsSink for EloTracker {
    fn record_game(&mut self, record: &GameRecord, white: &str, black: &str, time_control: &str) {
        self.record_result(white, black, record.result(), time_control);
    }

    fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        EloTracker::leaderboard(self)
    }
}

#[cfg(test)]
#[path = "elo_tests.rs"]
mod elo_tests;
