//! Collaborators that consume what the arena produces.
//!
//! [`BroadcastSink`] receives live events and is shared by every running
//! game. [`StatsSink`] receives finished games and is owned by the scheduler
//! task alone, so it takes `&mut self`.

use arena_core::{ArenaEvent, GameRecord, LeaderboardEntry};
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("no subscribers")]
    NoSubscribers,
    #[error("{0}")]
    Other(String),
}

pub trait BroadcastSink: Send + Sync {
    fn publish(&self, event: ArenaEvent) -> Result<(), SinkError>;
}

/// Publishes and swallows any failure. Emission never affects a game.
pub(crate) fn emit(sink: &dyn BroadcastSink, event: ArenaEvent) {
    if let Err(err) = sink.publish(event) {
        tracing::trace!(error = %err, "broadcast dropped");
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl BroadcastSink for NullSink {
    fn publish(&self, _event: ArenaEvent) -> Result<(), SinkError> {
        Ok(())
    }
}

/// In-process fan-out over a `tokio::sync::broadcast` channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: broadcast::Sender<ArenaEvent>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ArenaEvent> {
        self.sender.subscribe()
    }
}

impl BroadcastSink for ChannelSink {
    fn publish(&self, event: ArenaEvent) -> Result<(), SinkError> {
        self.sender
            .send(event)
            .map(|_| ())
            .map_err(|_| SinkError::NoSubscribers)
    }
}

pub trait StatsSink: Send + Sync {
    /// Called once per finished game, white first.
    fn record_game(&mut self, record: &GameRecord, white: &str, black: &str, time_control: &str);

    /// Current standings for a leaderboard refresh. Empty if the sink keeps
    /// none.
    fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        Vec::new()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullStats;

impl StatsSink for NullStats {
    fn record_game(&mut self, _record: &GameRecord, _white: &str, _black: &str, _tc: &str) {}
}

#[cfg(test)]
#[path = "sink_tests.rs"]
mod sink_tests;
