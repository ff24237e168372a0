//! Two games between the same engines, colors swapped.

use arena_core::{ArenaEvent, Clock, Color, GameRecord, MatchPair, Outcome, PairOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::GameSettings;
use crate::engine::{EngineDefinition, UciEngine, DEFAULT_QUIT_GRACE};
use crate::game::{GameSession, SHUTTING_DOWN};
use crate::sink::{emit, BroadcastSink, NullSink};

/// Owns both engine processes for the lifetime of one pair.
pub struct Pairing {
    pair: MatchPair,
    engine1: EngineDefinition,
    engine2: EngineDefinition,
    clock: Clock,
    settings: GameSettings,
    startup_timeout: Duration,
    quit_grace: Duration,
    sink: Arc<dyn BroadcastSink>,
    cancel: CancellationToken,
}

impl Pairing {
    pub fn new(
        pair: MatchPair,
        engine1: EngineDefinition,
        engine2: EngineDefinition,
        clock: Clock,
        settings: GameSettings,
    ) -> Self {
        Self {
            pair,
            engine1,
            engine2,
            clock,
            settings,
            startup_timeout: Duration::from_secs(30),
            quit_grace: DEFAULT_QUIT_GRACE,
            sink: Arc::new(NullSink),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_broadcast(mut self, sink: Arc<dyn BroadcastSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Deadline for each engine's startup handshake and for the reset
    /// between games.
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    pub fn with_quit_grace(mut self, grace: Duration) -> Self {
        self.quit_grace = grace;
        self
    }

    pub fn pair(&self) -> &MatchPair {
        &self.pair
    }

    /// Plays both games. Never fails: anything that prevents a game from
    /// being played is reported as a forfeit record. Every engine that was
    /// started is closed before this returns.
    pub async fn run(self) -> PairOutcome {
        let pair_id = self.pair.pair_id;
        info!(
            pair_id,
            engine1 = %self.engine1.name,
            engine2 = %self.engine2.name,
            clock = %self.clock.label(),
            "{} started",
            self.pair
        );

        let mut first = match self.start_engine(&self.engine1).await {
            Ok(engine) => engine,
            Err(reason) => return self.forfeit(&reason),
        };
        let mut second = match self.start_engine(&self.engine2).await {
            Ok(engine) => engine,
            Err(reason) => {
                first.close().await;
                return self.forfeit(&reason);
            }
        };

        // games watch the token themselves so finished games are kept
        let outcome = self.play_games(&mut first, &mut second).await;

        first.close().await;
        second.close().await;

        info!(
            pair_id,
            engine1_score = outcome.engine1_score(),
            engine2_score = outcome.engine2_score(),
            "Pair finished"
        );
        outcome
    }

    async fn start_engine(&self, def: &EngineDefinition) -> Result<UciEngine, String> {
        let started = tokio::select! {
            started = tokio::time::timeout(self.startup_timeout, UciEngine::start(def)) => started,
            _ = self.cancel.cancelled() => return Err(SHUTTING_DOWN.to_string()),
        };
        match started {
            Ok(Ok(engine)) => {
                info!(pair_id = self.pair.pair_id, engine = %def.name, pid = ?engine.pid(), "Engine ready");
                Ok(engine.with_quit_grace(self.quit_grace))
            }
            Ok(Err(err)) => {
                warn!(pair_id = self.pair.pair_id, engine = %def.name, error = %err, "Engine failed to start");
                Err(format!("engine startup failed: {err}"))
            }
            Err(_) => {
                warn!(
                    pair_id = self.pair.pair_id,
                    engine = %def.name,
                    timeout_ms = self.startup_timeout.as_millis() as u64,
                    "Engine handshake timed out"
                );
                Err(format!(
                    "engine startup failed: {} not ready within {:?}",
                    def.name, self.startup_timeout
                ))
            }
        }
    }

    async fn play_games(&self, first: &mut UciEngine, second: &mut UciEngine) -> PairOutcome {
        let game1 = self.session(self.pair.game1_id(), first, second).run().await;

        // engine1 plays black in game 2, engine2 white
        let game2 = match self.prepare_second_game(first, second).await {
            Ok(()) => self.session(self.pair.game2_id(), second, first).run().await,
            Err(outcome) => self.unplayed_record(self.pair.game2_id(), outcome),
        };

        PairOutcome::new(
            self.pair.pair_id,
            &self.engine1.name,
            &self.engine2.name,
            game1,
            game2,
        )
    }

    fn session<'a>(
        &self,
        game_id: u32,
        white: &'a mut UciEngine,
        black: &'a mut UciEngine,
    ) -> GameSession<'a> {
        GameSession::new(
            game_id,
            white,
            black,
            self.pair.start.clone(),
            self.clock,
            self.settings,
            Arc::clone(&self.sink),
        )
        .with_cancel(self.cancel.clone())
    }

    /// Resets both engines for game 2. On failure, the outcome that game 2
    /// is recorded with instead.
    async fn prepare_second_game(
        &self,
        first: &mut UciEngine,
        second: &mut UciEngine,
    ) -> Result<(), Outcome> {
        let pair_id = self.pair.pair_id;
        let shutdown = || Outcome::InternalError {
            reason: SHUTTING_DOWN.to_string(),
        };
        if self.cancel.is_cancelled() {
            return Err(shutdown());
        }
        // engine1 is black in game 2
        for (engine, color) in [(first, Color::Black), (second, Color::White)] {
            let reset = tokio::select! {
                reset = tokio::time::timeout(self.startup_timeout, engine.reset()) => reset,
                _ = self.cancel.cancelled() => return Err(shutdown()),
            };
            let reason = match reset {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err.to_string(),
                Err(_) => format!("{} did not answer isready", engine.name()),
            };
            warn!(pair_id, engine = engine.name(), %reason, "Engine failed between games");
            return Err(Outcome::EngineCrashed { loser: color });
        }
        Ok(())
    }

    /// Record for a game 2 that never reached the board. It still gets its
    /// `game_start`/`game_end` pair so spectators see the game close.
    fn unplayed_record(&self, game_id: u32, outcome: Outcome) -> GameRecord {
        let record = GameRecord {
            game_id,
            white: self.engine2.name.clone(),
            black: self.engine1.name.clone(),
            outcome,
            move_count: 0,
        };
        warn!(
            pair_id = self.pair.pair_id,
            game_id,
            result = %record.result(),
            reason = %record.reason(),
            "Game not played"
        );
        emit(
            self.sink.as_ref(),
            ArenaEvent::game_start(
                game_id,
                &record.white,
                &record.black,
                self.pair.start.fen(),
                &self.clock,
            ),
        );
        emit(self.sink.as_ref(), ArenaEvent::game_end(&record));
        record
    }

    fn forfeit(&self, reason: &str) -> PairOutcome {
        warn!(pair_id = self.pair.pair_id, %reason, "Pair forfeited");
        PairOutcome::forfeit(&self.pair, &self.engine1.name, &self.engine2.name, reason)
    }
}

#[cfg(test)]
#[path = "pair_tests.rs"]
mod pair_tests;
