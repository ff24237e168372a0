//! Tournament scheduler: keeps up to N pairings running until T pairs have
//! completed, then reports standings.

use arena_core::{ArenaEvent, Clock, MatchPair, PairOutcome, StartPosition};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Semaphore};
use tokio::task::{AbortHandle, Id, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{OpeningMode, TournamentConfig};
use crate::engine::EngineDefinition;
use crate::error::TournamentConfigError;
use crate::pair::Pairing;
use crate::sink::{emit, BroadcastSink, NullSink, NullStats, StatsSink};

/// Picks two engines with different display names, uniformly.
pub fn select_opponents<'a, R: Rng + ?Sized>(
    engines: &'a [EngineDefinition],
    rng: &mut R,
) -> Result<(&'a EngineDefinition, &'a EngineDefinition), TournamentConfigError> {
    let not_enough = || TournamentConfigError::NotEnoughEngines {
        distinct: distinct_names(engines),
    };
    let first = engines.choose(rng).ok_or_else(not_enough)?;
    let pool: Vec<&EngineDefinition> = engines.iter().filter(|e| e.name != first.name).collect();
    let second = pool.choose(rng).copied().ok_or_else(not_enough)?;
    Ok((first, second))
}

/// Starting position for the pair with index `pair_index`.
pub fn select_opening<R: Rng + ?Sized>(
    openings: &[StartPosition],
    mode: OpeningMode,
    pair_index: u32,
    rng: &mut R,
) -> StartPosition {
    if openings.is_empty() {
        return StartPosition::Standard;
    }
    match mode {
        OpeningMode::Sequential => openings[pair_index as usize % openings.len()].clone(),
        OpeningMode::Random => openings.choose(rng).cloned().unwrap_or_default(),
    }
}

pub fn select_time_control<R: Rng + ?Sized>(clocks: &[Clock], rng: &mut R) -> Option<Clock> {
    match clocks {
        [only] => Some(*only),
        _ => clocks.choose(rng).copied(),
    }
}

fn distinct_names(engines: &[EngineDefinition]) -> usize {
    engines.iter().map(|e| e.name.as_str()).collect::<HashSet<_>>().len()
}

/// Per-pair ceiling: `2 games × (base + 60×inc) × 2 sides`, plus 50%, for
/// the slowest clock.
pub fn pair_ceiling(clocks: &[Clock]) -> Duration {
    let slowest = clocks
        .iter()
        .map(Clock::expected_game_budget_ms)
        .max()
        .unwrap_or(0);
    let ms = slowest.saturating_mul(4);
    Duration::from_millis(ms.saturating_add(ms / 2))
}

/// Stops a running tournament from another task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    token: CancellationToken,
}

impl ShutdownHandle {
    /// Stops submitting pairs and cancels the ones in flight. Anything still
    /// running after the grace window is aborted, which kills its engines.
    pub fn force_shutdown(&self) {
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// One engine's line in the final standings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Standing {
    pub name: String,
    pub score: f64,
    pub games: u32,
    /// Score as a share of games played, in percent
    pub percentage: f64,
}

/// Final result of a tournament run
#[derive(Debug, Clone, Serialize)]
pub struct TournamentReport {
    pub run_id: Uuid,
    /// Sorted by score, highest first, then by name
    pub standings: Vec<Standing>,
    pub pairs_completed: u32,
    pub pairs_timed_out: u32,
    pub pairs_failed: u32,
    pub games_played: u32,
    /// Ended by `force_shutdown`
    pub interrupted: bool,
    /// `None` when the top score is shared
    pub winner: Option<String>,
}

impl TournamentReport {
    fn new(run_id: Uuid, scores: &HashMap<String, (f64, u32)>) -> Self {
        let mut standings: Vec<Standing> = scores
            .iter()
            .map(|(name, &(score, games))| Standing {
                name: name.clone(),
                score,
                games,
                percentage: if games == 0 {
                    0.0
                } else {
                    score / games as f64 * 100.0
                },
            })
            .collect();
        standings.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });

        let winner = match standings.as_slice() {
            [top, next, ..] if top.score > next.score => Some(top.name.clone()),
            [only] => Some(only.name.clone()),
            _ => None,
        };

        Self {
            run_id,
            standings,
            pairs_completed: 0,
            pairs_timed_out: 0,
            pairs_failed: 0,
            games_played: 0,
            interrupted: false,
            winner,
        }
    }

    pub fn score(&self, name: &str) -> Option<f64> {
        self.standings.iter().find(|s| s.name == name).map(|s| s.score)
    }

    pub fn total_pairs(&self) -> u32 {
        self.pairs_completed + self.pairs_timed_out + self.pairs_failed
    }
}

impl fmt::Display for TournamentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Tournament {} ===", self.run_id)?;
        writeln!(
            f,
            "Pairs: {} completed, {} timed out, {} failed ({} games)",
            self.pairs_completed, self.pairs_timed_out, self.pairs_failed, self.games_played
        )?;
        writeln!(f, "{:<30} {:>8} {:>6} {:>7}", "Engine", "Score", "Games", "%")?;
        writeln!(f, "{}", "-".repeat(54))?;
        for s in &self.standings {
            writeln!(
                f,
                "{:<30} {:>8.1} {:>6} {:>6.1}%",
                s.name, s.score, s.games, s.percentage
            )?;
        }
        match &self.winner {
            Some(name) => writeln!(f, "Winner: {name}")?,
            None => writeln!(f, "Winner: shared")?,
        }
        if self.interrupted {
            writeln!(f, "(interrupted)")?;
        }
        Ok(())
    }
}

/// How a supervised pair ended from the scheduler's point of view.
enum Finished {
    Done(PairOutcome),
    /// Ceiling expired; the pairing keeps running in the background.
    TimedOut(JoinHandle<PairOutcome>),
    /// The pairing task panicked or was aborted.
    Failed(String),
}

struct InFlight {
    pair: MatchPair,
    engine1: String,
    engine2: String,
    time_control: String,
    pairing: AbortHandle,
}

/// Runs a tournament between engine processes
pub struct MatchRunner {
    engines: Vec<EngineDefinition>,
    config: TournamentConfig,
    clocks: Vec<Clock>,
    openings: Vec<StartPosition>,
    broadcast: Arc<dyn BroadcastSink>,
    stats: Box<dyn StatsSink>,
    ceiling: Duration,
    cancel: CancellationToken,
}

impl MatchRunner {
    /// Validates the configuration. Fails before anything is spawned.
    pub fn new(
        engines: Vec<EngineDefinition>,
        config: TournamentConfig,
    ) -> Result<Self, TournamentConfigError> {
        config.validate()?;
        let distinct = distinct_names(&engines);
        if distinct < 2 {
            return Err(TournamentConfigError::NotEnoughEngines { distinct });
        }

        let clocks = config.clocks();
        let openings = config.start_positions();
        let ceiling = pair_ceiling(&clocks);
        Ok(Self {
            engines,
            config,
            clocks,
            openings,
            broadcast: Arc::new(NullSink),
            stats: Box::new(NullStats),
            ceiling,
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_broadcast(mut self, sink: Arc<dyn BroadcastSink>) -> Self {
        self.broadcast = sink;
        self
    }

    pub fn with_stats(mut self, stats: Box<dyn StatsSink>) -> Self {
        self.stats = stats;
        self
    }

    /// Replaces the per-pair ceiling derived from the time controls.
    pub fn with_pair_ceiling(mut self, ceiling: Duration) -> Self {
        self.ceiling = ceiling;
        self
    }

    /// Opening positions, replacing those from the config.
    pub fn with_openings(mut self, openings: Vec<StartPosition>) -> Self {
        self.openings = openings;
        self
    }

    pub fn pair_ceiling(&self) -> Duration {
        self.ceiling
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            token: self.cancel.clone(),
        }
    }

    /// Runs until `total_pairs` pairs have completed (timeouts included) or
    /// `force_shutdown` is called.
    pub async fn run(self) -> Result<TournamentReport, TournamentConfigError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("tournament", %run_id);
        self.run_inner(run_id).instrument(span).await
    }

    async fn run_inner(mut self, run_id: Uuid) -> Result<TournamentReport, TournamentConfigError> {
        let total = self.config.total_pairs;
        let concurrency = self.config.concurrency;
        info!(
            engines = self.engines.len(),
            concurrency,
            total_pairs = total,
            ceiling_ms = self.ceiling.as_millis() as u64,
            "Tournament started"
        );

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let workers = Arc::new(Semaphore::new(concurrency));
        let mut running: JoinSet<Finished> = JoinSet::new();
        let mut in_flight: HashMap<Id, InFlight> = HashMap::new();
        let mut abandoned: Vec<JoinHandle<PairOutcome>> = Vec::new();

        let mut scores: HashMap<String, (f64, u32)> = self
            .engines
            .iter()
            .map(|e| (e.name.clone(), (0.0, 0)))
            .collect();
        let mut submitted: u32 = 0;
        let (mut completed, mut timed_out, mut failed, mut games) = (0u32, 0u32, 0u32, 0u32);

        while submitted < total.min(concurrency as u32) {
            self.submit(submitted, &mut rng, &workers, &mut running, &mut in_flight)?;
            submitted += 1;
        }

        let mut shutdown_at: Option<tokio::time::Instant> = None;
        loop {
            let joined = match shutdown_at {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, running.join_next_with_id()).await {
                        Ok(joined) => joined,
                        Err(_) => {
                            warn!(pairs = in_flight.len(), "Shutdown grace expired, aborting pairs");
                            for meta in in_flight.values() {
                                meta.pairing.abort();
                            }
                            running.abort_all();
                            while running.join_next().await.is_some() {}
                            in_flight.clear();
                            break;
                        }
                    }
                }
                None => tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => {
                        warn!(in_flight = in_flight.len(), "Shutdown requested");
                        shutdown_at = Some(tokio::time::Instant::now() + self.config.shutdown_grace());
                        continue;
                    }
                    joined = running.join_next_with_id() => joined,
                },
            };
            let Some(joined) = joined else { break };

            let (id, finished) = match joined {
                Ok((id, finished)) => (id, finished),
                Err(err) => (err.id(), Finished::Failed(err.to_string())),
            };
            let Some(meta) = in_flight.remove(&id) else {
                continue;
            };

            match finished {
                Finished::Done(outcome) => {
                    completed += 1;
                    games += 2;
                    self.aggregate(&outcome, &meta.time_control, &mut scores);
                }
                Finished::TimedOut(handle) => {
                    timed_out += 1;
                    warn!(
                        pair_id = meta.pair.pair_id,
                        engine1 = %meta.engine1,
                        engine2 = %meta.engine2,
                        ceiling_ms = self.ceiling.as_millis() as u64,
                        "Pair exceeded its ceiling, abandoning"
                    );
                    abandoned.push(handle);
                }
                Finished::Failed(reason) => {
                    failed += 1;
                    warn!(pair_id = meta.pair.pair_id, %reason, "Pair failed");
                    let outcome =
                        PairOutcome::forfeit(&meta.pair, &meta.engine1, &meta.engine2, &reason);
                    games += 2;
                    self.aggregate(&outcome, &meta.time_control, &mut scores);
                }
            }

            if submitted < total && !self.cancel.is_cancelled() {
                self.submit(submitted, &mut rng, &workers, &mut running, &mut in_flight)?;
                submitted += 1;
            }
        }

        self.drain(abandoned).await;
        workers.close();

        let mut report = TournamentReport::new(run_id, &scores);
        report.pairs_completed = completed;
        report.pairs_timed_out = timed_out;
        report.pairs_failed = failed;
        report.games_played = games;
        report.interrupted = self.cancel.is_cancelled();

        info!(
            completed,
            timed_out,
            failed,
            interrupted = report.interrupted,
            winner = ?report.winner,
            "Tournament finished"
        );
        Ok(report)
    }

    fn submit(
        &self,
        pair_index: u32,
        rng: &mut StdRng,
        workers: &Arc<Semaphore>,
        running: &mut JoinSet<Finished>,
        in_flight: &mut HashMap<Id, InFlight>,
    ) -> Result<(), TournamentConfigError> {
        let (engine1, engine2) = select_opponents(&self.engines, rng)?;
        let start = select_opening(&self.openings, self.config.opening_mode, pair_index, rng);
        let clock = select_time_control(&self.clocks, rng).ok_or(TournamentConfigError::NoTimeControls)?;
        let pair = MatchPair::new(pair_index, start);

        info!(
            pair_id = pair_index,
            engine1 = %engine1.name,
            engine2 = %engine2.name,
            clock = %clock.label(),
            "Submitting pair"
        );

        let pairing = Pairing::new(
            pair.clone(),
            engine1.clone(),
            engine2.clone(),
            clock,
            self.config.game_settings(),
        )
        .with_broadcast(Arc::clone(&self.broadcast))
        .with_cancel(self.cancel.child_token())
        .with_startup_timeout(self.config.startup_timeout())
        .with_quit_grace(self.config.quit_grace());

        let workers = Arc::clone(workers);
        let (started_tx, started_rx) = oneshot::channel();
        let fallback = pair.clone();
        let (name1, name2) = (engine1.name.clone(), engine2.name.clone());
        let handle = tokio::spawn(async move {
            // Held until the pairing ends, even if the scheduler gave up on it.
            let _permit = match workers.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    return PairOutcome::forfeit(&fallback, &name1, &name2, "worker pool closed")
                }
            };
            let _ = started_tx.send(());
            pairing.run().await
        });

        let pairing_abort = handle.abort_handle();
        let ceiling = self.ceiling;
        let task = running.spawn(supervise(handle, started_rx, ceiling));
        in_flight.insert(
            task.id(),
            InFlight {
                pair,
                engine1: engine1.name.clone(),
                engine2: engine2.name.clone(),
                time_control: clock.label(),
                pairing: pairing_abort,
            },
        );
        Ok(())
    }

    fn aggregate(
        &mut self,
        outcome: &PairOutcome,
        time_control: &str,
        scores: &mut HashMap<String, (f64, u32)>,
    ) {
        for (name, points) in [
            (&outcome.engine1, outcome.engine1_score()),
            (&outcome.engine2, outcome.engine2_score()),
        ] {
            let entry = scores.entry(name.clone()).or_insert((0.0, 0));
            entry.0 += points;
            entry.1 += 2;
        }

        for game in &outcome.games {
            self.stats
                .record_game(game, &game.white, &game.black, time_control);
        }

        info!(
            pair_id = outcome.pair_id,
            "{} {:.1} - {:.1} {}",
            outcome.engine1,
            outcome.engine1_score(),
            outcome.engine2_score(),
            outcome.engine2
        );

        let entries = self.stats.leaderboard();
        if !entries.is_empty() {
            emit(self.broadcast.as_ref(), ArenaEvent::leaderboard(entries));
        }
    }

    /// Waits for abandoned pairings to wind down. Bounded by the shutdown
    /// grace once shutdown has been requested.
    async fn drain(&self, abandoned: Vec<JoinHandle<PairOutcome>>) {
        if abandoned.is_empty() {
            return;
        }
        info!(pairs = abandoned.len(), "Waiting for abandoned pairs");

        let aborts: Vec<AbortHandle> = abandoned.iter().map(JoinHandle::abort_handle).collect();
        let wait_all = async {
            for handle in abandoned {
                let _ = handle.await;
            }
        };
        tokio::pin!(wait_all);

        tokio::select! {
            _ = &mut wait_all => return,
            _ = self.cancel.cancelled() => {}
        }
        if tokio::time::timeout(self.config.shutdown_grace(), &mut wait_all)
            .await
            .is_err()
        {
            warn!("Abandoned pairs still running after grace, aborting");
            for abort in aborts {
                abort.abort();
            }
        }
    }
}

/// Applies the ceiling once the pairing holds a worker permit.
async fn supervise(
    mut handle: JoinHandle<PairOutcome>,
    started: oneshot::Receiver<()>,
    ceiling: Duration,
) -> Finished {
    // An error means the task ended without starting; the handle says why.
    let _ = started.await;
    match tokio::time::timeout(ceiling, &mut handle).await {
        Ok(Ok(outcome)) => Finished::Done(outcome),
        Ok(Err(err)) => Finished::Failed(err.to_string()),
        Err(_) => Finished::TimedOut(handle),
    }
}

#[cfg(test)]
#[path = "match_runner_tests.rs"]
mod match_runner_tests;
