//! A single game between two engine processes.

use anyhow::{bail, Context};
use arena_core::uci::{self, SearchInfo};
use arena_core::{
    ArenaEvent, ChessRules, Clock, Color, EventKind, Evaluation, GameRecord,
    MoveEvaluation, Outcome, RulesOracle, StartPosition, Verdict,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::GameSettings;
use crate::engine::UciEngine;
use crate::sink::{emit, BroadcastSink};

/// Reason attached to games ended by a tournament shutdown.
pub const SHUTTING_DOWN: &str = "tournament shutting down";

fn shutdown_outcome() -> Outcome {
    Outcome::InternalError {
        reason: SHUTTING_DOWN.to_string(),
    }
}

/// How the side to move answered `go`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Move token from `bestmove`; may be empty.
    BestMove(String),
    TimedOut,
    Crashed,
}

/// Waits for `bestmove` until `deadline`, polling in `settings.poll_interval`
/// slices so a dead engine is noticed within one slice. `info` lines are
/// handed to `on_info`.
///
/// On expiry `stop` is sent once and a trailing reply is read for up to
/// `settings.stop_grace`; the result is still [`Reply::TimedOut`].
pub async fn await_bestmove(
    engine: &mut UciEngine,
    deadline: Duration,
    settings: &GameSettings,
    mut on_info: impl FnMut(&SearchInfo),
) -> Reply {
    let deadline_at = Instant::now() + deadline;

    loop {
        let now = Instant::now();
        if now >= deadline_at {
            break;
        }
        let slice = (deadline_at - now).min(settings.poll_interval);
        match engine.next_line(slice).await {
            Some(line) => {
                if let Some(mv) = uci::parse_bestmove(&line) {
                    return Reply::BestMove(mv.to_string());
                }
                if let Some(info) = uci::parse_info(&line) {
                    if !info.is_empty() {
                        on_info(&info);
                    }
                }
            }
            None => {
                if !engine.is_alive() {
                    return Reply::Crashed;
                }
            }
        }
    }

    if let Err(err) = engine.send(uci::STOP).await {
        debug!(engine = engine.name(), error = %err, "stop not delivered");
    }
    let grace_at = Instant::now() + settings.stop_grace;
    loop {
        let now = Instant::now();
        if now >= grace_at {
            break;
        }
        match engine.next_line(grace_at - now).await {
            Some(line) if uci::parse_bestmove(&line).is_some() => {
                debug!(engine = engine.name(), "Late reply after stop: {line}");
                break;
            }
            Some(_) => {}
            None => break,
        }
    }
    Reply::TimedOut
}

fn is_resignation(mv: &str) -> bool {
    mv.is_empty() || mv == "(none)" || mv == "0000"
}

fn verdict_outcome(verdict: Verdict) -> Outcome {
    match verdict {
        Verdict::Checkmate { winner } => Outcome::Checkmate { winner },
        Verdict::Stalemate => Outcome::Stalemate,
        Verdict::Draw(reason) => Outcome::Draw(reason),
    }
}

/// Drives one game to a terminal [`Outcome`].
pub struct GameSession<'a> {
    game_id: u32,
    white: &'a mut UciEngine,
    black: &'a mut UciEngine,
    start: StartPosition,
    clock: Clock,
    settings: GameSettings,
    sink: Arc<dyn BroadcastSink>,
    rules: Option<Box<dyn RulesOracle>>,
    cancel: CancellationToken,
    moves: Vec<String>,
    evaluations: [Evaluation; 2],
}

impl<'a> GameSession<'a> {
    pub fn new(
        game_id: u32,
        white: &'a mut UciEngine,
        black: &'a mut UciEngine,
        start: StartPosition,
        clock: Clock,
        settings: GameSettings,
        sink: Arc<dyn BroadcastSink>,
    ) -> Self {
        Self {
            game_id,
            white,
            black,
            start,
            clock,
            settings,
            sink,
            rules: None,
            cancel: CancellationToken::new(),
            moves: Vec::new(),
            evaluations: [Evaluation::default(), Evaluation::default()],
        }
    }

    /// Uses `rules` instead of a [`ChessRules`] built from the start position.
    pub fn with_rules(mut self, rules: Box<dyn RulesOracle>) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Ends the game as an [`Outcome::InternalError`] once `cancel` fires,
    /// either between turns or while an engine is thinking.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Plays the game. Always yields exactly one record and exactly one
    /// `game_end` event; internal failures become [`Outcome::InternalError`].
    pub async fn run(mut self) -> GameRecord {
        let white_name = self.white.name().to_string();
        let black_name = self.black.name().to_string();

        info!(
            game_id = self.game_id,
            white = %white_name,
            black = %black_name,
            clock = %self.clock,
            "Game started"
        );
        emit(
            self.sink.as_ref(),
            ArenaEvent::game_start(
                self.game_id,
                &white_name,
                &black_name,
                self.start.fen(),
                &self.clock,
            ),
        );

        let outcome = match self.play().await {
            Ok(outcome) => outcome,
            Err(err) => Outcome::InternalError {
                reason: format!("{err:#}"),
            },
        };

        let record = GameRecord {
            game_id: self.game_id,
            white: white_name,
            black: black_name,
            outcome,
            move_count: self.moves.len() as u32,
        };

        if record.outcome.termination().is_forfeit() {
            warn!(
                game_id = record.game_id,
                result = %record.result(),
                reason = %record.reason(),
                moves = record.move_count,
                "Game forfeited: {}",
                record.outcome
            );
        } else {
            info!(
                game_id = record.game_id,
                result = %record.result(),
                reason = %record.reason(),
                moves = record.move_count,
                "Game finished"
            );
        }
        emit(self.sink.as_ref(), ArenaEvent::game_end(&record));
        record
    }

    async fn play(&mut self) -> anyhow::Result<Outcome> {
        let mut rules: Box<dyn RulesOracle> = match self.rules.take() {
            Some(rules) => rules,
            None => Box::new(
                ChessRules::from_start(&self.start).context("cannot load start position")?,
            ),
        };
        let mut side = rules.side_to_move();
        let mut move_number: u32 = 1;
        let cancel = self.cancel.clone();

        loop {
            if cancel.is_cancelled() {
                return Ok(shutdown_outcome());
            }
            if self.moves.len() as u32 >= self.settings.max_moves {
                return Ok(Outcome::MaxMovesReached);
            }
            if let Some(verdict) = rules.verdict() {
                return Ok(verdict_outcome(verdict));
            }
            if !self.clock.has_time_left(side) {
                return Ok(Outcome::TimeForfeit { loser: side });
            }

            let game_id = self.game_id;
            let sink = &self.sink;
            let evaluation = &mut self.evaluations[side.idx()];
            let engine: &mut UciEngine = match side {
                Color::White => &mut *self.white,
                Color::Black => &mut *self.black,
            };
            if !engine.is_alive() {
                return Ok(Outcome::EngineCrashed { loser: side });
            }

            let position = uci::position_command(&self.start, &self.moves);
            let go = uci::go_command(&self.clock);
            let sent = match engine.send(&position).await {
                Ok(()) => engine.send(&go).await,
                Err(err) => Err(err),
            };
            if let Err(err) = sent {
                warn!(game_id, engine = engine.name(), error = %err, "Engine stopped accepting commands");
                return Ok(Outcome::EngineCrashed { loser: side });
            }

            let started = Instant::now();
            let deadline = self.clock.move_deadline(side, self.settings.move_overhead);
            let waiting = await_bestmove(engine, deadline, &self.settings, |info| {
                evaluation.absorb(info);
                emit(
                    sink.as_ref(),
                    ArenaEvent::engine_thinking(game_id, side, evaluation),
                );
            });
            let reply = tokio::select! {
                reply = waiting => reply,
                _ = cancel.cancelled() => {
                    debug!(game_id, "Shutdown while waiting for a move");
                    return Ok(shutdown_outcome());
                }
            };
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let mv = match reply {
                Reply::BestMove(mv) => mv,
                Reply::Crashed => {
                    warn!(game_id, engine = engine.name(), "Engine died while thinking");
                    return Ok(Outcome::EngineCrashed { loser: side });
                }
                Reply::TimedOut => {
                    warn!(
                        game_id,
                        engine = engine.name(),
                        deadline_ms = deadline.as_millis() as u64,
                        "Engine exceeded move deadline"
                    );
                    return Ok(Outcome::Timeout { loser: side });
                }
            };

            if is_resignation(&mv) {
                return Ok(Outcome::Resigned { loser: side });
            }
            if !rules.is_move_legal(&mv) {
                return Ok(Outcome::IllegalMove {
                    loser: side,
                    attempted: mv,
                });
            }
            if !rules.apply_move(&mv) {
                bail!("rules rejected `{mv}` after accepting it as legal");
            }

            self.moves.push(mv.clone());
            self.clock.apply_move(elapsed_ms, side);
            side = side.other();
            if side == Color::White {
                move_number += 1;
            }

            emit(
                self.sink.as_ref(),
                ArenaEvent::now(EventKind::Move {
                    game_id,
                    mv,
                    fen: rules.current_position_as_fen(),
                    white_time: self.clock.remaining(Color::White),
                    black_time: self.clock.remaining(Color::Black),
                    move_number,
                    is_white_move: side == Color::Black,
                    evaluation: MoveEvaluation::from_sides(
                        &self.evaluations[Color::White.idx()],
                        &self.evaluations[Color::Black.idx()],
                    ),
                }),
            );
        }
    }
}

#[cfg(test)]
#[path = "game_tests.rs"]
mod game_tests;
