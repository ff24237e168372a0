#![cfg(unix)]

mod common;

use arena_core::{
    ChessRules, Clock, Color, DrawReason, EventKind, GameResult, Outcome, RulesOracle,
    StartPosition, Termination,
};
use arena_runner::{GameSession, GameSettings, UciEngine};
use common::{engine, fast_settings, init_tracing, stop_count, FailingSink, RecordingSink};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

async fn start(script: &str, name: &str) -> UciEngine {
    UciEngine::start(&engine(script, name))
        .await
        .unwrap()
        .with_quit_grace(Duration::from_millis(200))
}

// =============================================================================
// Decisive games
// =============================================================================

#[tokio::test]
async fn test_fools_mate_ends_in_checkmate() {
    init_tracing();
    let mut white = start("fool", "white-fool").await;
    let mut black = start("fool", "black-fool").await;
    let sink = Arc::new(RecordingSink::default());

    let record = GameSession::new(
        7,
        &mut white,
        &mut black,
        StartPosition::Standard,
        Clock::new(10_000, 100),
        fast_settings(),
        sink.clone(),
    )
    .run()
    .await;

    assert_eq!(record.game_id, 7);
    assert_eq!(record.white, "white-fool");
    assert_eq!(record.black, "black-fool");
    assert_eq!(record.outcome, Outcome::Checkmate { winner: Color::Black });
    assert_eq!(record.result(), GameResult::BlackWins);
    assert_eq!(record.result().as_str(), "0-1");
    assert_eq!(record.reason(), "checkmate");
    assert_eq!(record.move_count, 4);

    white.close().await;
    black.close().await;
}

#[tokio::test]
async fn test_event_stream_for_a_game() {
    let mut white = start("fool", "w").await;
    let mut black = start("fool", "b").await;
    let sink = Arc::new(RecordingSink::default());

    GameSession::new(
        3,
        &mut white,
        &mut black,
        StartPosition::Standard,
        Clock::new(10_000, 0),
        fast_settings(),
        sink.clone(),
    )
    .run()
    .await;

    let events = sink.events();
    assert!(matches!(
        events.first().map(|e| &e.kind),
        Some(EventKind::GameStart { game_id: 3, base_time: 10_000, .. })
    ));
    match events.last().map(|e| &e.kind) {
        Some(EventKind::GameEnd {
            game_id,
            result,
            reason,
            total_moves,
        }) => {
            assert_eq!(*game_id, 3);
            assert_eq!(result, "0-1");
            assert_eq!(reason, "checkmate");
            assert_eq!(*total_moves, 4);
        }
        other => panic!("expected game_end last, got {other:?}"),
    }
    assert_eq!(sink.count(|k| matches!(k, EventKind::GameEnd { .. })), 1);
    assert!(sink.count(|k| matches!(k, EventKind::EngineThinking { .. })) >= 4);

    let moves: Vec<(String, u32, bool)> = events
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::Move {
                mv,
                move_number,
                is_white_move,
                ..
            } => Some((mv.clone(), *move_number, *is_white_move)),
            _ => None,
        })
        .collect();
    assert_eq!(
        moves,
        vec![
            ("f2f3".to_string(), 1, true),
            ("e7e5".to_string(), 2, false),
            ("g2g4".to_string(), 2, true),
            ("d8h4".to_string(), 3, false),
        ]
    );

    // every move event carries the evaluation both sides last reported
    let last_move = events
        .iter()
        .rev()
        .find(|e| matches!(e.kind, EventKind::Move { .. }))
        .unwrap();
    match &last_move.kind {
        EventKind::Move {
            evaluation: Some(eval),
            fen,
            ..
        } => {
            assert_eq!(eval.black.depth, Some(1));
            assert!(fen.starts_with("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w"));
        }
        other => panic!("unexpected last move event {other:?}"),
    }

    white.close().await;
    black.close().await;
}

#[tokio::test]
async fn test_mated_start_position_needs_no_moves() {
    let mut white = start("fool", "w").await;
    let mut black = start("fool", "b").await;
    let mated = "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3";

    let record = GameSession::new(
        0,
        &mut white,
        &mut black,
        StartPosition::Fen(mated.to_string()),
        Clock::new(1000, 0),
        fast_settings(),
        Arc::new(RecordingSink::default()),
    )
    .run()
    .await;

    assert_eq!(record.outcome, Outcome::Checkmate { winner: Color::Black });
    assert_eq!(record.move_count, 0);
    white.close().await;
    black.close().await;
}

// =============================================================================
// Forfeits
// =============================================================================

#[tokio::test]
async fn test_silent_engine_times_out_and_gets_one_stop() {
    init_tracing();
    let mut white = start("silent", "silent").await;
    let mut black = start("fool", "fool").await;
    let pid = white.pid().unwrap();

    let record = GameSession::new(
        1,
        &mut white,
        &mut black,
        StartPosition::Standard,
        Clock::new(300, 0),
        fast_settings(),
        Arc::new(RecordingSink::default()),
    )
    .run()
    .await;

    assert_eq!(record.outcome, Outcome::Timeout { loser: Color::White });
    assert_eq!(record.result(), GameResult::BlackWins);
    assert_eq!(record.reason(), "timeout");
    assert_eq!(record.move_count, 0);

    // quit comes after stop, so the log is complete once the engine exits
    white.close().await;
    black.close().await;
    assert_eq!(stop_count(pid), 1);
}

#[tokio::test]
async fn test_engine_dying_on_go_is_a_crash() {
    let mut white = start("die_on_go", "dying").await;
    let mut black = start("fool", "fool").await;

    let record = GameSession::new(
        2,
        &mut white,
        &mut black,
        StartPosition::Standard,
        Clock::new(5000, 0),
        fast_settings(),
        Arc::new(RecordingSink::default()),
    )
    .run()
    .await;

    assert_eq!(record.outcome, Outcome::EngineCrashed { loser: Color::White });
    assert_eq!(record.result(), GameResult::BlackWins);
    assert_eq!(record.reason(), "engine_crash");
    white.close().await;
    black.close().await;
}

#[tokio::test]
async fn test_illegal_reply_forfeits() {
    let mut white = start("fool", "fool").await;
    let mut black = start("illegal", "cheater").await;

    let record = GameSession::new(
        4,
        &mut white,
        &mut black,
        StartPosition::Standard,
        Clock::new(5000, 0),
        fast_settings(),
        Arc::new(RecordingSink::default()),
    )
    .run()
    .await;

    assert_eq!(
        record.outcome,
        Outcome::IllegalMove {
            loser: Color::Black,
            attempted: "e2e5".to_string()
        }
    );
    assert_eq!(record.result(), GameResult::WhiteWins);
    assert_eq!(record.reason(), "illegal_move");
    assert_eq!(record.move_count, 1);
    white.close().await;
    black.close().await;
}

#[tokio::test]
async fn test_null_moves_are_resignations() {
    for script in ["null_move", "none_move"] {
        let mut white = start(script, "quitter").await;
        let mut black = start("fool", "fool").await;

        let record = GameSession::new(
            0,
            &mut white,
            &mut black,
            StartPosition::Standard,
            Clock::new(5000, 0),
            fast_settings(),
            Arc::new(RecordingSink::default()),
        )
        .run()
        .await;

        assert_eq!(record.outcome, Outcome::Resigned { loser: Color::White }, "{script}");
        assert_eq!(record.reason(), "resignation");
        white.close().await;
        black.close().await;
    }
}

#[tokio::test]
async fn test_flagged_side_loses_before_being_asked() {
    let mut white = start("fool", "w").await;
    let mut black = start("fool", "b").await;

    let record = GameSession::new(
        0,
        &mut white,
        &mut black,
        StartPosition::Standard,
        Clock::asymmetric(0, 1000, 0, 0),
        fast_settings(),
        Arc::new(RecordingSink::default()),
    )
    .run()
    .await;

    assert_eq!(record.outcome, Outcome::TimeForfeit { loser: Color::White });
    assert_eq!(record.reason(), "time_forfeit");
    assert_eq!(record.move_count, 0);
    white.close().await;
    black.close().await;
}

// =============================================================================
// Draws and failures
// =============================================================================

#[tokio::test]
async fn test_ply_cap_is_a_draw() {
    let mut white = start("fool", "w").await;
    let mut black = start("fool", "b").await;
    let settings = GameSettings {
        max_moves: 2,
        ..fast_settings()
    };

    let record = GameSession::new(
        0,
        &mut white,
        &mut black,
        StartPosition::Standard,
        Clock::new(5000, 0),
        settings,
        Arc::new(RecordingSink::default()),
    )
    .run()
    .await;

    assert_eq!(record.outcome, Outcome::MaxMovesReached);
    assert_eq!(record.result(), GameResult::Draw);
    assert_eq!(record.reason(), "max_moves");
    assert_eq!(record.move_count, 2);
    white.close().await;
    black.close().await;
}

/// Standard rules that call the game drawn after `limit` plies.
struct DrawAfter {
    inner: ChessRules,
    plies: usize,
    limit: usize,
}

impl RulesOracle for DrawAfter {
    fn apply_move(&mut self, uci_move: &str) -> bool {
        let applied = self.inner.apply_move(uci_move);
        if applied {
            self.plies += 1;
        }
        applied
    }
    fn is_move_legal(&self, uci_move: &str) -> bool {
        self.inner.is_move_legal(uci_move)
    }
    fn is_checkmate(&self) -> bool {
        self.inner.is_checkmate()
    }
    fn is_stalemate(&self) -> bool {
        self.inner.is_stalemate()
    }
    fn is_insufficient_material(&self) -> bool {
        self.inner.is_insufficient_material()
    }
    fn is_draw(&self) -> bool {
        self.plies >= self.limit || self.inner.is_draw()
    }
    fn current_position_as_fen(&self) -> String {
        self.inner.current_position_as_fen()
    }
    fn side_to_move(&self) -> Color {
        self.inner.side_to_move()
    }
}

#[tokio::test]
async fn test_custom_rules_oracle_decides_the_game() {
    let mut white = start("fool", "w").await;
    let mut black = start("fool", "b").await;
    let rules = DrawAfter {
        inner: ChessRules::new(),
        plies: 0,
        limit: 3,
    };

    let record = GameSession::new(
        0,
        &mut white,
        &mut black,
        StartPosition::Standard,
        Clock::new(5000, 0),
        fast_settings(),
        Arc::new(RecordingSink::default()),
    )
    .with_rules(Box::new(rules))
    .run()
    .await;

    assert_eq!(record.outcome, Outcome::Draw(DrawReason::Other));
    assert_eq!(record.reason(), "draw");
    assert_eq!(record.move_count, 3);
    white.close().await;
    black.close().await;
}

#[tokio::test]
async fn test_unloadable_start_is_internal_error() {
    let mut white = start("fool", "w").await;
    let mut black = start("fool", "b").await;
    let sink = Arc::new(RecordingSink::default());

    let record = GameSession::new(
        9,
        &mut white,
        &mut black,
        StartPosition::Fen("not a position".to_string()),
        Clock::new(5000, 0),
        fast_settings(),
        sink.clone(),
    )
    .run()
    .await;

    assert_eq!(record.outcome.termination(), Termination::InternalError);
    assert_eq!(record.result(), GameResult::Unknown);
    assert!(record.reason().starts_with("internal_error: "), "{}", record.reason());
    assert_eq!(sink.count(|k| matches!(k, EventKind::GameEnd { .. })), 1);
    white.close().await;
    black.close().await;
}

#[tokio::test]
async fn test_cancel_ends_a_thinking_engine_with_one_game_end() {
    let mut white = start("silent", "w").await;
    let mut black = start("fool", "b").await;
    let sink = Arc::new(RecordingSink::default());
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let record = GameSession::new(
        12,
        &mut white,
        &mut black,
        StartPosition::Standard,
        Clock::new(60_000, 0),
        fast_settings(),
        sink.clone(),
    )
    .with_cancel(cancel)
    .run()
    .await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(record.outcome.termination(), Termination::InternalError);
    assert_eq!(record.result(), GameResult::Unknown);
    assert_eq!(record.reason(), "internal_error: tournament shutting down");
    assert_eq!(record.move_count, 0);
    assert_eq!(sink.count(|k| matches!(k, EventKind::GameStart { .. })), 1);
    assert_eq!(sink.count(|k| matches!(k, EventKind::GameEnd { .. })), 1);
    white.close().await;
    black.close().await;
}

#[tokio::test]
async fn test_failing_broadcast_does_not_affect_play() {
    let mut white = start("fool", "w").await;
    let mut black = start("fool", "b").await;

    let record = GameSession::new(
        0,
        &mut white,
        &mut black,
        StartPosition::Standard,
        Clock::new(5000, 0),
        fast_settings(),
        Arc::new(FailingSink),
    )
    .run()
    .await;

    assert_eq!(record.outcome, Outcome::Checkmate { winner: Color::Black });
    white.close().await;
    black.close().await;
}
