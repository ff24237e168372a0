#![allow(dead_code)]

//! Shared fixtures: tiny POSIX `sh` engines that speak just enough UCI.
//!
//! All scripts are written once, before the first spawn, so no script file
//! is ever open for writing while another test forks.

use arena_core::{ArenaEvent, EventKind, GameRecord, GameResult};
use arena_runner::{BroadcastSink, EngineDefinition, GameSettings, SinkError, StatsSink};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

const HANDSHAKE: &str = r#"    uci) echo "id name fixture"; echo "uciok" ;;
    isready) echo "readyok" ;;
    ucinewgame) ;;"#;

/// Plays fool's mate by ply count: whoever is black mates on ply 4.
fn fool_script(delay: Option<&str>) -> String {
    let pause = delay.map(|d| format!("sleep {d}; ")).unwrap_or_default();
    format!(
        r#"#!/bin/sh
n=0
while IFS= read -r line; do
  case "$line" in
{HANDSHAKE}
    position*)
      set -- $line
      if [ $# -gt 2 ]; then n=$(($# - 3)); else n=0; fi ;;
    go*)
      case $n in
        0) m=f2f3 ;;
        1) m=e7e5 ;;
        2) m=g2g4 ;;
        3) m=d8h4 ;;
        *) m=0000 ;;
      esac
      {pause}echo "info depth 1 score cp 12 pv $m"
      echo "bestmove $m" ;;
    quit) exit 0 ;;
  esac
done
"#
    )
}

/// Answers the handshake, then replies to every `go` with `reply`.
fn fixed_reply_script(reply: &str) -> String {
    format!(
        r#"#!/bin/sh
while IFS= read -r line; do
  case "$line" in
{HANDSHAKE}
    go*) echo "{reply}" ;;
    quit) exit 0 ;;
  esac
done
"#
    )
}

const SILENT: &str = r#"#!/bin/sh
log="$(dirname "$0")/stop.$$"
while IFS= read -r line; do
  case "$line" in
    uci) echo "id name silent"; echo "uciok" ;;
    isready) echo "readyok" ;;
    stop) echo stop >> "$log" ;;
    quit) exit 0 ;;
  esac
done
"#;

/// Fool's mate mover for the first game only; silent after `ucinewgame`.
const FOOL_ONCE: &str = r#"#!/bin/sh
n=0
retired=0
while IFS= read -r line; do
  case "$line" in
    uci) echo "uciok" ;;
    isready) echo "readyok" ;;
    ucinewgame) retired=1 ;;
    position*)
      set -- $line
      if [ $# -gt 2 ]; then n=$(($# - 3)); else n=0; fi ;;
    go*)
      if [ $retired -eq 0 ]; then
        case $n in
          0) m=f2f3 ;;
          1) m=e7e5 ;;
          2) m=g2g4 ;;
          3) m=d8h4 ;;
          *) m=0000 ;;
        esac
        echo "bestmove $m"
      fi ;;
    quit) exit 0 ;;
  esac
done
"#;

const DIE_EARLY: &str = "#!/bin/sh\nexit 1\n";

const DIE_ON_GO: &str = r#"#!/bin/sh
while IFS= read -r line; do
  case "$line" in
    uci) echo "uciok" ;;
    isready) echo "readyok" ;;
    go*) exit 3 ;;
    quit) exit 0 ;;
  esac
done
"#;

const NO_UCIOK: &str = r#"#!/bin/sh
while IFS= read -r line; do
  case "$line" in
    quit) exit 0 ;;
  esac
done
"#;

const STUBBORN: &str = r#"#!/bin/sh
while IFS= read -r line; do
  case "$line" in
    uci) echo "uciok" ;;
    isready) echo "readyok" ;;
  esac
done
exec sleep 30
"#;

fn fixtures_dir() -> &'static Path {
    static DIR: OnceLock<PathBuf> = OnceLock::new();
    DIR.get_or_init(|| {
        let dir = std::env::temp_dir().join(format!("arena-runner-fixtures-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("create fixture dir");

        let scripts: Vec<(&str, String)> = vec![
            ("fool.sh", fool_script(None)),
            ("fool_slow.sh", fool_script(Some("0.05"))),
            ("fool_once.sh", FOOL_ONCE.to_string()),
            ("silent.sh", SILENT.to_string()),
            ("die_early.sh", DIE_EARLY.to_string()),
            ("die_on_go.sh", DIE_ON_GO.to_string()),
            ("no_uciok.sh", NO_UCIOK.to_string()),
            ("stubborn.sh", STUBBORN.to_string()),
            ("illegal.sh", fixed_reply_script("bestmove e2e5")),
            ("null_move.sh", fixed_reply_script("bestmove 0000")),
            ("none_move.sh", fixed_reply_script("bestmove (none)")),
        ];
        for (name, body) in scripts {
            let path = dir.join(name);
            std::fs::write(&path, body).expect("write fixture");
            make_executable(&path);
        }
        dir
    })
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).expect("chmod fixture");
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}

/// Path of a fixture script, e.g. `fixture("fool")`.
pub fn fixture(name: &str) -> PathBuf {
    fixtures_dir().join(format!("{name}.sh"))
}

pub fn engine(script: &str, name: &str) -> EngineDefinition {
    EngineDefinition::new(fixture(script), name)
}

/// Lines the silent engine with `pid` logged on `stop`.
pub fn stop_count(pid: u32) -> usize {
    std::fs::read_to_string(fixtures_dir().join(format!("stop.{pid}")))
        .map(|text| text.lines().count())
        .unwrap_or(0)
}

pub fn fast_settings() -> GameSettings {
    GameSettings {
        max_moves: 500,
        move_overhead: Duration::from_millis(50),
        poll_interval: Duration::from_millis(50),
        stop_grace: Duration::from_millis(200),
    }
}

pub fn init_tracing() {
    if std::env::var_os("RUST_LOG").is_some() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

/// Keeps every event and tracks how many games were running at once.
#[derive(Default)]
pub struct RecordingSink {
    state: Mutex<Recorded>,
}

#[derive(Default)]
struct Recorded {
    events: Vec<ArenaEvent>,
    active: usize,
    max_active: usize,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ArenaEvent> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn max_active_games(&self) -> usize {
        self.state.lock().unwrap().max_active
    }

    /// Ids from `game_start` events, in order.
    pub fn started_games(&self) -> Vec<u32> {
        self.state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter_map(|e| match e.kind {
                EventKind::GameStart { game_id, .. } => Some(game_id),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&EventKind) -> bool) -> usize {
        self.state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| pred(&e.kind))
            .count()
    }
}

impl BroadcastSink for RecordingSink {
    fn publish(&self, event: ArenaEvent) -> Result<(), SinkError> {
        let mut state = self.state.lock().unwrap();
        match event.kind {
            EventKind::GameStart { .. } => {
                state.active += 1;
                state.max_active = state.max_active.max(state.active);
            }
            EventKind::GameEnd { .. } => state.active = state.active.saturating_sub(1),
            _ => {}
        }
        state.events.push(event);
        Ok(())
    }
}

/// Always fails; emission errors must not matter.
pub struct FailingSink;

impl BroadcastSink for FailingSink {
    fn publish(&self, _event: ArenaEvent) -> Result<(), SinkError> {
        Err(SinkError::Other("spectator server down".to_string()))
    }
}

/// One `record_game` call.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsCall {
    pub game_id: u32,
    pub result: GameResult,
    pub white: String,
    pub black: String,
    pub time_control: String,
}

#[derive(Clone, Default)]
pub struct RecordingStats {
    pub calls: std::sync::Arc<Mutex<Vec<StatsCall>>>,
}

impl StatsSink for RecordingStats {
    fn record_game(&mut self, record: &GameRecord, white: &str, black: &str, time_control: &str) {
        self.calls.lock().unwrap().push(StatsCall {
            game_id: record.game_id,
            result: record.result(),
            white: white.to_string(),
            black: black.to_string(),
            time_control: time_control.to_string(),
        });
    }
}
