//! UCI engine subprocess client.
//!
//! A [`UciEngine`] owns one child process. A reader task forwards stdout
//! lines, in order, over an unbounded channel; a second task drains stderr
//! into the log. Commands go to stdin one line at a time.

use arena_core::uci;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::EngineError;

/// Default wait after `quit` before the process is killed.
pub const DEFAULT_QUIT_GRACE: Duration = Duration::from_millis(1000);

/// An engine executable and the name it plays under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EngineDefinition {
    pub path: PathBuf,
    pub name: String,
}

impl EngineDefinition {
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
        }
    }

    /// Uses the file stem as the display name.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, name }
    }
}

pub struct UciEngine {
    name: String,
    child: Child,
    stdin: Option<ChildStdin>,
    lines: mpsc::UnboundedReceiver<String>,
    stdout_closed: bool,
    quit_grace: Duration,
    closed: bool,
}

impl UciEngine {
    /// Spawns the engine and completes the `uci`/`isready` handshake.
    ///
    /// The handshake has no deadline of its own: an engine that stays alive
    /// without answering blocks this call forever. Wrap it in a timeout.
    pub async fn start(def: &EngineDefinition) -> Result<Self, EngineError> {
        let mut engine = Self::spawn(def)?;
        engine.handshake().await?;
        Ok(engine)
    }

    fn spawn(def: &EngineDefinition) -> Result<Self, EngineError> {
        let spawn_err = |reason: String| EngineError::Spawn {
            path: def.path.clone(),
            reason,
        };

        let metadata = std::fs::metadata(&def.path).map_err(|e| spawn_err(e.to_string()))?;
        if !metadata.is_file() {
            return Err(spawn_err("not a file".to_string()));
        }
        ensure_executable(&def.path, &metadata);

        let mut child = Command::new(&def.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_err(e.to_string()))?;

        if let Ok(Some(status)) = child.try_wait() {
            return Err(spawn_err(format!("exited immediately with {status}")));
        }

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_err("stdout not captured".to_string()))?;
        let stderr = child.stderr.take();

        let (tx, rx) = mpsc::unbounded_channel();
        let name = def.name.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                trace!(engine = %name, "<< {line}");
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        if let Some(stderr) = stderr {
            let name = def.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(engine = %name, stderr = %line);
                }
            });
        }

        debug!(engine = %def.name, pid = ?child.id(), path = %def.path.display(), "Spawned engine");

        Ok(Self {
            name: def.name.clone(),
            child,
            stdin,
            lines: rx,
            stdout_closed: false,
            quit_grace: DEFAULT_QUIT_GRACE,
            closed: false,
        })
    }

    async fn handshake(&mut self) -> Result<(), EngineError> {
        self.send(uci::UCI).await?;
        self.expect_token(uci::UCI_OK).await?;
        self.send(uci::IS_READY).await?;
        self.expect_token(uci::READY_OK).await
    }

    async fn expect_token(&mut self, token: &str) -> Result<(), EngineError> {
        if self.wait_for_token(token).await {
            Ok(())
        } else {
            Err(EngineError::Handshake {
                name: self.name.clone(),
                token: token.to_string(),
            })
        }
    }

    pub fn with_quit_grace(mut self, grace: Duration) -> Self {
        self.quit_grace = grace;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Writes `line` plus a newline and flushes.
    pub async fn send(&mut self, line: &str) -> Result<(), EngineError> {
        trace!(engine = %self.name, ">> {line}");
        let write_err = |source| EngineError::Write {
            name: self.name.clone(),
            source,
        };
        let stdin = self.stdin.as_mut().ok_or_else(|| {
            write_err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "stdin closed",
            ))
        })?;
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        stdin.write_all(&buf).await.map_err(write_err)?;
        stdin.flush().await.map_err(write_err)
    }

    /// Oldest unread line, waiting up to `timeout`. `None` when nothing
    /// arrived in time or the output stream has ended.
    pub async fn next_line(&mut self, timeout: Duration) -> Option<String> {
        if self.stdout_closed {
            return None;
        }
        match tokio::time::timeout(timeout, self.lines.recv()).await {
            Ok(Some(line)) => Some(line),
            Ok(None) => {
                self.stdout_closed = true;
                None
            }
            Err(_) => None,
        }
    }

    /// Reads lines until one contains `token`. Returns `false` if the output
    /// stream ends first. No deadline.
    pub async fn wait_for_token(&mut self, token: &str) -> bool {
        while !self.stdout_closed {
            match self.lines.recv().await {
                Some(line) if line.contains(token) => return true,
                Some(_) => {}
                None => self.stdout_closed = true,
            }
        }
        false
    }

    /// Non-blocking liveness check. An engine whose stdout has closed is
    /// treated as dead even if the process has not been reaped yet.
    pub fn is_alive(&mut self) -> bool {
        if self.closed || self.stdout_closed {
            return false;
        }
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Drops unread output, then `ucinewgame` + `isready`/`readyok`.
    pub async fn reset(&mut self) -> Result<(), EngineError> {
        let mut dropped = 0usize;
        while self.lines.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!(engine = %self.name, dropped, "Discarded stale output");
        }
        self.send(uci::NEW_GAME).await?;
        self.send(uci::IS_READY).await?;
        self.expect_token(uci::READY_OK).await
    }

    /// Sends `quit`, waits the grace period and kills the process if it is
    /// still running. Safe to call more than once; never fails.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(err) = self.send(uci::QUIT).await {
            debug!(engine = %self.name, error = %err, "quit not delivered");
        }
        // Closing stdin lets engines that ignore quit see EOF.
        self.stdin = None;

        match tokio::time::timeout(self.quit_grace, self.child.wait()).await {
            Ok(Ok(status)) => debug!(engine = %self.name, %status, "Engine exited"),
            Ok(Err(err)) => warn!(engine = %self.name, error = %err, "Failed waiting for engine"),
            Err(_) => {
                warn!(engine = %self.name, pid = ?self.child.id(), "Engine ignored quit, killing");
                if let Err(err) = self.child.kill().await {
                    warn!(engine = %self.name, error = %err, "Failed to kill engine");
                }
            }
        }
    }
}

impl std::fmt::Debug for UciEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UciEngine")
            .field("name", &self.name)
            .field("pid", &self.child.id())
            .field("closed", &self.closed)
            .finish()
    }
}

/// Best-effort `chmod +x` for files missing the execute bit.
#[cfg(unix)]
fn ensure_executable(path: &Path, metadata: &std::fs::Metadata) {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = metadata.permissions();
    if perms.mode() & 0o111 != 0 {
        return;
    }
    perms.set_mode(perms.mode() | 0o755);
    if let Err(err) = std::fs::set_permissions(path, perms) {
        warn!(path = %path.display(), error = %err, "Could not make engine executable");
    }
}

#[cfg(not(unix))]
fn ensure_executable(_path: &Path, _metadata: &std::fs::Metadata) {}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod engine_tests;
