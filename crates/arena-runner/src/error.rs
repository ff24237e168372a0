use std::path::PathBuf;
use thiserror::Error;

/// Failures of one engine process. Fatal to that engine instance only.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start engine {}: {reason}", path.display())]
    Spawn { path: PathBuf, reason: String },

    #[error("engine {name} exited before sending `{token}`")]
    Handshake { name: String, token: String },

    #[error("failed to write to engine {name}")]
    Write {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Problems detected before any engine is started.
#[derive(Debug, Error)]
pub enum TournamentConfigError {
    #[error("need at least 2 distinct engines, got {distinct}")]
    NotEnoughEngines { distinct: usize },

    #[error("no time controls configured")]
    NoTimeControls,

    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("invalid tournament config: {0}")]
    Parse(#[from] toml::de::Error),
}
