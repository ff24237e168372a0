//! Tournament runner for UCI engines
//!
//! This crate provides infrastructure for:
//! - Driving engine subprocesses over UCI ([`UciEngine`])
//! - Playing single games under a clock ([`GameSession`])
//! - Playing color-swapped pairs ([`Pairing`])
//! - Scheduling many pairs concurrently ([`MatchRunner`])
//!
//! # Usage
//!
//! ```no_run
//! use arena_runner::{EloTracker, EngineDefinition, MatchRunner, TournamentConfig};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let engines = vec![
//!     EngineDefinition::from_path("engines/alpha"),
//!     EngineDefinition::from_path("engines/beta"),
//! ];
//! let report = MatchRunner::new(engines, TournamentConfig::default())?
//!     .with_stats(Box::new(EloTracker::new()))
//!     .run()
//!     .await?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```

mod config;
mod elo;
mod engine;
mod error;
mod game;
mod match_runner;
mod pair;
mod sink;

pub use config::*;
pub use elo::*;
pub use engine::*;
pub use error::*;
pub use game::*;
pub use match_runner::*;
pub use pair::*;
pub use sink::*;
