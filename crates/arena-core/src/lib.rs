//! Core data for engine tournaments: clocks, UCI protocol text, the rules
//! oracle, result records and broadcast events.
//!
//! Nothing here touches processes or time; see `arena-runner` for that.

pub mod clock;
pub mod events;
pub mod openings;
pub mod record;
pub mod rules;
pub mod types;
pub mod uci;

pub use clock::Clock;
pub use events::*;
pub use openings::*;
pub use record::*;
pub use rules::*;
pub use types::*;
pub use uci::{Evaluation, Score, SearchInfo};
