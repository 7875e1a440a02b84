// Domain models: feed readings, persisted per-title state, fleet members

mod game;
mod observation;
mod vm;

pub use game::{GameState, GamesDocument};
pub use observation::{Observation, PlayerReading, PriorState};
pub use vm::{ServerSummary, VmRecord, is_manager};
