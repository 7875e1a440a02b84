// Feed readings and the per-cycle observation merged with prior state

use chrono::{DateTime, Utc};

use super::GameState;

/// One title's raw count from the metrics feed.
///
/// The feed briefly reports zero while it refreshes, so zero is carried as
/// `None` ("no reading") instead of a genuine empty title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerReading {
    pub title: String,
    pub count: Option<u64>,
}

impl PlayerReading {
    pub fn from_feed(title: impl Into<String>, raw_count: u64) -> Self {
        Self {
            title: title.into(),
            count: (raw_count > 0).then_some(raw_count),
        }
    }
}

/// A title's latest reading after gap-filling from the previous cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub title: String,
    pub player_count: u64,
    pub previous_count: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

impl Observation {
    /// A missing reading falls back to the last known positive count, so a
    /// stored count never drops to zero because of a feed glitch.
    pub fn merge(reading: &PlayerReading, prior: Option<&GameState>, timestamp: DateTime<Utc>) -> Self {
        let previous_count = prior.map(|p| p.player_count);
        let player_count = reading
            .count
            .or(previous_count.filter(|&c| c > 0))
            .unwrap_or(0);
        Self {
            title: reading.title.clone(),
            player_count,
            previous_count,
            timestamp,
        }
    }
}

/// What the previous cycle decided for a title.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriorState {
    pub player_count: Option<u64>,
    pub vm_count: Option<u32>,
}

impl From<Option<&GameState>> for PriorState {
    fn from(prior: Option<&GameState>) -> Self {
        Self {
            player_count: prior.map(|p| p.player_count),
            vm_count: prior.map(|p| p.vm_count),
        }
    }
}
