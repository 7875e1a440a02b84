// Persisted per-title state and the document wrapping it

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::VmRecord;
use crate::scaling::Strategy;

/// One title's state as written to the games document. Rebuilt every cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub name: String,
    #[serde(default)]
    pub developer: String,
    #[serde(default)]
    pub player_count: u64,
    /// Deviation-corrected forecast; predictive titles only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_players: Option<f64>,
    /// Relative gap between observed and historical player count; predictive titles only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deviation: Option<f64>,
    #[serde(default)]
    pub vm_count: u32,
    #[serde(default)]
    pub scaling_strategy: Strategy,
    /// Fleet detail; populated only for the actively managed title.
    #[serde(default)]
    pub vms: Vec<VmRecord>,
    #[serde(default)]
    pub hourly_cost: f64,
    #[serde(default)]
    pub daily_cost: f64,
    /// Unclamped VM count when the hourly budget capped the decision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_clamped_from: Option<u32>,
    pub last_updated: DateTime<Utc>,
}

impl GameState {
    /// Hourly and daily cost for `vm_count` machines at `hourly_price`.
    pub fn costs(vm_count: u32, hourly_price: f64) -> (f64, f64) {
        let hourly = vm_count as f64 * hourly_price;
        (hourly, hourly * 24.0)
    }
}

/// Top-level JSON document: `{ "games": [...] }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GamesDocument {
    #[serde(default)]
    pub games: Vec<GameState>,
}

impl GamesDocument {
    pub fn new(games: Vec<GameState>) -> Self {
        Self { games }
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    /// Index by title. On duplicate names the first entry wins.
    pub fn by_name(&self) -> HashMap<&str, &GameState> {
        let mut out = HashMap::with_capacity(self.games.len());
        for g in &self.games {
            out.entry(g.name.as_str()).or_insert(g);
        }
        out
    }
}
