// Scaling decisions. One function per strategy family behind a common entry point:
// (Observation, ScalingConfig, PriorState) -> Decision.

mod change_log;
mod pattern;
mod predictive;
mod strategy;
mod threshold;
mod trend;

pub use change_log::{ChangeLog, DecisionTrace};
pub use pattern::{PatternStore, TimeBucket, day_name};
pub use predictive::{PredictiveInput, PredictiveOutcome, predictive_vm_count};
pub use strategy::Strategy;
pub use threshold::threshold_vm_count;
pub use trend::{TrendInput, trend_vm_count};

use crate::config::ScalingConfig;
use crate::models::{Observation, PriorState};

/// Desired VM count for one title, before budget and fleet reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub vm_count: u32,
    pub expected_players: Option<f64>,
    pub deviation: Option<f64>,
}

impl Decision {
    fn vms(vm_count: u32) -> Self {
        Self {
            vm_count,
            expected_players: None,
            deviation: None,
        }
    }
}

pub(crate) fn to_vm_count(n: u64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Owns the pattern table and the predictive change log. Everything else is pure.
#[derive(Debug)]
pub struct ScalingEngine {
    players_per_vm: u64,
    patterns: PatternStore,
    change_log: ChangeLog,
}

impl ScalingEngine {
    pub fn new(players_per_vm: u64, patterns: PatternStore, change_log: ChangeLog) -> Self {
        Self {
            players_per_vm: players_per_vm.max(1),
            patterns,
            change_log,
        }
    }

    pub async fn decide(
        &mut self,
        observation: &Observation,
        config: &ScalingConfig,
        prior: &PriorState,
        bucket: TimeBucket,
    ) -> Decision {
        match config.strategy {
            Strategy::Normal | Strategy::Aggressive | Strategy::Passive => {
                let percent = config.strategy.scale_up_percent().unwrap_or(5.0);
                let demand = observation.player_count.saturating_add(config.buffer);
                Decision::vms(threshold_vm_count(demand, self.players_per_vm, percent))
            }
            Strategy::Trend => {
                let input = TrendInput {
                    current_count: observation.player_count,
                    previous_count: observation.previous_count,
                    current_vms: prior.vm_count,
                    safe_fill: config.threshold_percent,
                    respect_current_load: config.respect_current_load,
                };
                Decision::vms(trend_vm_count(&input, self.players_per_vm))
            }
            Strategy::Predictive => {
                let input = PredictiveInput {
                    bucket,
                    current_player_count: observation.player_count,
                    current_vms: prior.vm_count.filter(|&v| v > 0).unwrap_or(1),
                    buffer: config.buffer,
                    respect_current_load: config.respect_current_load,
                    time_offset_hours: config.time_offset_hours,
                    lookahead_intervals: config.lookahead_intervals,
                };
                let outcome = predictive_vm_count(
                    &observation.title,
                    &input,
                    self.players_per_vm,
                    &self.patterns,
                );
                if let Some(trace) = &outcome.trace {
                    self.change_log.record(trace).await;
                }
                tracing::debug!(
                    title = %observation.title,
                    players = observation.player_count,
                    forecast = ?outcome.corrected_future,
                    deviation = outcome.deviation,
                    vm_count = outcome.vm_count,
                    "predictive decision"
                );
                Decision {
                    vm_count: outcome.vm_count,
                    expected_players: outcome.corrected_future,
                    deviation: Some(outcome.deviation),
                }
            }
        }
    }
}
