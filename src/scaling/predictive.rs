// Predictive family: historical pattern lookup with deviation correction.
//
// The deviation observed now is projected unchanged onto the lookahead bucket.
// That is the forecasting model, not an accuracy guarantee.

use super::change_log::DecisionTrace;
use super::pattern::{PatternStore, TimeBucket};

/// Minutes per lookahead interval.
const INTERVAL_MINUTES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictiveInput {
    /// Current local time, bucketed to 5 minutes.
    pub bucket: TimeBucket,
    pub current_player_count: u64,
    pub current_vms: u32,
    /// Players of headroom required on the last VM under the forecast.
    pub buffer: u64,
    pub respect_current_load: bool,
    pub time_offset_hours: i32,
    pub lookahead_intervals: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictiveOutcome {
    pub vm_count: u32,
    /// None when the pattern has no data for now or for the lookahead bucket.
    pub corrected_future: Option<f64>,
    pub deviation: f64,
    pub trace: Option<DecisionTrace>,
}

impl PredictiveOutcome {
    fn unchanged(current_vms: u32, deviation: f64) -> Self {
        Self {
            vm_count: current_vms,
            corrected_future: None,
            deviation,
            trace: None,
        }
    }
}

pub fn predictive_vm_count(
    title: &str,
    input: &PredictiveInput,
    players_per_vm: u64,
    patterns: &PatternStore,
) -> PredictiveOutcome {
    let players_per_vm = players_per_vm.max(1);
    let offset_bucket = input.bucket.shift_hours(input.time_offset_hours);

    let expected_now = match patterns.expected(offset_bucket) {
        Some(v) if v > 0.0 => v,
        _ => return PredictiveOutcome::unchanged(input.current_vms, 0.0),
    };
    let current = input.current_player_count as f64;
    let deviation = (current - expected_now) / expected_now;

    let next_bucket =
        offset_bucket.advance_minutes(input.lookahead_intervals.saturating_mul(INTERVAL_MINUTES));
    let Some(expected_next) = patterns.expected(next_bucket) else {
        return PredictiveOutcome::unchanged(input.current_vms, deviation);
    };

    let corrected_future = (expected_next * (1.0 + deviation)).max(0.0);

    let ppv = players_per_vm as f64;
    let mut required = ((corrected_future / ppv).ceil() as u64).max(1);
    let headroom = (required as f64) * ppv - corrected_future;
    if headroom < input.buffer as f64 {
        required = required.saturating_add(1);
    }

    if input.respect_current_load {
        required = required.max(input.current_player_count.div_ceil(players_per_vm));
    }

    let vm_count = super::to_vm_count(required);
    PredictiveOutcome {
        vm_count,
        corrected_future: Some(corrected_future),
        deviation,
        trace: Some(DecisionTrace {
            title: title.to_string(),
            bucket: input.bucket,
            current_players: input.current_player_count,
            expected_now,
            deviation,
            expected_next,
            corrected_future,
            vm_count,
        }),
    }
}
