// Trend family: single-step linear extrapolation against a safe-fill capacity bound

/// Inputs for one trend decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendInput {
    pub current_count: u64,
    /// Zero or unknown means "no trend".
    pub previous_count: Option<u64>,
    /// Unknown falls back to the capacity-derived estimate.
    pub current_vms: Option<u32>,
    /// Fraction of a VM's capacity usable before it counts as full, in (0, 1].
    pub safe_fill: f64,
    pub respect_current_load: bool,
}

/// Players the fleet can hold when every VM but the last is full and the
/// last one is filled to its safe share.
fn safe_total(vms: u64, players_per_vm: u64, last_vm_safe: u64) -> u64 {
    (vms.max(1) - 1)
        .saturating_mul(players_per_vm)
        .saturating_add(last_vm_safe)
}

/// Smallest VM count whose safe total covers `load`.
fn vms_for_load(load: u64, players_per_vm: u64, last_vm_safe: u64) -> u64 {
    if load <= last_vm_safe {
        1
    } else {
        (load - last_vm_safe).div_ceil(players_per_vm).saturating_add(1)
    }
}

pub fn trend_vm_count(input: &TrendInput, players_per_vm: u64) -> u32 {
    let players_per_vm = players_per_vm.max(1);
    let current = input.current_count;
    let previous = input
        .previous_count
        .filter(|&p| p > 0)
        .unwrap_or(current);
    // current + (current - previous), floored at zero
    let predicted = if current >= previous {
        current.saturating_add(current - previous)
    } else {
        current.saturating_sub(previous - current)
    };

    let current_vms = input
        .current_vms
        .filter(|&v| v > 0)
        .map(u64::from)
        .unwrap_or_else(|| current.div_ceil(players_per_vm).max(1));

    let last_vm_safe = (players_per_vm as f64 * input.safe_fill.clamp(0.0, 1.0)).floor() as u64;
    let bound = |vms: u64| safe_total(vms, players_per_vm, last_vm_safe);

    if predicted > bound(current_vms) {
        let shortfall = predicted - bound(current_vms);
        let mut new_vms = current_vms.saturating_add(shortfall / players_per_vm);
        // each step grows the bound by players_per_vm until it saturates at u64::MAX
        while predicted > bound(new_vms) && new_vms < u64::MAX {
            new_vms = new_vms.saturating_add(1);
        }
        return super::to_vm_count(new_vms);
    }

    if predicted < current {
        let mut ideal = vms_for_load(current, players_per_vm, last_vm_safe);
        if input.respect_current_load {
            // Present demand never needs more than the safe-fill sizing above,
            // so this floor does not bind today.
            let required_now = current.div_ceil(players_per_vm).max(1);
            ideal = ideal.max(required_now);
        }
        if ideal < current_vms {
            return super::to_vm_count(ideal);
        }
    }

    super::to_vm_count(current_vms)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PPV: u64 = 500;

    fn input(current: u64, previous: Option<u64>, vms: Option<u32>) -> TrendInput {
        TrendInput {
            current_count: current,
            previous_count: previous,
            current_vms: vms,
            safe_fill: 0.8,
            respect_current_load: false,
        }
    }

    #[test]
    fn flat_trend_within_bound_keeps_vms() {
        // safe total for 2 VMs = 500 + 400 = 900
        assert_eq!(trend_vm_count(&input(800, Some(800), Some(2)), PPV), 2);
    }

    #[test]
    fn unknown_previous_is_zero_trend() {
        assert_eq!(trend_vm_count(&input(800, None, Some(2)), PPV), 2);
        assert_eq!(trend_vm_count(&input(800, Some(0), Some(2)), PPV), 2);
    }

    #[test]
    fn rising_trend_scales_up_past_bound() {
        // predicted = 900 + 200 = 1100 > 900; 3 VMs hold 1400
        assert_eq!(trend_vm_count(&input(900, Some(700), Some(2)), PPV), 3);
    }

    #[test]
    fn steep_rise_adds_several_vms() {
        // predicted = 3000 + 2000 = 5000; need (n-1)*500 + 400 >= 5000 -> n = 11
        assert_eq!(trend_vm_count(&input(3000, Some(1000), Some(2)), PPV), 11);
    }

    #[test]
    fn unknown_vms_uses_capacity_estimate() {
        // 1200 players -> 3 VMs estimate; safe total 1400 covers flat trend
        assert_eq!(trend_vm_count(&input(1200, None, None), PPV), 3);
    }

    #[test]
    fn falling_trend_sizes_to_current_load() {
        // predicted = 600 - 400 = 200 < 600; current load 600 needs 2 VMs (500 + 400)
        assert_eq!(trend_vm_count(&input(600, Some(1000), Some(5)), PPV), 2);
    }

    #[test]
    fn falling_trend_never_grows_fleet() {
        // predicted 1600 fits 4 VMs (1900); sizing 2000 would need 5: no change
        assert_eq!(trend_vm_count(&input(2000, Some(2400), Some(4)), PPV), 4);
    }

    #[test]
    fn respect_current_load_is_a_known_no_op() {
        for (current, previous, vms) in [(600, 1000, 5), (50, 400, 4), (1450, 1500, 6), (1, 2, 3)] {
            let mut with = input(current, Some(previous), Some(vms));
            with.respect_current_load = true;
            let without = input(current, Some(previous), Some(vms));
            assert_eq!(trend_vm_count(&with, PPV), trend_vm_count(&without, PPV));
        }
    }

    #[test]
    fn huge_counts_saturate_instead_of_overflowing() {
        for current in [u64::MAX, u64::MAX / 2 + 1] {
            assert_eq!(trend_vm_count(&input(current, None, Some(2)), PPV), u32::MAX);
            assert_eq!(trend_vm_count(&input(current, Some(1), None), PPV), u32::MAX);
            assert_eq!(trend_vm_count(&input(current, Some(1), None), 1), u32::MAX);
        }
        // falling from the top of the range keeps the fleet
        assert_eq!(trend_vm_count(&input(u64::MAX / 2 + 1, Some(u64::MAX), Some(3)), 1), 3);
    }

    #[test]
    fn scale_up_result_always_covers_prediction() {
        for safe_fill in [0.1, 0.5, 0.8, 1.0] {
            let last_safe = (PPV as f64 * safe_fill).floor() as u64;
            for current in (0..6_000u64).step_by(37) {
                for previous in [0u64, 10, 250, 1_000, 3_000] {
                    for vms in [1u32, 2, 7] {
                        let inp = TrendInput {
                            current_count: current,
                            previous_count: Some(previous),
                            current_vms: Some(vms),
                            safe_fill,
                            respect_current_load: false,
                        };
                        let prev = if previous == 0 { current } else { previous };
                        let predicted = (current * 2).saturating_sub(prev);
                        let new_vms = trend_vm_count(&inp, PPV) as u64;
                        if predicted > (vms as u64 - 1) * PPV + last_safe {
                            assert!(
                                predicted <= (new_vms - 1) * PPV + last_safe,
                                "current={current} previous={previous} vms={vms} fill={safe_fill}"
                            );
                        }
                    }
                }
            }
        }
    }
}
