// Per-title hourly spend ceiling

/// Result of applying a budget to a desired VM count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetOutcome {
    pub vm_count: u32,
    /// Set when the budget lowered the count; holds the requested value.
    pub clamped_from: Option<u32>,
}

/// Clamp `vm_count` to what `max_budget` buys at `hourly_price`, never below one VM.
/// The ceiling only lowers; it is never raised to meet demand.
pub fn enforce(vm_count: u32, hourly_price: f64, max_budget: Option<f64>) -> BudgetOutcome {
    let unclamped = BudgetOutcome {
        vm_count,
        clamped_from: None,
    };
    let Some(budget) = max_budget else {
        return unclamped;
    };
    if hourly_price.is_nan() || hourly_price <= 0.0 {
        return unclamped;
    }
    let affordable = (budget / hourly_price).floor();
    let max_allowed = if affordable >= u32::MAX as f64 {
        u32::MAX
    } else {
        (affordable.max(0.0) as u32).max(1)
    };
    if vm_count > max_allowed {
        tracing::info!(
            requested = vm_count,
            allowed = max_allowed,
            budget,
            hourly_price,
            "budget cap applied"
        );
        BudgetOutcome {
            vm_count: max_allowed,
            clamped_from: Some(vm_count),
        }
    } else {
        unclamped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_budget_passes_through() {
        assert_eq!(enforce(40, 1.5, None), BudgetOutcome { vm_count: 40, clamped_from: None });
    }

    #[test]
    fn over_budget_is_clamped_and_reported() {
        // 10.0 / 1.5 = 6.67 -> 6 VMs
        let out = enforce(9, 1.5, Some(10.0));
        assert_eq!(out.vm_count, 6);
        assert_eq!(out.clamped_from, Some(9));
    }

    #[test]
    fn within_budget_is_untouched() {
        assert_eq!(enforce(6, 1.5, Some(10.0)).clamped_from, None);
    }

    #[test]
    fn never_below_one_vm() {
        let out = enforce(4, 1.5, Some(0.5));
        assert_eq!(out.vm_count, 1);
        assert_eq!(out.clamped_from, Some(4));
    }

    #[test]
    fn clamped_spend_is_at_most_one_vm_over() {
        let price = 1.5;
        for budget in [0.1, 1.0, 1.5, 2.9, 7.5, 10.0, 99.99] {
            for desired in 1..50u32 {
                let out = enforce(desired, price, Some(budget));
                assert!(out.vm_count >= 1);
                assert!(out.vm_count <= desired);
                assert!(out.vm_count as f64 * price <= budget + price + 1e-9);
            }
        }
    }
}
