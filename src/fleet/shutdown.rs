// Rank fleet members by how close they are to their next billed hour

use tracing::debug;

use crate::models::VmRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct ShutdownCandidate {
    pub name: String,
    pub uptime_secs: u64,
    pub minutes_past_hour: f64,
    pub minutes_to_next_hour: f64,
    pub eligible: bool,
}

/// VMs with a known uptime, nearest billing boundary first. A VM is eligible when
/// at most `threshold_minutes` remain in its current paid hour.
pub fn plan_shutdown(vms: &[VmRecord], threshold_minutes: u32) -> Vec<ShutdownCandidate> {
    let mut plan: Vec<ShutdownCandidate> = vms
        .iter()
        .filter_map(|vm| {
            let uptime_secs = vm.uptime_secs?;
            let minutes_past_hour = (uptime_secs as f64 / 60.0) % 60.0;
            let minutes_to_next_hour = 60.0 - minutes_past_hour;
            Some(ShutdownCandidate {
                name: vm.name.clone(),
                uptime_secs,
                minutes_past_hour,
                minutes_to_next_hour,
                eligible: minutes_to_next_hour <= threshold_minutes as f64,
            })
        })
        .collect();
    plan.sort_by(|a, b| a.minutes_to_next_hour.total_cmp(&b.minutes_to_next_hour));

    for c in &plan {
        debug!(
            vm = %c.name,
            uptime_secs = c.uptime_secs,
            past_min = c.minutes_past_hour.round() as u64,
            to_next_hour = c.minutes_to_next_hour.round() as u64,
            eligible = c.eligible,
            "shutdown ranking"
        );
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vm(name: &str, uptime_minutes: Option<u64>) -> VmRecord {
        let uptime_secs = uptime_minutes.map(|m| m * 60);
        VmRecord {
            name: name.into(),
            status: "ACTIVE".into(),
            launched_at: None,
            uptime_secs,
            paid_hours: uptime_secs.map_or(0, |s| s.div_ceil(3600)),
            cost: 0.0,
        }
    }

    #[test]
    fn fifty_five_minutes_is_five_from_the_hour() {
        let plan = plan_shutdown(&[vm("a", Some(55))], 10);
        assert_eq!(plan.len(), 1);
        assert!((plan[0].minutes_to_next_hour - 5.0).abs() < 1e-9);
        assert!(plan[0].eligible);

        assert!(plan_shutdown(&[vm("a", Some(55))], 5)[0].eligible);
        assert!(!plan_shutdown(&[vm("a", Some(55))], 4)[0].eligible);
    }

    #[test]
    fn sorted_by_proximity_to_boundary() {
        let plan = plan_shutdown(
            &[vm("fresh", Some(20)), vm("old", Some(170)), vm("near", Some(55))],
            10,
        );
        let names: Vec<&str> = plan.iter().map(|c| c.name.as_str()).collect();
        // to next hour: near 5, old 10, fresh 40
        assert_eq!(names, ["near", "old", "fresh"]);
        let eligible: Vec<bool> = plan.iter().map(|c| c.eligible).collect();
        assert_eq!(eligible, [true, true, false]);
    }

    #[test]
    fn unknown_uptime_is_never_a_candidate() {
        let plan = plan_shutdown(&[vm("pending", None), vm("a", Some(58))], 60);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].name, "a");
    }

    #[test]
    fn whole_hour_waits_a_full_hour() {
        let plan = plan_shutdown(&[vm("a", Some(120))], 10);
        assert!((plan[0].minutes_to_next_hour - 60.0).abs() < 1e-9);
        assert!(!plan[0].eligible);
    }
}
