// Threshold family (normal / aggressive / passive)

/// `ceil(player_count / players_per_vm)`, at least 1, plus one more VM when the
/// unused share of the fleet is at or below `scale_up_percent`.
pub fn threshold_vm_count(player_count: u64, players_per_vm: u64, scale_up_percent: f64) -> u32 {
    let players_per_vm = players_per_vm.max(1);
    let vm_count = player_count.div_ceil(players_per_vm).max(1);
    let capacity = vm_count.saturating_mul(players_per_vm);
    let remaining = capacity.saturating_sub(player_count);
    // remaining / capacity * 100 <= percent, kept in integers-as-f64 to avoid rounding at the boundary
    let scale_up = (remaining as f64) * 100.0 <= scale_up_percent * capacity as f64;
    super::to_vm_count(if scale_up { vm_count.saturating_add(1) } else { vm_count })
}
