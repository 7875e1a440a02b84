// Fleet members: raw provider summary and the billed view derived from it

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const SECS_PER_HOUR: u64 = 3600;

/// What the cloud provider reports for one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSummary {
    pub id: String,
    pub name: String,
    pub status: String,
    /// None until the provider has scheduled the VM.
    pub launched_at: Option<DateTime<Utc>>,
}

/// A fleet member as seen in one cycle's snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmRecord {
    pub name: String,
    pub status: String,
    pub launched_at: Option<DateTime<Utc>>,
    pub uptime_secs: Option<u64>,
    /// Whole billed hours, partial hours rounded up.
    pub paid_hours: u64,
    pub cost: f64,
}

impl VmRecord {
    pub fn from_server(server: &ServerSummary, now: DateTime<Utc>, hourly_price: f64) -> Self {
        let uptime_secs = server
            .launched_at
            .map(|launched| (now - launched).num_seconds().max(0) as u64);
        let paid_hours = uptime_secs.map_or(0, |s| s.div_ceil(SECS_PER_HOUR));
        Self {
            name: server.name.clone(),
            status: server.status.clone(),
            launched_at: server.launched_at,
            uptime_secs,
            paid_hours,
            cost: paid_hours as f64 * hourly_price,
        }
    }
}

/// Management nodes carry a reserved marker in their name and are never part of the fleet.
pub fn is_manager(name: &str, marker: &str) -> bool {
    !marker.is_empty() && name.to_lowercase().contains(&marker.to_lowercase())
}
