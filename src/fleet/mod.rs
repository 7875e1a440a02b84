// Reconcile the managed title's VM count against the provider

mod shutdown;

pub use shutdown::{ShutdownCandidate, plan_shutdown};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use crate::cloud_repo::{CloudError, CloudProvider, ServerSpec};
use crate::config::{CloudConfig, FleetConfig};
use crate::models::{ServerSummary, VmRecord, is_manager};

const ACTIVE: &str = "ACTIVE";
const ERROR: &str = "ERROR";
const DELETED: &str = "DELETED";

/// Fixed-interval bounded polling. The first check is immediate; each later
/// one follows a sleep of `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    /// Enough attempts that the sleeps add up to at least `timeout`.
    pub fn covering(interval: Duration, timeout: Duration) -> Self {
        let steps = if interval.is_zero() {
            0
        } else {
            timeout.as_nanos().div_ceil(interval.as_nanos())
        };
        Self {
            interval,
            max_attempts: u32::try_from(steps).unwrap_or(u32::MAX - 1).saturating_add(1),
        }
    }

    /// Time slept when every attempt is used.
    pub fn waited(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }
}

#[derive(Debug, Clone)]
pub struct FleetSettings {
    pub name_prefix: String,
    pub manager_marker: String,
    pub hourly_price: f64,
    pub min_minutes_to_next_hour: u32,
    /// Boot parameters; the name is filled in per VM.
    pub template: ServerSpec,
    pub ready: PollPolicy,
    pub delete: PollPolicy,
}

impl FleetSettings {
    pub fn from_config(fleet: &FleetConfig, cloud: &CloudConfig) -> Self {
        let ready_interval = fleet.ready_poll_interval_secs.max(1);
        Self {
            name_prefix: fleet.vm_name_prefix(),
            manager_marker: fleet.manager_marker.clone(),
            hourly_price: fleet.hourly_price,
            min_minutes_to_next_hour: fleet.min_minutes_to_next_hour,
            template: ServerSpec::from_config(String::new(), cloud),
            ready: PollPolicy::covering(
                Duration::from_secs(ready_interval),
                Duration::from_secs(fleet.ready_timeout_secs),
            ),
            delete: PollPolicy {
                interval: Duration::from_secs(fleet.delete_poll_interval_secs),
                max_attempts: fleet.delete_max_attempts.max(1),
            },
        }
    }
}

/// Outcome of one reconciliation. `vm_count` and `vms` come from a fresh
/// listing after all changes and are authoritative.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FleetReport {
    pub vm_count: u32,
    pub vms: Vec<VmRecord>,
    pub started: Vec<String>,
    pub stopped: Vec<String>,
    pub failures: Vec<String>,
}

pub struct FleetController {
    cloud: Arc<dyn CloudProvider>,
    settings: FleetSettings,
}

impl FleetController {
    pub fn new(cloud: Arc<dyn CloudProvider>, settings: FleetSettings) -> Self {
        Self { cloud, settings }
    }

    async fn game_servers(&self) -> Result<Vec<ServerSummary>, CloudError> {
        let servers = self.cloud.list_servers().await?;
        Ok(servers
            .into_iter()
            .filter(|s| !is_manager(&s.name, &self.settings.manager_marker))
            .collect())
    }

    /// Billed view of the fleet, manager nodes excluded.
    pub async fn snapshot(&self, now: DateTime<Utc>) -> Result<Vec<VmRecord>, CloudError> {
        Ok(self
            .game_servers()
            .await?
            .iter()
            .map(|s| VmRecord::from_server(s, now, self.settings.hourly_price))
            .collect())
    }

    /// Start or stop VMs toward `desired`. Individual VM failures are collected in the
    /// report; only a failure to read the fleet up front is returned as an error.
    #[instrument(skip(self, now), fields(operation = "reconcile"))]
    pub async fn reconcile(&self, desired: u32, now: DateTime<Utc>) -> Result<FleetReport, CloudError> {
        let servers = self.game_servers().await?;
        let current = u32::try_from(servers.len()).unwrap_or(u32::MAX);
        let mut report = FleetReport::default();

        if desired > current {
            info!(current, desired, "scaling up");
            self.start_vms(desired - current, &mut report).await;
        } else if desired < current {
            info!(current, desired, "scaling down");
            self.stop_vms(current - desired, &servers, now, &mut report).await;
        }

        match self.snapshot(Utc::now()).await {
            Ok(vms) => {
                report.vm_count = u32::try_from(vms.len()).unwrap_or(u32::MAX);
                report.vms = vms;
            }
            Err(e) => {
                warn!(error = %e, "fleet re-read failed; reporting estimated count");
                let started = report.started.len() as u32;
                let stopped = report.stopped.len() as u32;
                report.vm_count = (current + started).saturating_sub(stopped);
            }
        }
        Ok(report)
    }

    async fn start_vms(&self, count: u32, report: &mut FleetReport) {
        let stamp = Utc::now().timestamp();
        for i in 0..count {
            let name = format!("{}-{}-{}", self.settings.name_prefix, stamp, i);
            let spec = ServerSpec {
                name: name.clone(),
                ..self.settings.template.clone()
            };
            let result = match self.cloud.create_server(&spec).await {
                Ok(id) => self.wait_until_ready(&id, &name).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => {
                    info!(vm = %name, "VM started");
                    report.started.push(name);
                }
                Err(CloudError::Forbidden(body)) => {
                    warn!(vm = %name, error = %body, "quota exceeded or permission denied; skipping");
                    report.failures.push(format!("{}: forbidden", name));
                }
                Err(e) => {
                    warn!(vm = %name, error = %e, "VM start failed; skipping");
                    report.failures.push(format!("{}: {}", name, e));
                }
            }
        }
    }

    pub async fn wait_until_ready(&self, id: &str, name: &str) -> Result<(), CloudError> {
        let policy = self.settings.ready;
        for attempt in 0..policy.max_attempts {
            match self.cloud.server_status(id).await {
                Ok(Some(status)) if status.eq_ignore_ascii_case(ACTIVE) => return Ok(()),
                Ok(Some(status)) if status.eq_ignore_ascii_case(ERROR) => {
                    return Err(CloudError::ServerFailed {
                        name: name.to_string(),
                        status,
                    });
                }
                Ok(None) => {
                    return Err(CloudError::ServerFailed {
                        name: name.to_string(),
                        status: DELETED.into(),
                    });
                }
                Ok(Some(_)) => {}
                Err(e) => warn!(vm = %name, error = %e, "status poll failed"),
            }
            if attempt + 1 < policy.max_attempts {
                tokio::time::sleep(policy.interval).await;
            }
        }
        Err(CloudError::Timeout {
            name: name.to_string(),
            operation: "become active",
            waited: policy.waited(),
        })
    }

    async fn stop_vms(
        &self,
        count: u32,
        servers: &[ServerSummary],
        now: DateTime<Utc>,
        report: &mut FleetReport,
    ) {
        let records: Vec<VmRecord> = servers
            .iter()
            .map(|s| VmRecord::from_server(s, now, self.settings.hourly_price))
            .collect();
        let plan = plan_shutdown(&records, self.settings.min_minutes_to_next_hour);
        let candidates: Vec<&ShutdownCandidate> = plan
            .iter()
            .filter(|c| c.eligible)
            .take(count as usize)
            .collect();
        if candidates.len() < count as usize {
            info!(
                requested = count,
                eligible = candidates.len(),
                "fewer VMs eligible for shutdown than requested"
            );
        }

        for candidate in candidates {
            let name = &candidate.name;
            // the listing may be stale after earlier deletes; look the VM up again
            let server = match self.cloud.list_servers().await {
                Ok(list) => list.into_iter().find(|s| &s.name == name),
                Err(e) => {
                    warn!(vm = %name, error = %e, "lookup before delete failed");
                    report.failures.push(format!("{}: {}", name, e));
                    continue;
                }
            };
            let Some(server) = server else {
                warn!(vm = %name, "VM not found; skipping");
                continue;
            };
            if is_manager(&server.name, &self.settings.manager_marker) {
                warn!(vm = %name, "refusing to delete manager node");
                continue;
            }
            match self.delete_and_confirm(&server.id, name).await {
                Ok(()) => {
                    info!(vm = %name, "VM deleted");
                    report.stopped.push(name.clone());
                }
                Err(e) => {
                    warn!(vm = %name, error = %e, "VM delete failed");
                    report.failures.push(format!("{}: {}", name, e));
                }
            }
        }
    }

    async fn delete_and_confirm(&self, id: &str, name: &str) -> Result<(), CloudError> {
        self.cloud.delete_server(id).await?;
        let policy = self.settings.delete;
        for attempt in 0..policy.max_attempts {
            match self.cloud.server_status(id).await {
                Ok(None) => return Ok(()),
                Ok(Some(status)) if status.eq_ignore_ascii_case(DELETED) => return Ok(()),
                Ok(Some(_)) => {}
                Err(e) => warn!(vm = %name, error = %e, "status poll failed"),
            }
            if attempt + 1 < policy.max_attempts {
                tokio::time::sleep(policy.interval).await;
            }
        }
        Err(CloudError::Timeout {
            name: name.to_string(),
            operation: "disappear",
            waited: policy.waited(),
        })
    }
}
