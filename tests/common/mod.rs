// Shared test helpers: in-memory cloud, scripted metrics feed, settings

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleetscaler::cloud_repo::{CloudError, CloudProvider, ServerSpec};
use fleetscaler::fleet::{FleetSettings, PollPolicy};
use fleetscaler::metrics_repo::MetricsSource;
use fleetscaler::models::{GameState, PlayerReading, ServerSummary};
use fleetscaler::scaling::Strategy;

#[derive(Default)]
struct FakeState {
    servers: Vec<ServerSummary>,
    next_id: u64,
    create_calls: usize,
    reject_create_calls: HashSet<usize>,
    create_status: Option<String>,
    sticky_deletes: bool,
    fail_list: bool,
    delete_calls: Vec<String>,
}

/// Compute provider kept in memory. Created servers are ACTIVE immediately
/// unless `boot_status` says otherwise.
#[derive(Default)]
pub struct FakeCloud {
    state: Mutex<FakeState>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a server launched `minutes_ago` minutes before now.
    pub fn with_server(self, name: &str, minutes_ago: i64) -> Self {
        {
            let mut s = self.state.lock().unwrap();
            s.next_id += 1;
            let id = format!("srv-{}", s.next_id);
            s.servers.push(ServerSummary {
                id,
                name: name.to_string(),
                status: "ACTIVE".into(),
                launched_at: Some(Utc::now() - chrono::Duration::minutes(minutes_ago)),
            });
        }
        self
    }

    /// The n-th create call (1-based) is rejected as over quota.
    pub fn reject_create_call(self, n: usize) -> Self {
        self.state.lock().unwrap().reject_create_calls.insert(n);
        self
    }

    /// New servers stay in this status instead of becoming ACTIVE.
    pub fn boot_status(self, status: &str) -> Self {
        self.state.lock().unwrap().create_status = Some(status.to_string());
        self
    }

    /// Deletes are accepted but the server never goes away.
    pub fn sticky_deletes(self) -> Self {
        self.state.lock().unwrap().sticky_deletes = true;
        self
    }

    pub fn set_fail_list(&self, fail: bool) {
        self.state.lock().unwrap().fail_list = fail;
    }

    pub fn names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .servers
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }

    pub fn create_calls(&self) -> usize {
        self.state.lock().unwrap().create_calls
    }

    /// Names of servers a delete was requested for.
    pub fn delete_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().delete_calls.clone()
    }
}

#[async_trait]
impl CloudProvider for FakeCloud {
    async fn list_servers(&self) -> Result<Vec<ServerSummary>, CloudError> {
        let s = self.state.lock().unwrap();
        if s.fail_list {
            return Err(CloudError::Http {
                status: 503,
                body: "compute unavailable".into(),
            });
        }
        Ok(s.servers.clone())
    }

    async fn create_server(&self, spec: &ServerSpec) -> Result<String, CloudError> {
        let mut s = self.state.lock().unwrap();
        s.create_calls += 1;
        if s.reject_create_calls.contains(&s.create_calls) {
            return Err(CloudError::Forbidden("Quota exceeded for instances".into()));
        }
        s.next_id += 1;
        let id = format!("srv-{}", s.next_id);
        let status = s.create_status.clone().unwrap_or_else(|| "ACTIVE".into());
        s.servers.push(ServerSummary {
            id: id.clone(),
            name: spec.name.clone(),
            status,
            launched_at: Some(Utc::now()),
        });
        Ok(id)
    }

    async fn server_status(&self, id: &str) -> Result<Option<String>, CloudError> {
        let s = self.state.lock().unwrap();
        Ok(s.servers.iter().find(|v| v.id == id).map(|v| v.status.clone()))
    }

    async fn delete_server(&self, id: &str) -> Result<(), CloudError> {
        let mut s = self.state.lock().unwrap();
        if let Some(name) = s.servers.iter().find(|v| v.id == id).map(|v| v.name.clone()) {
            s.delete_calls.push(name);
        }
        if !s.sticky_deletes {
            s.servers.retain(|v| v.id != id);
        }
        Ok(())
    }
}

/// Feed returning whatever was last set, or an error when `failing`.
#[derive(Default)]
pub struct ScriptedMetrics {
    readings: Mutex<Vec<PlayerReading>>,
    failing: Mutex<bool>,
}

impl ScriptedMetrics {
    pub fn with(readings: &[(&str, u64)]) -> Self {
        let m = Self::default();
        m.set(readings);
        m
    }

    pub fn set(&self, readings: &[(&str, u64)]) {
        *self.readings.lock().unwrap() = readings
            .iter()
            .map(|(t, c)| PlayerReading::from_feed(*t, *c))
            .collect();
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }
}

#[async_trait]
impl MetricsSource for ScriptedMetrics {
    async fn fetch(&self) -> anyhow::Result<Vec<PlayerReading>> {
        if *self.failing.lock().unwrap() {
            anyhow::bail!("metrics feed returned 502 Bad Gateway");
        }
        Ok(self.readings.lock().unwrap().clone())
    }
}

/// Fleet settings with instant polling so tests never sleep for long.
pub fn fleet_settings() -> FleetSettings {
    FleetSettings {
        name_prefix: "GameVM".into(),
        manager_marker: "manager".into(),
        hourly_price: 1.5,
        min_minutes_to_next_hour: 10,
        template: ServerSpec {
            name: String::new(),
            image_id: "img".into(),
            flavor_id: "flavor".into(),
            network_id: "net".into(),
            keypair_name: "key".into(),
            security_group: "default".into(),
        },
        ready: PollPolicy {
            interval: Duration::from_millis(1),
            max_attempts: 3,
        },
        delete: PollPolicy {
            interval: Duration::from_millis(1),
            max_attempts: 3,
        },
    }
}

pub fn stored_game(name: &str, players: u64, vm_count: u32, at: DateTime<Utc>) -> GameState {
    let (hourly_cost, daily_cost) = GameState::costs(vm_count, 1.5);
    GameState {
        name: name.into(),
        developer: "Valve".into(),
        player_count: players,
        expected_players: None,
        deviation: None,
        vm_count,
        scaling_strategy: Strategy::Normal,
        vms: vec![],
        hourly_cost,
        daily_cost,
        budget_clamped_from: None,
        last_updated: at,
    }
}

/// Bind a loopback listener on an ephemeral port; returns it with its base URL.
pub async fn bind_local() -> (tokio::net::TcpListener, String) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    (listener, base)
}

/// Serve `app` in the background for the rest of the test.
pub fn serve(listener: tokio::net::TcpListener, app: axum::Router) {
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
}
