use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;

use crate::scaling::Strategy;

/// Fully resolved configuration. Scaling tables are merged and strategy names
/// parsed once here; nothing downstream looks at raw config values.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub metrics: MetricsConfig,
    pub fleet: FleetConfig,
    pub cloud: CloudConfig,
    pub storage: StorageConfig,
    pub exporter: ExporterConfig,
    pub scaling: ScalingPolicy,
}

#[derive(Debug, Deserialize)]
struct RawAppConfig {
    metrics: MetricsConfig,
    fleet: FleetConfig,
    cloud: CloudConfig,
    #[serde(default)]
    storage: StorageConfig,
    #[serde(default)]
    exporter: ExporterConfig,
    #[serde(default)]
    scaling: RawScaling,
}

#[derive(Debug, Default, Deserialize)]
struct RawScaling {
    #[serde(default)]
    default: ScalingOverrides,
    #[serde(default)]
    titles: HashMap<String, ScalingOverrides>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub url: String,
    #[serde(default = "default_filter_field")]
    pub filter_field: String,
    /// Publisher (or other label value) whose titles are tracked; also stored as each title's developer.
    pub filter_value: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_filter_field() -> String {
    "publisher".into()
}

fn default_poll_interval_secs() -> u64 {
    120
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct FleetConfig {
    /// The single title whose VMs are actually reconciled.
    pub managed_title: String,
    #[serde(default = "default_players_per_vm")]
    pub players_per_vm: u64,
    #[serde(default = "default_hourly_price")]
    pub hourly_price: f64,
    /// A VM is eligible to stop when at most this many minutes remain in its paid hour.
    #[serde(default = "default_min_minutes_to_next_hour")]
    pub min_minutes_to_next_hour: u32,
    /// VM name prefix; derived from the managed title when unset.
    #[serde(default)]
    pub name_prefix: Option<String>,
    #[serde(default = "default_manager_marker")]
    pub manager_marker: String,
    #[serde(default = "default_poll_secs")]
    pub ready_poll_interval_secs: u64,
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
    #[serde(default = "default_poll_secs")]
    pub delete_poll_interval_secs: u64,
    #[serde(default = "default_delete_max_attempts")]
    pub delete_max_attempts: u32,
}

fn default_players_per_vm() -> u64 {
    500
}

fn default_hourly_price() -> f64 {
    1.5
}

fn default_min_minutes_to_next_hour() -> u32 {
    10
}

fn default_manager_marker() -> String {
    "manager".into()
}

fn default_poll_secs() -> u64 {
    5
}

fn default_ready_timeout_secs() -> u64 {
    300
}

fn default_delete_max_attempts() -> u32 {
    60
}

impl FleetConfig {
    /// Configured prefix, else the managed title reduced to alphanumerics, else `GameVM`.
    pub fn vm_name_prefix(&self) -> String {
        if let Some(prefix) = self.name_prefix.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            return prefix.to_string();
        }
        let slug: String = self
            .managed_title
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        if slug.is_empty() { "GameVM".into() } else { slug }
    }
}

#[derive(Clone, Deserialize)]
pub struct CloudConfig {
    pub auth_url: String,
    pub application_credential_id: String,
    #[serde(default)]
    pub application_credential_secret: String,
    #[serde(default)]
    pub region_name: Option<String>,
    #[serde(default = "default_interface")]
    pub interface: String,
    pub image_id: String,
    pub flavor_id: String,
    pub network_id: String,
    pub keypair_name: String,
    pub security_group: String,
}

fn default_interface() -> String {
    "public".into()
}

impl fmt::Debug for CloudConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudConfig")
            .field("auth_url", &self.auth_url)
            .field("application_credential_id", &self.application_credential_id)
            .field("application_credential_secret", &"<redacted>")
            .field("region_name", &self.region_name)
            .field("interface", &self.interface)
            .field("image_id", &self.image_id)
            .field("flavor_id", &self.flavor_id)
            .field("network_id", &self.network_id)
            .field("keypair_name", &self.keypair_name)
            .field("security_group", &self.security_group)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_games_path")]
    pub games_path: String,
    #[serde(default = "default_pattern_path")]
    pub pattern_path: String,
    #[serde(default = "default_change_log_path")]
    pub change_log_path: String,
}

fn default_games_path() -> String {
    "data/games.json".into()
}

fn default_pattern_path() -> String {
    "data/player_pattern.json".into()
}

fn default_change_log_path() -> String {
    "logs/vm_changes.log".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            games_path: default_games_path(),
            pattern_path: default_pattern_path(),
            change_log_path: default_change_log_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExporterConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_exporter_host")]
    pub host: String,
    #[serde(default = "default_exporter_port")]
    pub port: u16,
}

fn default_true() -> bool {
    true
}

fn default_exporter_host() -> String {
    "0.0.0.0".into()
}

fn default_exporter_port() -> u16 {
    5000
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_exporter_host(),
            port: default_exporter_port(),
        }
    }
}

/// One `[scaling.*]` table as written; every key optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScalingOverrides {
    pub strategy: Option<String>,
    pub buffer: Option<u64>,
    pub time_offset_hours: Option<i32>,
    pub lookahead_intervals: Option<u32>,
    pub respect_current_load: Option<bool>,
    pub threshold_percent: Option<f64>,
    pub max_hourly_budget: Option<f64>,
}

/// Per-title scaling options after merging.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingConfig {
    pub strategy: Strategy,
    /// Players of headroom.
    pub buffer: u64,
    pub time_offset_hours: i32,
    pub lookahead_intervals: u32,
    pub respect_current_load: bool,
    /// Trend only: safe-fill fraction of a VM, in (0, 1].
    pub threshold_percent: f64,
    pub max_hourly_budget: Option<f64>,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Normal,
            buffer: 0,
            time_offset_hours: 0,
            lookahead_intervals: 3,
            respect_current_load: true,
            threshold_percent: 0.8,
            max_hourly_budget: None,
        }
    }
}

impl ScalingConfig {
    /// Apply `overrides` on top of `self`. Out-of-range values are logged and
    /// the inherited value is kept, so one bad table never fails the load.
    pub fn merged(&self, overrides: &ScalingOverrides, scope: &str) -> Self {
        let mut out = self.clone();
        if let Some(name) = &overrides.strategy {
            out.strategy = Strategy::from_config_name(name, scope);
        }
        if let Some(buffer) = overrides.buffer {
            out.buffer = buffer;
        }
        if let Some(offset) = overrides.time_offset_hours {
            out.time_offset_hours = offset;
        }
        if let Some(lookahead) = overrides.lookahead_intervals {
            out.lookahead_intervals = lookahead;
        }
        if let Some(respect) = overrides.respect_current_load {
            out.respect_current_load = respect;
        }
        match overrides.threshold_percent {
            Some(p) if p > 0.0 && p <= 1.0 => out.threshold_percent = p,
            Some(p) => tracing::warn!(
                scope,
                threshold_percent = p,
                kept = out.threshold_percent,
                "threshold_percent must be in (0, 1]; ignoring"
            ),
            None => {}
        }
        match overrides.max_hourly_budget {
            Some(b) if b.is_finite() && b > 0.0 => out.max_hourly_budget = Some(b),
            Some(b) => tracing::warn!(
                scope,
                max_hourly_budget = b,
                "max_hourly_budget must be > 0; ignoring"
            ),
            None => {}
        }
        out
    }
}

/// Default plus per-title scaling options, merged at load time.
#[derive(Debug, Clone, Default)]
pub struct ScalingPolicy {
    default: ScalingConfig,
    titles: HashMap<String, ScalingConfig>,
}

impl ScalingPolicy {
    pub fn new(default: ScalingConfig, titles: HashMap<String, ScalingConfig>) -> Self {
        Self { default, titles }
    }

    fn from_overrides(raw: &RawScaling) -> Self {
        let default = ScalingConfig::default().merged(&raw.default, "default");
        let titles = raw
            .titles
            .iter()
            .map(|(title, o)| (title.clone(), default.merged(o, title)))
            .collect();
        Self { default, titles }
    }

    pub fn resolve(&self, title: &str) -> &ScalingConfig {
        self.titles.get(title).unwrap_or(&self.default)
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("reading {}: {}", path, e))?;
        let mut config = Self::load_from_str(&s)?;
        if let Ok(secret) = std::env::var("OS_APPLICATION_CREDENTIAL_SECRET") {
            config.cloud.application_credential_secret = secret;
        }
        anyhow::ensure!(
            !config.cloud.application_credential_secret.is_empty(),
            "cloud.application_credential_secret must be set (or OS_APPLICATION_CREDENTIAL_SECRET)"
        );
        Ok(config)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let raw: RawAppConfig = toml::from_str(s)?;
        let config = AppConfig {
            scaling: ScalingPolicy::from_overrides(&raw.scaling),
            metrics: raw.metrics,
            fleet: raw.fleet,
            cloud: raw.cloud,
            storage: raw.storage,
            exporter: raw.exporter,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.metrics.url.is_empty(), "metrics.url must be non-empty");
        anyhow::ensure!(
            !self.metrics.filter_field.is_empty() && !self.metrics.filter_value.is_empty(),
            "metrics.filter_field and metrics.filter_value must be non-empty"
        );
        anyhow::ensure!(
            self.metrics.poll_interval_secs > 0,
            "metrics.poll_interval_secs must be > 0, got {}",
            self.metrics.poll_interval_secs
        );
        anyhow::ensure!(
            self.metrics.request_timeout_secs > 0,
            "metrics.request_timeout_secs must be > 0, got {}",
            self.metrics.request_timeout_secs
        );
        anyhow::ensure!(
            !self.fleet.managed_title.trim().is_empty(),
            "fleet.managed_title must be non-empty"
        );
        anyhow::ensure!(
            self.fleet.players_per_vm > 0,
            "fleet.players_per_vm must be > 0, got {}",
            self.fleet.players_per_vm
        );
        anyhow::ensure!(
            self.fleet.hourly_price.is_finite() && self.fleet.hourly_price > 0.0,
            "fleet.hourly_price must be > 0, got {}",
            self.fleet.hourly_price
        );
        anyhow::ensure!(
            self.fleet.min_minutes_to_next_hour <= 60,
            "fleet.min_minutes_to_next_hour must be in 0..=60, got {}",
            self.fleet.min_minutes_to_next_hour
        );
        anyhow::ensure!(
            self.fleet.ready_poll_interval_secs > 0 && self.fleet.ready_timeout_secs > 0,
            "fleet.ready_poll_interval_secs and fleet.ready_timeout_secs must be > 0"
        );
        anyhow::ensure!(
            self.fleet.delete_poll_interval_secs > 0 && self.fleet.delete_max_attempts > 0,
            "fleet.delete_poll_interval_secs and fleet.delete_max_attempts must be > 0"
        );
        anyhow::ensure!(!self.cloud.auth_url.is_empty(), "cloud.auth_url must be non-empty");
        anyhow::ensure!(
            !self.storage.games_path.is_empty()
                && !self.storage.pattern_path.is_empty()
                && !self.storage.change_log_path.is_empty(),
            "storage paths must be non-empty"
        );
        anyhow::ensure!(
            self.exporter.port > 0,
            "exporter.port must be between 1 and 65535, got {}",
            self.exporter.port
        );
        Ok(())
    }
}
