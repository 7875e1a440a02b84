// Append-only trace of predictive decisions, one line per distinct outcome per time bucket

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{Local, Weekday};
use tokio::io::AsyncWriteExt;
use tracing::warn;

use super::pattern::{TimeBucket, day_name};

/// Inputs and outcome of one predictive computation.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTrace {
    pub title: String,
    pub bucket: TimeBucket,
    pub current_players: u64,
    pub expected_now: f64,
    pub deviation: f64,
    pub expected_next: f64,
    pub corrected_future: f64,
    pub vm_count: u32,
}

impl DecisionTrace {
    fn format_line(&self, timestamp: &str) -> String {
        format!(
            "{} | {} | {} {} | Current: {} | Expected Now: {:.0} | Deviation: {:+.1}% | Next Expected: {:.0} | Corrected Future: {:.0} | Calculated VMs: {}\n",
            timestamp,
            self.title,
            day_name(self.bucket.day),
            self.bucket.clock(),
            self.current_players,
            self.expected_now,
            self.deviation * 100.0,
            self.expected_next,
            self.corrected_future,
            self.vm_count,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DecisionKey {
    title: String,
    day: Weekday,
    hour: u8,
    minute: u8,
}

/// (players, rounded forecast, vm count)
type Outcome = (u64, i64, u32);

/// Owns the dedup cache; a recomputation with an identical outcome for the
/// same title and bucket is not written again.
#[derive(Debug, Default)]
pub struct ChangeLog {
    path: Option<PathBuf>,
    last_logged: HashMap<DecisionKey, Outcome>,
}

impl ChangeLog {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            last_logged: HashMap::new(),
        }
    }

    /// Dedup only; nothing is written.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Returns true when the outcome is new for this title and bucket.
    /// Write failures are logged, never returned.
    pub async fn record(&mut self, trace: &DecisionTrace) -> bool {
        let key = DecisionKey {
            title: trace.title.clone(),
            day: trace.bucket.day,
            hour: trace.bucket.hour,
            minute: trace.bucket.minute,
        };
        let outcome = (
            trace.current_players,
            trace.corrected_future.round() as i64,
            trace.vm_count,
        );
        if self.last_logged.get(&key) == Some(&outcome) {
            return false;
        }
        self.last_logged.insert(key, outcome);

        if let Some(path) = &self.path {
            let line = trace.format_line(&Local::now().to_rfc3339());
            if let Err(e) = append_line(path, &line).await {
                warn!(path = %path.display(), error = %e, "change log write failed");
            }
        }
        true
    }
}

async fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut f = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    f.write_all(line.as_bytes()).await?;
    f.flush().await
}
