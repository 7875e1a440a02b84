// Historical player-count pattern: (weekday, hour, 5-minute bucket) -> average.
// Loaded once at startup; exact-key lookup only, no interpolation.

use std::collections::HashMap;
use std::path::Path;

use chrono::{Datelike, Timelike, Weekday};
use serde::Deserialize;
use tracing::{debug, info, warn};

const BUCKET_MINUTES: u8 = 5;

/// A 5-minute slot in the weekly pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeBucket {
    pub day: Weekday,
    pub hour: u8,
    pub minute: u8,
}

impl TimeBucket {
    /// Minute is floored to its 5-minute bucket, hour wrapped to 0..24.
    pub fn new(day: Weekday, hour: u8, minute: u8) -> Self {
        Self {
            day,
            hour: hour % 24,
            minute: (minute % 60) / BUCKET_MINUTES * BUCKET_MINUTES,
        }
    }

    pub fn at<T: Datelike + Timelike>(t: &T) -> Self {
        Self::new(t.weekday(), t.hour() as u8, t.minute() as u8)
    }

    /// Shift the hour, wrapping mod 24. The weekday is left as is.
    pub fn shift_hours(self, hours: i32) -> Self {
        let hour = ((self.hour as i32 + hours.rem_euclid(24)) % 24) as u8;
        Self { hour, ..self }
    }

    /// Advance by whole minutes; overflow carries into the hour, which wraps mod 24.
    pub fn advance_minutes(self, minutes: u32) -> Self {
        let total = self.minute as u32 + minutes % (24 * 60);
        let hour = ((self.hour as u32 + total / 60) % 24) as u8;
        Self {
            hour,
            minute: (total % 60) as u8,
            ..self
        }
    }

    /// `HH:MM`
    pub fn clock(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }
}

/// Lowercase English weekday name, as used in the pattern file.
pub fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// Hour/minute are stored as zero-padded strings ("06") but plain numbers are accepted too.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Slot {
    Number(u8),
    Text(String),
}

impl Slot {
    fn value(&self) -> Option<u8> {
        match self {
            Slot::Number(n) => Some(*n),
            Slot::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PatternRow {
    day: String,
    hour: Slot,
    minute: Slot,
    #[serde(alias = "avg_player_count")]
    avg_playercount: f64,
}

impl PatternRow {
    fn key(&self) -> Option<TimeBucket> {
        let day: Weekday = self.day.trim().parse().ok()?;
        let hour = self.hour.value().filter(|h| *h < 24)?;
        let minute = self
            .minute
            .value()
            .filter(|m| *m < 60 && m % BUCKET_MINUTES == 0)?;
        Some(TimeBucket { day, hour, minute })
    }
}

#[derive(Debug, Clone, Default)]
pub struct PatternStore {
    entries: HashMap<TimeBucket, f64>,
}

impl PatternStore {
    /// Load from a JSON array file. A missing or unreadable file yields an empty
    /// store; predictive titles then make no changes.
    pub fn load(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "player pattern file not found; predictive scaling has no data");
                return Self::default();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "player pattern file unreadable");
                return Self::default();
            }
        };
        match Self::from_json(&text) {
            Ok(store) => {
                info!(path = %path.display(), buckets = store.len(), "player pattern loaded");
                store
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "player pattern file is not valid JSON");
                Self::default()
            }
        }
    }

    /// Rows with an unknown day or an off-bucket hour/minute are skipped.
    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        let rows: Vec<PatternRow> = serde_json::from_str(s)?;
        let mut entries = HashMap::with_capacity(rows.len());
        let mut skipped = 0usize;
        for row in &rows {
            match row.key() {
                Some(key) => {
                    entries.insert(key, row.avg_playercount);
                }
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            debug!(skipped, "pattern rows skipped");
        }
        Ok(Self { entries })
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (TimeBucket, f64)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn expected(&self, bucket: TimeBucket) -> Option<f64> {
        self.entries.get(&bucket).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
