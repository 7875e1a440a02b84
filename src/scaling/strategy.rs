// Strategy kinds; resolved from config names once at load time

use std::fmt;

use serde::{Deserialize, Serialize};

/// Scaling strategy for a title; serializes to lowercase JSON (e.g. "trend").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Aggressive,
    Passive,
    Trend,
    Predictive,
    /// Also what any unrecognised stored name reads as.
    #[default]
    #[serde(other)]
    Normal,
}

impl Strategy {
    /// Parse a config name; `None` for unknown names.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "normal" => Some(Strategy::Normal),
            "aggressive" => Some(Strategy::Aggressive),
            "passive" => Some(Strategy::Passive),
            "trend" => Some(Strategy::Trend),
            "predictive" => Some(Strategy::Predictive),
            _ => None,
        }
    }

    /// Unknown names degrade to `Normal` with a warning; they never fail the load.
    pub fn from_config_name(name: &str, scope: &str) -> Self {
        Self::parse(name).unwrap_or_else(|| {
            tracing::warn!(scope, strategy = name, "unknown scaling strategy; using normal");
            Strategy::Normal
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Normal => "normal",
            Strategy::Aggressive => "aggressive",
            Strategy::Passive => "passive",
            Strategy::Trend => "trend",
            Strategy::Predictive => "predictive",
        }
    }

    /// Remaining-capacity percent on the last VM at or below which a threshold
    /// strategy adds one more VM. `None` for non-threshold strategies.
    pub fn scale_up_percent(self) -> Option<f64> {
        match self {
            Strategy::Aggressive => Some(10.0),
            Strategy::Normal => Some(5.0),
            Strategy::Passive => Some(2.0),
            Strategy::Trend | Strategy::Predictive => None,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Strategy::parse(" Trend "), Some(Strategy::Trend));
        assert_eq!(Strategy::parse("PREDICTIVE"), Some(Strategy::Predictive));
        assert_eq!(Strategy::parse("bogus"), None);
    }

    #[test]
    fn unknown_config_name_degrades_to_normal() {
        assert_eq!(Strategy::from_config_name("turbo", "test"), Strategy::Normal);
    }

    #[test]
    fn unknown_json_value_reads_as_normal() {
        let s: Strategy = serde_json::from_str("\"turbo\"").unwrap();
        assert_eq!(s, Strategy::Normal);
        assert_eq!(serde_json::to_string(&Strategy::Aggressive).unwrap(), "\"aggressive\"");
    }

    #[test]
    fn threshold_percents_per_variant() {
        assert_eq!(Strategy::Aggressive.scale_up_percent(), Some(10.0));
        assert_eq!(Strategy::Normal.scale_up_percent(), Some(5.0));
        assert_eq!(Strategy::Passive.scale_up_percent(), Some(2.0));
        assert_eq!(Strategy::Trend.scale_up_percent(), None);
    }
}
