//! Threshold configuration and the settings sources it is read from.

use crate::error::{InsightsError, InsightsResult};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Threshold applied when none (or zero, or garbage) is configured.
pub const DEFAULT_QUERY_THRESHOLD: Duration = Duration::from_millis(1000);

/// Settings key holding the threshold in milliseconds.
pub const QUERY_THRESHOLD_KEY: &str = "insights:query_threshold";

/// A read-only key/value settings source.
pub trait SettingsSource {
    fn setting(&self, key: &str) -> Option<String>;
}

impl SettingsSource for BTreeMap<String, String> {
    fn setting(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Reads settings from environment variables.
///
/// `insights:query_threshold` maps to `PGORM_INSIGHTS_QUERY_THRESHOLD`:
/// the key is upper-cased, `:`, `.` and `-` become `_`, and the prefix is
/// prepended.
#[derive(Debug, Clone)]
pub struct EnvSettings {
    prefix: String,
}

impl Default for EnvSettings {
    fn default() -> Self {
        Self {
            prefix: "PGORM_".to_string(),
        }
    }
}

impl EnvSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different variable prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn var_name(&self, key: &str) -> String {
        format!(
            "{}{}",
            self.prefix,
            key.to_ascii_uppercase().replace([':', '.', '-'], "_")
        )
    }
}

impl SettingsSource for EnvSettings {
    fn setting(&self, key: &str) -> Option<String> {
        std::env::var(self.var_name(key)).ok()
    }
}

/// Settings read from a TOML document.
///
/// Top-level tables become key prefixes, so
///
/// ```toml
/// [insights]
/// query_threshold = 1500
/// ```
///
/// is visible as `insights:query_threshold`. Scalars are stringified, so
/// `"1500"` and `1500` read the same.
#[derive(Debug, Clone, Default)]
pub struct TomlSettings {
    values: BTreeMap<String, String>,
}

impl FromStr for TomlSettings {
    type Err = InsightsError;

    /// Parse settings from TOML text.
    fn from_str(raw: &str) -> InsightsResult<Self> {
        let table: toml::Table = toml::from_str(raw)
            .map_err(|e| InsightsError::config(format!("failed to parse settings: {e}")))?;

        let mut values = BTreeMap::new();
        for (section, value) in table {
            match value {
                toml::Value::Table(entries) => {
                    for (key, value) in entries {
                        if let Some(v) = scalar_to_string(&value) {
                            values.insert(format!("{section}:{key}"), v);
                        }
                    }
                }
                other => {
                    if let Some(v) = scalar_to_string(&other) {
                        values.insert(section, v);
                    }
                }
            }
        }
        Ok(Self { values })
    }
}

impl TomlSettings {
    /// Load settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> InsightsResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            InsightsError::config(format!(
                "failed to read settings file {}: {e}",
                path.display()
            ))
        })?;
        raw.parse()
    }
}

fn scalar_to_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        toml::Value::Datetime(d) => Some(d.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => None,
    }
}

impl SettingsSource for TomlSettings {
    fn setting(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Parse a threshold in whole milliseconds.
///
/// Absent or unparseable input counts as zero, and zero means
/// [`DEFAULT_QUERY_THRESHOLD`]. This never fails.
pub fn parse_threshold(raw: Option<&str>) -> Duration {
    let millis = raw.and_then(|s| s.trim().parse::<u64>().ok()).unwrap_or(0);
    effective_threshold(Duration::from_millis(millis))
}

/// Truncate a threshold to whole milliseconds.
///
/// Anything under one millisecond (including zero) selects the default.
pub fn effective_threshold(threshold: Duration) -> Duration {
    match u64::try_from(threshold.as_millis()).unwrap_or(u64::MAX) {
        0 => DEFAULT_QUERY_THRESHOLD,
        millis => Duration::from_millis(millis),
    }
}

/// Configuration for the query threshold monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsightsConfig {
    query_threshold: Duration,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            query_threshold: DEFAULT_QUERY_THRESHOLD,
        }
    }
}

impl InsightsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the threshold from a settings source.
    pub fn from_source<S: SettingsSource + ?Sized>(source: &S) -> Self {
        let raw = source.setting(QUERY_THRESHOLD_KEY);
        let query_threshold = parse_threshold(raw.as_deref());
        if raw.is_some() && query_threshold == DEFAULT_QUERY_THRESHOLD {
            tracing::debug!(
                target: "pgorm_insights",
                raw = raw.as_deref().unwrap_or_default(),
                "query threshold resolved to the default"
            );
        }
        Self { query_threshold }
    }

    /// Set the threshold. Less than one millisecond selects the default.
    pub fn with_query_threshold(mut self, threshold: Duration) -> Self {
        self.query_threshold = effective_threshold(threshold);
        self
    }

    pub fn query_threshold(&self) -> Duration {
        self.query_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_parsing_falls_back_to_default() {
        assert_eq!(parse_threshold(Some("1500")), Duration::from_millis(1500));
        assert_eq!(parse_threshold(Some(" 250 ")), Duration::from_millis(250));
        assert_eq!(parse_threshold(Some("0")), DEFAULT_QUERY_THRESHOLD);
        assert_eq!(parse_threshold(Some("abc")), DEFAULT_QUERY_THRESHOLD);
        assert_eq!(parse_threshold(Some("-5")), DEFAULT_QUERY_THRESHOLD);
        assert_eq!(parse_threshold(Some("")), DEFAULT_QUERY_THRESHOLD);
        assert_eq!(parse_threshold(None), DEFAULT_QUERY_THRESHOLD);
    }

    #[test]
    fn zero_threshold_selects_default() {
        let config = InsightsConfig::new().with_query_threshold(Duration::ZERO);
        assert_eq!(config.query_threshold(), Duration::from_millis(1000));
    }

    #[test]
    fn sub_millisecond_threshold_selects_default() {
        assert_eq!(
            effective_threshold(Duration::from_micros(500)),
            DEFAULT_QUERY_THRESHOLD
        );
        assert_eq!(
            effective_threshold(Duration::from_micros(2500)),
            Duration::from_millis(2)
        );
        let config = InsightsConfig::new().with_query_threshold(Duration::from_nanos(1));
        assert_eq!(config.query_threshold(), DEFAULT_QUERY_THRESHOLD);
    }

    #[test]
    fn config_reads_from_map_source() {
        let mut map = BTreeMap::new();
        map.insert(QUERY_THRESHOLD_KEY.to_string(), "42".to_string());
        assert_eq!(
            InsightsConfig::from_source(&map).query_threshold(),
            Duration::from_millis(42)
        );
        assert_eq!(
            InsightsConfig::from_source(&BTreeMap::<String, String>::new()).query_threshold(),
            DEFAULT_QUERY_THRESHOLD
        );
    }

    #[test]
    fn toml_settings_accept_integer_and_string() {
        let int = TomlSettings::from_str("[insights]\nquery_threshold = 1500\n").unwrap();
        assert_eq!(int.setting(QUERY_THRESHOLD_KEY).as_deref(), Some("1500"));

        let string = TomlSettings::from_str("[insights]\nquery_threshold = \"300\"\n").unwrap();
        assert_eq!(
            InsightsConfig::from_source(&string).query_threshold(),
            Duration::from_millis(300)
        );
    }

    #[test]
    fn toml_settings_reject_malformed_documents() {
        let err = TomlSettings::from_str("[insights\n").unwrap_err();
        assert!(matches!(err, InsightsError::Config(_)));
    }

    #[test]
    fn env_var_name_mapping() {
        assert_eq!(
            EnvSettings::new().var_name(QUERY_THRESHOLD_KEY),
            "PGORM_INSIGHTS_QUERY_THRESHOLD"
        );
        assert_eq!(
            EnvSettings::with_prefix("APP_").var_name("insights:query-threshold"),
            "APP_INSIGHTS_QUERY_THRESHOLD"
        );
    }
}
