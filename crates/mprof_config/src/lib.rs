//! Profiler configuration
//!
//! Settings shared by the registry, the interceptors it creates and the
//! reports it renders. Values come from defaults, environment variables and
//! (with the `toml-config` feature) TOML files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const ENV_ENABLED: &str = "MPROF_ENABLED";
pub const ENV_RECORD_PANICS: &str = "MPROF_RECORD_PANICS";
pub const ENV_SORT_BY: &str = "MPROF_SORT_BY";
pub const ENV_ORDER: &str = "MPROF_ORDER";
pub const ENV_PRECISION: &str = "MPROF_PRECISION";

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown sort key `{0}` (expected method, min, max, average, total or calls)")]
    UnknownSortKey(String),
    #[error("unknown sort order `{0}` (expected ascending or descending)")]
    UnknownSortOrder(String),
}

/// Complete profiler configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProfilerConfig {
    /// Start interceptors as soon as they are observed
    pub enabled: bool,

    /// Record the elapsed time of calls that panic before resuming the panic
    pub record_panics: bool,

    /// Report rendering options
    pub report: ReportConfig,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            record_panics: true,
            report: ReportConfig::default(),
        }
    }
}

impl ProfilerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// Unparsable values fall back to the default for that field.
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup(ENV_ENABLED) {
            config.enabled = parse_flag(&val).unwrap_or(true);
        }

        if let Some(val) = lookup(ENV_RECORD_PANICS) {
            config.record_panics = parse_flag(&val).unwrap_or(true);
        }

        config.report = ReportConfig::from_vars(&lookup);
        config
    }

    /// Load configuration from TOML file
    #[cfg(feature = "toml-config")]
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read profiler config {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("invalid profiler config {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from TOML file (stub when toml feature is disabled)
    #[cfg(not(feature = "toml-config"))]
    pub fn from_file(_path: &Path) -> anyhow::Result<Self> {
        anyhow::bail!("TOML support not enabled. Enable the 'toml-config' feature.")
    }

    /// Save configuration to TOML file
    #[cfg(feature = "toml-config")]
    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Save configuration to TOML file (stub when toml feature is disabled)
    #[cfg(not(feature = "toml-config"))]
    pub fn save_to_file(&self, _path: &Path) -> anyhow::Result<()> {
        anyhow::bail!("TOML support not enabled. Enable the 'toml-config' feature.")
    }

    /// Merge with environment variables (env vars take precedence)
    pub fn merge_with_env(self) -> Self {
        self.merge_with_vars(|key| std::env::var(key).ok())
    }

    pub fn merge_with_vars<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let overrides = Self::from_vars(&lookup);

        if lookup(ENV_ENABLED).is_some() {
            self.enabled = overrides.enabled;
        }
        if lookup(ENV_RECORD_PANICS).is_some() {
            self.record_panics = overrides.record_panics;
        }
        if lookup(ENV_SORT_BY).is_some() {
            self.report.sort_by = overrides.report.sort_by;
        }
        if lookup(ENV_ORDER).is_some() {
            self.report.order = overrides.report.order;
        }
        if lookup(ENV_PRECISION).is_some() {
            self.report.precision = overrides.report.precision;
        }

        self
    }
}

/// Parse a boolean environment value (`true`/`false`, `1`/`0`, `yes`/`no`, `on`/`off`).
fn parse_flag(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Report rendering configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReportConfig {
    /// Column the rows are ordered by
    pub sort_by: SortKey,

    /// Direction of the ordering
    pub order: SortOrder,

    /// Decimal places used for millisecond columns
    pub precision: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            sort_by: SortKey::Average,
            order: SortOrder::Descending,
            precision: 3,
        }
    }
}

impl ReportConfig {
    fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup(ENV_SORT_BY) {
            config.sort_by = val.parse().unwrap_or_default();
        }

        if let Some(val) = lookup(ENV_ORDER) {
            config.order = val.parse().unwrap_or_default();
        }

        if let Some(val) = lookup(ENV_PRECISION) {
            config.precision = val.parse().unwrap_or(3);
        }

        config
    }
}

/// Report column used for ordering
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Method,
    Min,
    Max,
    #[default]
    Average,
    Total,
    Calls,
}

impl SortKey {
    pub const ALL: [Self; 6] = [
        Self::Method,
        Self::Min,
        Self::Max,
        Self::Average,
        Self::Total,
        Self::Calls,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Method => "method",
            Self::Min => "min",
            Self::Max => "max",
            Self::Average => "average",
            Self::Total => "total",
            Self::Calls => "calls",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "method" => Ok(Self::Method),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "average" | "avg" => Ok(Self::Average),
            "total" | "total_time" => Ok(Self::Total),
            "calls" | "total_calls" => Ok(Self::Calls),
            other => Err(ConfigError::UnknownSortKey(other.to_string())),
        }
    }
}

/// Direction of the report ordering
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => f.write_str("ascending"),
            Self::Descending => f.write_str("descending"),
        }
    }
}

impl FromStr for SortOrder {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Ascending),
            "desc" | "descending" => Ok(Self::Descending),
            other => Err(ConfigError::UnknownSortOrder(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ProfilerConfig::default();
        assert!(config.enabled);
        assert!(config.record_panics);
        assert_eq!(config.report.sort_by, SortKey::Average);
        assert_eq!(config.report.order, SortOrder::Descending);
        assert_eq!(config.report.precision, 3);
    }

    #[test]
    fn test_from_vars() {
        let config = ProfilerConfig::from_vars(lookup(&[
            (ENV_ENABLED, "false"),
            (ENV_SORT_BY, "calls"),
            (ENV_ORDER, "asc"),
            (ENV_PRECISION, "5"),
        ]));

        assert!(!config.enabled);
        assert!(config.record_panics);
        assert_eq!(config.report.sort_by, SortKey::Calls);
        assert_eq!(config.report.order, SortOrder::Ascending);
        assert_eq!(config.report.precision, 5);
    }

    #[test]
    fn test_numeric_and_word_flags() {
        let config = ProfilerConfig::from_vars(lookup(&[
            (ENV_ENABLED, "0"),
            (ENV_RECORD_PANICS, "no"),
        ]));
        assert!(!config.enabled);
        assert!(!config.record_panics);

        let config = ProfilerConfig::from_vars(lookup(&[
            (ENV_ENABLED, " ON "),
            (ENV_RECORD_PANICS, "1"),
        ]));
        assert!(config.enabled);
        assert!(config.record_panics);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = ProfilerConfig::from_vars(lookup(&[
            (ENV_RECORD_PANICS, "maybe"),
            (ENV_SORT_BY, "latency"),
            (ENV_PRECISION, "-1"),
        ]));

        assert!(config.record_panics);
        assert_eq!(config.report.sort_by, SortKey::Average);
        assert_eq!(config.report.precision, 3);
    }

    #[test]
    fn test_merge_only_overrides_present_vars() {
        let base = ProfilerConfig {
            enabled: false,
            record_panics: false,
            report: ReportConfig {
                sort_by: SortKey::Total,
                order: SortOrder::Ascending,
                precision: 1,
            },
        };

        let merged = base.merge_with_vars(lookup(&[(ENV_ORDER, "descending")]));

        assert!(!merged.enabled);
        assert!(!merged.record_panics);
        assert_eq!(merged.report.sort_by, SortKey::Total);
        assert_eq!(merged.report.order, SortOrder::Descending);
        assert_eq!(merged.report.precision, 1);
    }

    #[test]
    fn test_sort_key_parsing() {
        for key in SortKey::ALL {
            assert_eq!(key.as_str().parse::<SortKey>(), Ok(key));
        }
        assert_eq!("total_time".parse::<SortKey>(), Ok(SortKey::Total));
        assert_eq!(
            "p99".parse::<SortKey>(),
            Err(ConfigError::UnknownSortKey("p99".to_string()))
        );
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mprof.toml");

        let mut config = ProfilerConfig::default();
        config.report.sort_by = SortKey::Max;
        config.save_to_file(&path).unwrap();

        let loaded = ProfilerConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_partial_toml_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mprof.toml");
        std::fs::write(&path, "enabled = false\n\n[report]\norder = \"ascending\"\n").unwrap();

        let loaded = ProfilerConfig::from_file(&path).unwrap();
        assert!(!loaded.enabled);
        assert!(loaded.record_panics);
        assert_eq!(loaded.report.order, SortOrder::Ascending);
        assert_eq!(loaded.report.sort_by, SortKey::Average);
    }

    #[cfg(not(feature = "toml-config"))]
    #[test]
    fn test_from_file_requires_feature() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mprof.toml");
        assert!(ProfilerConfig::from_file(&path).is_err());
    }
}
