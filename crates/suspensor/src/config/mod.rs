use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::reveal::RevealOrder;
use crate::transition::TransitionConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// `None` keeps every entry for the life of the cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<usize>,
    pub case_insensitive_keys: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_entries: None, case_insensitive_keys: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RevealConfig {
    pub default_order: RevealOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub transition: TransitionConfig,
    pub cache: CacheConfig,
    pub reveal: RevealConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from defaults overridden by `lookup`, which maps
    /// `SUSPENSOR_*` variable names to values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(timeout_str) = lookup("SUSPENSOR_TIMEOUT_MS") {
            config.transition.timeout_ms = parse_number("SUSPENSOR_TIMEOUT_MS", &timeout_str)?;
        }

        if let Some(delay_str) = lookup("SUSPENSOR_BUSY_DELAY_MS") {
            config.transition.busy_delay_ms = parse_number("SUSPENSOR_BUSY_DELAY_MS", &delay_str)?;
        }

        if let Some(min_str) = lookup("SUSPENSOR_BUSY_MIN_DURATION_MS") {
            config.transition.busy_min_duration_ms =
                parse_number("SUSPENSOR_BUSY_MIN_DURATION_MS", &min_str)?;
        }

        if let Some(max_entries_str) = lookup("SUSPENSOR_CACHE_MAX_ENTRIES") {
            let max_entries: usize =
                parse_number("SUSPENSOR_CACHE_MAX_ENTRIES", &max_entries_str)?;
            config.cache.max_entries = (max_entries > 0).then_some(max_entries);
        }

        if let Some(case_str) = lookup("SUSPENSOR_CACHE_CASE_INSENSITIVE") {
            config.cache.case_insensitive_keys = parse_flag(&case_str);
        }

        if let Some(order_str) = lookup("SUSPENSOR_REVEAL_ORDER") {
            config.reveal.default_order = order_str.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::FileRead)?;

        let config: Self = toml::from_str(&contents).map_err(ConfigError::TomlParse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self).map_err(ConfigError::TomlSerialize)?;

        std::fs::write(path, contents).map_err(ConfigError::FileWrite)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.transition.validate()
    }
}

fn parse_number<N: std::str::FromStr>(name: &str, value: &str) -> Result<N, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidConfig(name.to_string()))
}

fn parse_flag(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    value == "true" || value == "1" || value == "yes"
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid config value for {0}")]
    InvalidConfig(String),

    #[error("Invalid reveal order: {0}")]
    InvalidRevealOrder(String),

    #[error("Invalid transition thresholds: {0}")]
    InvalidTransition(String),

    #[error("Failed to read config file: {0}")]
    FileRead(std::io::Error),

    #[error("Failed to write config file: {0}")]
    FileWrite(std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    TomlSerialize(toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use rustc_hash::FxHashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: FxHashMap<String, String> =
            pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.transition.timeout_ms, 4000);
        assert_eq!(config.transition.busy_delay_ms, 300);
        assert_eq!(config.transition.busy_min_duration_ms, 700);
        assert_eq!(config.cache.max_entries, None);
        assert!(config.cache.case_insensitive_keys);
        assert_eq!(config.reveal.default_order, RevealOrder::Forwards);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("SUSPENSOR_TIMEOUT_MS", "5000"),
            ("SUSPENSOR_BUSY_MIN_DURATION_MS", "500"),
            ("SUSPENSOR_CACHE_MAX_ENTRIES", "64"),
            ("SUSPENSOR_CACHE_CASE_INSENSITIVE", "no"),
            ("SUSPENSOR_REVEAL_ORDER", "Together"),
        ]))
        .unwrap();

        assert_eq!(config.transition.timeout_ms, 5000);
        assert_eq!(config.transition.busy_delay_ms, 300);
        assert_eq!(config.transition.busy_min_duration_ms, 500);
        assert_eq!(config.cache.max_entries, Some(64));
        assert!(!config.cache.case_insensitive_keys);
        assert_eq!(config.reveal.default_order, RevealOrder::Together);
    }

    #[test]
    fn test_zero_max_entries_means_unbounded() {
        let config =
            Config::from_lookup(lookup_from(&[("SUSPENSOR_CACHE_MAX_ENTRIES", "0")])).unwrap();
        assert_eq!(config.cache.max_entries, None);
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        let err = Config::from_lookup(lookup_from(&[("SUSPENSOR_BUSY_DELAY_MS", "soon")]))
            .unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidConfig(name) if name == "SUSPENSOR_BUSY_DELAY_MS")
        );

        let err = Config::from_lookup(lookup_from(&[("SUSPENSOR_REVEAL_ORDER", "sideways")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRevealOrder(_)));

        let err = Config::from_lookup(lookup_from(&[
            ("SUSPENSOR_TIMEOUT_MS", "200"),
            ("SUSPENSOR_BUSY_DELAY_MS", "300"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTransition(_)));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suspensor.toml");

        let mut config = Config::default();
        config.transition.busy_min_duration_ms = 500;
        config.cache.max_entries = Some(32);
        config.reveal.default_order = RevealOrder::Backwards;

        config.save_to_file(&path).unwrap();
        let loaded = Config::from_file(&path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[transition]\ntimeout_ms = 5000\n").unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.transition.timeout_ms, 5000);
        assert_eq!(loaded.transition.busy_delay_ms, 300);
        assert_eq!(loaded.cache, CacheConfig::default());
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileRead(_)));
    }
}
