//! Runtime configuration
//!
//! Intervals are stored as whole seconds so files stay human-editable;
//! accessors hand out `Duration`s.

use crate::errors::{Result, TrefoilError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrefoilConfig {
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
}

/// Recovery timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Seconds between background status syncs while foregrounded.
    pub sync_interval_secs: u64,
    /// Delay & Notify waiting period requested at initiation.
    pub delay_period_secs: u64,
    /// Lower bound on how long auth key rotation appears to take.
    pub min_completion_duration_ms: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            sync_interval_secs: 60,
            delay_period_secs: 7 * SECS_PER_DAY,
            min_completion_duration_ms: 2_000,
        }
    }
}

impl RecoveryConfig {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn delay_period(&self) -> Duration {
        Duration::from_secs(self.delay_period_secs)
    }

    pub fn min_completion_duration(&self) -> Duration {
        Duration::from_millis(self.min_completion_duration_ms)
    }
}

/// Sweep availability polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Feature flag for the periodic inactive-keyset check.
    pub periodic_check_enabled: bool,
    /// Seconds between periodic checks while foregrounded.
    pub check_interval_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            periodic_check_enabled: false,
            check_interval_secs: 30 * 60,
        }
    }
}

impl SweepConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

impl TrefoilConfig {
    /// Load configuration from a `.toml` or `.json` file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TrefoilError::internal(format!("Failed to read config file: {e}")))?;

        let config: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content)
                .map_err(|e| TrefoilError::invalid(format!("Invalid TOML: {e}")))?,
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| TrefoilError::invalid(format!("Invalid JSON: {e}")))?,
            _ => return Err(TrefoilError::invalid("Unsupported file format")),
        };

        config.validate()?;
        Ok(config)
    }

    /// Apply `TREFOIL_*` environment overrides.
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(std::env::vars())
    }

    fn merge_with_vars(&mut self, vars: impl IntoIterator<Item = (String, String)>) -> Result<()> {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix("TREFOIL_") else {
                continue;
            };
            match name {
                "SYNC_INTERVAL_SECS" => self.recovery.sync_interval_secs = parse(&key, &value)?,
                "DELAY_PERIOD_SECS" => self.recovery.delay_period_secs = parse(&key, &value)?,
                "MIN_COMPLETION_DURATION_MS" => {
                    self.recovery.min_completion_duration_ms = parse(&key, &value)?;
                }
                "SWEEP_PERIODIC_CHECK_ENABLED" => {
                    self.sweep.periodic_check_enabled = parse(&key, &value)?;
                }
                "SWEEP_CHECK_INTERVAL_SECS" => self.sweep.check_interval_secs = parse(&key, &value)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Reject configurations the runtime cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.recovery.sync_interval_secs == 0 {
            return Err(TrefoilError::invalid("recovery.sync_interval_secs must be > 0"));
        }
        if self.sweep.check_interval_secs == 0 {
            return Err(TrefoilError::invalid("sweep.check_interval_secs must be > 0"));
        }
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| TrefoilError::invalid(format!("Invalid value in {key}: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_toml_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[sweep]\nperiodic_check_enabled = true").unwrap();

        let config = TrefoilConfig::load_from_file(file.path()).unwrap();
        assert!(config.sweep.periodic_check_enabled);
        assert_eq!(config.sweep.check_interval(), Duration::from_secs(1800));
        assert_eq!(config.recovery, RecoveryConfig::default());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"recovery": {{"sync_interval_secs": 0}}}}"#).unwrap();

        let err = TrefoilConfig::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, TrefoilError::Invalid { .. }));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        assert!(TrefoilConfig::load_from_file(file.path()).is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = TrefoilConfig::default();
        config
            .merge_with_vars(vec![
                ("TREFOIL_SYNC_INTERVAL_SECS".to_string(), "5".to_string()),
                ("TREFOIL_SWEEP_PERIODIC_CHECK_ENABLED".to_string(), "true".to_string()),
                ("HOME".to_string(), "/root".to_string()),
            ])
            .unwrap();

        assert_eq!(config.recovery.sync_interval(), Duration::from_secs(5));
        assert!(config.sweep.periodic_check_enabled);

        let err = config
            .merge_with_vars(vec![(
                "TREFOIL_DELAY_PERIOD_SECS".to_string(),
                "soon".to_string(),
            )])
            .unwrap_err();
        assert!(matches!(err, TrefoilError::Invalid { .. }));
    }
}
