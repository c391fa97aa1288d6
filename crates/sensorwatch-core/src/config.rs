//! Runtime configuration.
//!
//! Values are layered, lowest precedence first: built-in defaults, an optional
//! JSON file, `SENSORWATCH_*` environment variables, then command-line flags
//! (applied by the binary directly on the struct).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::window::DEFAULT_MAX_POINTS;

pub const DEFAULT_BROKER_HOST: &str = "broker.hivemq.com";
pub const DEFAULT_BROKER_PORT: u16 = 1883;
pub const DEFAULT_KEEPALIVE_SECS: u64 = 60;
pub const DEFAULT_TOPIC: &str = "br/com/meuprojeto/esp32c3/sensor";
pub const DEFAULT_READ_INTERVAL_SECS: f64 = 5.0;
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Longest accepted refresh interval (one day).
pub const MAX_READ_INTERVAL_SECS: f64 = 86_400.0;

/// MQTT encodes keep-alive as a 16-bit number of seconds.
pub const MAX_KEEPALIVE_SECS: u64 = u16::MAX as u64;

/// Environment variables understood by [`MonitorConfig::apply_env`].
pub const ENV_VARS: &[&str] = &[
    "SENSORWATCH_BROKER",
    "SENSORWATCH_PORT",
    "SENSORWATCH_KEEPALIVE",
    "SENSORWATCH_CLIENT_ID",
    "SENSORWATCH_TOPIC",
    "SENSORWATCH_INTERVAL",
    "SENSORWATCH_MAX_POINTS",
    "SENSORWATCH_QUEUE_CAPACITY",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
    #[error("{0}")]
    Invalid(&'static str),
}

/// Everything the monitor needs to connect, ingest and render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub keepalive_secs: u64,
    /// MQTT client id; a random one is generated when unset.
    pub client_id: Option<String>,
    pub topic: String,
    /// Seconds between render cycles.
    pub read_interval_secs: f64,
    /// Window capacity.
    pub max_points: usize,
    /// Payloads buffered between the network thread and the ingest worker.
    pub queue_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            broker_host: DEFAULT_BROKER_HOST.to_string(),
            broker_port: DEFAULT_BROKER_PORT,
            keepalive_secs: DEFAULT_KEEPALIVE_SECS,
            client_id: None,
            topic: DEFAULT_TOPIC.to_string(),
            read_interval_secs: DEFAULT_READ_INTERVAL_SECS,
            max_points: DEFAULT_MAX_POINTS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl MonitorConfig {
    /// Load a JSON config file. Missing keys keep their defaults.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides using an arbitrary lookup (testable without touching
    /// the real environment).
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SENSORWATCH_BROKER") {
            self.broker_host = v;
        }
        if let Some(v) = lookup("SENSORWATCH_PORT") {
            self.broker_port = parse_value("SENSORWATCH_PORT", &v)?;
        }
        if let Some(v) = lookup("SENSORWATCH_KEEPALIVE") {
            self.keepalive_secs = parse_value("SENSORWATCH_KEEPALIVE", &v)?;
        }
        if let Some(v) = lookup("SENSORWATCH_CLIENT_ID") {
            self.client_id = Some(v);
        }
        if let Some(v) = lookup("SENSORWATCH_TOPIC") {
            self.topic = v;
        }
        if let Some(v) = lookup("SENSORWATCH_INTERVAL") {
            self.read_interval_secs = parse_value("SENSORWATCH_INTERVAL", &v)?;
        }
        if let Some(v) = lookup("SENSORWATCH_MAX_POINTS") {
            self.max_points = parse_value("SENSORWATCH_MAX_POINTS", &v)?;
        }
        if let Some(v) = lookup("SENSORWATCH_QUEUE_CAPACITY") {
            self.queue_capacity = parse_value("SENSORWATCH_QUEUE_CAPACITY", &v)?;
        }
        Ok(())
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker_host.trim().is_empty() {
            return Err(ConfigError::Invalid("broker host must not be empty"));
        }
        if self.broker_port == 0 {
            return Err(ConfigError::Invalid("broker port must be non-zero"));
        }
        if self.topic.trim().is_empty() {
            return Err(ConfigError::Invalid("topic must not be empty"));
        }
        if !self.read_interval_secs.is_finite() || self.read_interval_secs <= 0.0 {
            return Err(ConfigError::Invalid("read interval must be a positive number of seconds"));
        }
        if self.read_interval_secs > MAX_READ_INTERVAL_SECS {
            return Err(ConfigError::Invalid("read interval must not exceed one day"));
        }
        if self.keepalive_secs > MAX_KEEPALIVE_SECS {
            return Err(ConfigError::Invalid("keep-alive must not exceed 65535 seconds"));
        }
        if self.max_points == 0 {
            return Err(ConfigError::Invalid("max points must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue capacity must be at least 1"));
        }
        Ok(())
    }

    /// Refresh interval, clamped to what [`MonitorConfig::validate`] accepts.
    pub fn read_interval(&self) -> Duration {
        let secs = self.read_interval_secs.clamp(0.0, MAX_READ_INTERVAL_SECS);
        Duration::try_from_secs_f64(secs)
            .unwrap_or_else(|_| Duration::from_secs_f64(DEFAULT_READ_INTERVAL_SECS))
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs.min(MAX_KEEPALIVE_SECS))
    }

    /// Configured client id, or a fresh `sensorwatch-xxxxxxxx`.
    pub fn client_id(&self) -> String {
        match &self.client_id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => {
                let id = uuid::Uuid::new_v4().simple().to_string();
                format!("sensorwatch-{}", &id[..8])
            }
        }
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let c = MonitorConfig::default();
        assert_eq!(c.broker_host, "broker.hivemq.com");
        assert_eq!(c.broker_port, 1883);
        assert_eq!(c.topic, "br/com/meuprojeto/esp32c3/sensor");
        assert_eq!(c.read_interval(), Duration::from_secs(5));
        assert_eq!(c.max_points, 100);
        assert_eq!(c.keepalive(), Duration::from_secs(60));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn load_partial_file_keeps_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"topic": "home/attic", "max_points": 20}}"#).unwrap();
        let c = MonitorConfig::load_from_path(f.path()).unwrap();
        assert_eq!(c.topic, "home/attic");
        assert_eq!(c.max_points, 20);
        assert_eq!(c.broker_port, DEFAULT_BROKER_PORT);
    }

    #[test]
    fn load_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = MonitorConfig::load_from_path(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn load_bad_json_is_parse_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{{ broken").unwrap();
        let err = MonitorConfig::load_from_path(f.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let mut c = MonitorConfig::default();
        c.apply_env_from(env(&[
            ("SENSORWATCH_BROKER", "localhost"),
            ("SENSORWATCH_PORT", "1884"),
            ("SENSORWATCH_INTERVAL", "0.5"),
            ("SENSORWATCH_MAX_POINTS", " 250 "),
            ("SENSORWATCH_CLIENT_ID", "bench-1"),
        ]))
        .unwrap();
        assert_eq!(c.broker_host, "localhost");
        assert_eq!(c.broker_port, 1884);
        assert_eq!(c.read_interval(), Duration::from_millis(500));
        assert_eq!(c.max_points, 250);
        assert_eq!(c.client_id(), "bench-1");
        assert_eq!(c.topic, DEFAULT_TOPIC);
    }

    #[test]
    fn env_bad_number_is_rejected() {
        let mut c = MonitorConfig::default();
        let err = c
            .apply_env_from(env(&[("SENSORWATCH_PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { key: "SENSORWATCH_PORT", .. }
        ));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let bad = [
            MonitorConfig { broker_host: " ".into(), ..Default::default() },
            MonitorConfig { broker_port: 0, ..Default::default() },
            MonitorConfig { topic: String::new(), ..Default::default() },
            MonitorConfig { read_interval_secs: 0.0, ..Default::default() },
            MonitorConfig { read_interval_secs: f64::NAN, ..Default::default() },
            MonitorConfig { max_points: 0, ..Default::default() },
            MonitorConfig { queue_capacity: 0, ..Default::default() },
            MonitorConfig { read_interval_secs: 1e20, ..Default::default() },
            MonitorConfig { read_interval_secs: MAX_READ_INTERVAL_SECS + 1.0, ..Default::default() },
            MonitorConfig { keepalive_secs: MAX_KEEPALIVE_SECS + 1, ..Default::default() },
        ];
        for c in bad {
            assert!(c.validate().is_err(), "{c:?} should be invalid");
        }
    }

    #[test]
    fn upper_bounds_are_inclusive() {
        let c = MonitorConfig {
            read_interval_secs: MAX_READ_INTERVAL_SECS,
            keepalive_secs: MAX_KEEPALIVE_SECS,
            ..Default::default()
        };
        assert!(c.validate().is_ok());
        assert_eq!(c.read_interval(), Duration::from_secs(86_400));
    }

    #[test]
    fn read_interval_never_panics_on_unvalidated_values() {
        for secs in [1e20, f64::INFINITY, f64::NAN, -3.0] {
            let c = MonitorConfig { read_interval_secs: secs, ..Default::default() };
            assert!(c.read_interval() <= Duration::from_secs(86_400), "{secs}");
        }
        let huge = MonitorConfig { read_interval_secs: 1e20, ..Default::default() };
        assert_eq!(huge.read_interval(), Duration::from_secs(86_400));
    }

    #[test]
    fn env_huge_interval_fails_validation() {
        let mut c = MonitorConfig::default();
        c.apply_env_from(env(&[("SENSORWATCH_INTERVAL", "1e20")])).unwrap();
        assert!(c.validate().is_err());
    }

    #[test]
    fn generated_client_id_is_prefixed_and_unique() {
        let c = MonitorConfig::default();
        let a = c.client_id();
        let b = c.client_id();
        assert!(a.starts_with("sensorwatch-"));
        assert_eq!(a.len(), "sensorwatch-".len() + 8);
        assert_ne!(a, b);
    }

    #[test]
    fn env_var_list_is_complete() {
        assert_eq!(ENV_VARS.len(), 8);
        assert!(ENV_VARS.iter().all(|v| v.starts_with("SENSORWATCH_")));
    }
}
