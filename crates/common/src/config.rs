//! Startup configuration, read exactly once and then passed around by reference.
//!
//! Sources, later ones win:
//! 1. built-in defaults
//! 2. optional YAML file
//! 3. `REALM_*` environment variables

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::Transform;

/// Errors raised while building the startup configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid value {value:?} for {key}")]
    InvalidEnv { key: &'static str, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// How much the tick loop logs about each individual tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickLogVerbosity {
    /// Only health reports and warnings.
    #[default]
    Off,
    /// One debug line per tick.
    Summary,
    /// Per-tick line plus per-player trace output.
    Verbose,
}

impl std::str::FromStr for TickLogVerbosity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" | "0" => Ok(Self::Off),
            "summary" | "1" => Ok(Self::Summary),
            "verbose" | "2" => Ok(Self::Verbose),
            _ => Err(()),
        }
    }
}

/// Immutable server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Nominal simulation rate.
    pub tick_rate_hz: f64,
    /// Ticks a single scheduler wake may run before resynchronising.
    pub max_catch_up_ticks: u32,
    /// Samples kept for rolling tick statistics.
    pub stats_window: usize,
    pub tick_log: TickLogVerbosity,
    pub persistence_flush_interval_ms: u64,
    pub health_log_interval_ms: u64,
    /// Replication radius around each player. `None` replicates everything.
    pub interest_radius: Option<f32>,
    /// Warn when a single user's per-tick batch exceeds this many commands.
    pub command_flood_warn: usize,
    pub spawn_point: [f32; 3],
    pub player_max_health: f32,
    /// Root directory of the file-backed character store.
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 30.0,
            max_catch_up_ticks: 4,
            stats_window: 300,
            tick_log: TickLogVerbosity::Off,
            persistence_flush_interval_ms: 5_000,
            health_log_interval_ms: 10_000,
            interest_radius: Some(150.0),
            command_flood_warn: 64,
            spawn_point: [0.0, 1.0, 0.0],
            player_max_health: 100.0,
            data_dir: PathBuf::from("realm_data"),
        }
    }
}

impl ServerConfig {
    /// Load from an optional YAML file, then apply overrides from `env`.
    ///
    /// `env` is injected so callers decide where variables come from; the
    /// binary passes `std::env::var`.
    pub fn load(
        path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut cfg = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p).map_err(|source| ConfigError::Io {
                    path: p.to_path_buf(),
                    source,
                })?;
                serde_yaml::from_str(&text)?
            }
            None => Self::default(),
        };
        cfg.apply_env(env)?;
        cfg.validate()?;
        tracing::debug!(?cfg, "configuration loaded");
        Ok(cfg)
    }

    /// Load using the process environment.
    pub fn from_process_env(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load(path, |k| std::env::var(k).ok())
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(v) = env("REALM_TICK_LOG") {
            self.tick_log = v.parse().map_err(|_| ConfigError::InvalidEnv {
                key: "REALM_TICK_LOG",
                value: v.clone(),
            })?;
        }
        if let Some(v) = env("REALM_FLUSH_INTERVAL_MS") {
            self.persistence_flush_interval_ms = parse_env("REALM_FLUSH_INTERVAL_MS", &v)?;
        }
        if let Some(v) = env("REALM_HEALTH_LOG_INTERVAL_MS") {
            self.health_log_interval_ms = parse_env("REALM_HEALTH_LOG_INTERVAL_MS", &v)?;
        }
        if let Some(v) = env("REALM_TICK_RATE_HZ") {
            self.tick_rate_hz = parse_env("REALM_TICK_RATE_HZ", &v)?;
        }
        if let Some(v) = env("REALM_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tick_rate_hz.is_finite() && self.tick_rate_hz > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "tick_rate_hz must be positive, got {}",
                self.tick_rate_hz
            )));
        }
        if self.max_catch_up_ticks == 0 {
            return Err(ConfigError::Invalid("max_catch_up_ticks must be >= 1".into()));
        }
        if self.persistence_flush_interval_ms == 0 || self.health_log_interval_ms == 0 {
            return Err(ConfigError::Invalid("intervals must be non-zero".into()));
        }
        if self.stats_window == 0 {
            return Err(ConfigError::Invalid("stats_window must be >= 1".into()));
        }
        if !(self.player_max_health.is_finite() && self.player_max_health > 0.0) {
            return Err(ConfigError::Invalid("player_max_health must be positive".into()));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz)
    }

    /// Fixed simulation step in seconds.
    pub fn dt(&self) -> f32 {
        (1.0 / self.tick_rate_hz) as f32
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.persistence_flush_interval_ms)
    }

    pub fn health_log_interval(&self) -> Duration {
        Duration::from_millis(self.health_log_interval_ms)
    }

    pub fn spawn_transform(&self) -> Transform {
        Transform::at(Vec3::from_array(self.spawn_point))
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = ServerConfig::load(None, no_env).unwrap();
        assert_eq!(cfg, ServerConfig::default());
        assert_eq!(cfg.tick_interval(), Duration::from_secs_f64(1.0 / 30.0));
    }

    #[test]
    fn yaml_file_overrides_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("realm.yaml");
        std::fs::write(
            &path,
            "tick_rate_hz: 20.0\ntick_log: verbose\npersistence_flush_interval_ms: 250\n",
        )
        .unwrap();
        let cfg = ServerConfig::load(Some(&path), no_env).unwrap();
        assert_eq!(cfg.tick_rate_hz, 20.0);
        assert_eq!(cfg.tick_log, TickLogVerbosity::Verbose);
        assert_eq!(cfg.persistence_flush_interval_ms, 250);
        // Untouched keys keep their defaults.
        assert_eq!(cfg.max_catch_up_ticks, 4);
    }

    #[test]
    fn env_overrides_win_over_file() {
        let env: HashMap<&str, &str> = [
            ("REALM_TICK_LOG", "summary"),
            ("REALM_FLUSH_INTERVAL_MS", "1500"),
            ("REALM_HEALTH_LOG_INTERVAL_MS", "700"),
        ]
        .into_iter()
        .collect();
        let cfg = ServerConfig::load(None, |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.tick_log, TickLogVerbosity::Summary);
        assert_eq!(cfg.persistence_flush_interval_ms, 1500);
        assert_eq!(cfg.health_log_interval_ms, 700);
    }

    #[test]
    fn bad_env_value_is_rejected() {
        let result = ServerConfig::load(None, |k| {
            (k == "REALM_FLUSH_INTERVAL_MS").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidEnv { .. })));
    }

    #[test]
    fn zero_tick_rate_fails_validation() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.yaml");
        std::fs::write(&path, "tick_rate_hz: 0.0\n").unwrap();
        assert!(matches!(
            ServerConfig::load(Some(&path), no_env),
            Err(ConfigError::Invalid(_))
        ));
    }
}
