use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{board::Color, Result, VantageError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    /// Upper bound for a single round trip, engine searches included.
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub engine_side: Color,
    pub auto_engine_reply: bool,
    /// Zero disables periodic `/state` refreshes.
    #[serde(default)]
    pub refresh_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub heatmap_gain: f32,
    pub heatmap_max_alpha: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub actors_url: String,
    pub training_url: String,
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub active_worker: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsConfig {
    pub log_level: String,
    pub event_log_capacity: usize,
    /// Logs go here instead of stderr, which the terminal UI owns.
    #[serde(default)]
    pub log_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VantageConfig {
    pub backend: BackendConfig,
    pub session: SessionConfig,
    pub telemetry: TelemetryConfig,
    pub dashboard: DashboardConfig,
    pub ops: OpsConfig,
}

impl VantageConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            VantageError::Configuration(format!(
                "unable to read config file {}: {err}",
                path_ref.display()
            ))
        })?;
        toml::from_str(&contents).map_err(|err| {
            VantageError::Configuration(format!(
                "failed to parse config file {}: {err}",
                path_ref.display()
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        validate_url("backend.base_url", &self.backend.base_url)?;
        validate_url("dashboard.actors_url", &self.dashboard.actors_url)?;
        validate_url("dashboard.training_url", &self.dashboard.training_url)?;
        if self.backend.request_timeout_ms == 0 {
            return Err(VantageError::Configuration(
                "backend.request_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.session.refresh_interval_ms != 0 && self.session.refresh_interval_ms < 100 {
            return Err(VantageError::Configuration(
                "session.refresh_interval_ms must be 0 (off) or at least 100".into(),
            ));
        }
        if self.dashboard.poll_interval_ms < 100 {
            return Err(VantageError::Configuration(
                "dashboard.poll_interval_ms must be at least 100".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.telemetry.heatmap_max_alpha) {
            return Err(VantageError::Configuration(
                "telemetry.heatmap_max_alpha must be between 0.0 and 1.0".into(),
            ));
        }
        if self.telemetry.heatmap_gain <= 0.0 {
            return Err(VantageError::Configuration(
                "telemetry.heatmap_gain must be positive".into(),
            ));
        }
        if self.ops.event_log_capacity == 0 {
            return Err(VantageError::Configuration(
                "ops.event_log_capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

fn validate_url(field: &str, url: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(VantageError::Configuration(format!(
            "{field} must be an http(s) URL, got '{url}'"
        )))
    }
}

impl Default for VantageConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig {
                base_url: "http://127.0.0.1:5001".into(),
                request_timeout_ms: 60_000,
            },
            session: SessionConfig {
                engine_side: Color::Black,
                auto_engine_reply: true,
                refresh_interval_ms: 0,
            },
            telemetry: TelemetryConfig {
                heatmap_gain: 1.5,
                heatmap_max_alpha: 0.8,
            },
            dashboard: DashboardConfig {
                actors_url: "http://127.0.0.1:5003".into(),
                training_url: "http://127.0.0.1:5005".into(),
                poll_interval_ms: 1_000,
                active_worker: None,
            },
            ops: OpsConfig {
                log_level: "info".into(),
                event_log_capacity: 256,
                log_file: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn load_vantage_config_from_file() {
        let temp_path = std::env::temp_dir().join("vantage-config-test.toml");
        let mut config = VantageConfig::default();
        config.backend.base_url = "http://10.0.0.5:5001".into();
        config.session.engine_side = Color::White;
        config.session.auto_engine_reply = false;
        config.dashboard.active_worker = Some("2".into());

        let doc = toml::to_string(&config).expect("serialize config");
        fs::write(&temp_path, doc).expect("write temp config");

        let loaded = VantageConfig::from_file(&temp_path).expect("load config");
        assert_eq!(loaded.backend.base_url, config.backend.base_url);
        assert_eq!(loaded.session.engine_side, Color::White);
        assert!(!loaded.session.auto_engine_reply);
        assert_eq!(loaded.dashboard.active_worker.as_deref(), Some("2"));
        fs::remove_file(&temp_path).expect("cleanup temp config");
    }

    #[test]
    fn missing_file_is_configuration_error() {
        let err = VantageConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, VantageError::Configuration(_)));
    }

    #[test]
    fn validate_configuration_rules() {
        let mut config = VantageConfig::default();
        assert!(config.validate().is_ok());

        config.backend.base_url = "localhost:5001".into();
        assert!(config.validate().is_err());
        config.backend.base_url = "http://localhost:5001".into();
        config.backend.request_timeout_ms = 0;
        assert!(config.validate().is_err());
        config.backend.request_timeout_ms = 1_000;
        config.session.refresh_interval_ms = 50;
        assert!(config.validate().is_err());
        config.session.refresh_interval_ms = 0;
        config.dashboard.poll_interval_ms = 10;
        assert!(config.validate().is_err());
        config.dashboard.poll_interval_ms = 1_000;
        config.telemetry.heatmap_max_alpha = 1.5;
        assert!(config.validate().is_err());
        config.telemetry.heatmap_max_alpha = 0.8;
        config.ops.event_log_capacity = 0;
        assert!(config.validate().is_err());
        config.ops.event_log_capacity = 16;
        assert!(config.validate().is_ok());
    }
}
