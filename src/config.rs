//! Configuration loading.
//!
//! TOML config with `[device]`, `[http]`, `[daemon]` and `[logging]`
//! sections, searched in the working directory, `/etc/stationctl/` and the
//! user config directory. Every field has a default so the tool runs with no
//! config file at all.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub device: DeviceConfig,
    pub http: HttpConfig,
    pub daemon: DaemonConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DeviceConfig {
    /// Fixed modem address; skips discovery probing when set.
    pub address: Option<String>,

    /// Login user. Stock firmware only knows `admin`.
    pub username: String,

    /// Login password. The CLI flag and `STATION_PASSWORD` take precedence.
    pub password: Option<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: None,
            username: "admin".to_string(),
            password: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds. The device can be very slow while it
    /// reassembles its channel tables, hence the generous default.
    pub timeout: u64,

    /// Connection timeout in seconds.
    pub connect_timeout: u64,

    /// Timeout per discovery probe in seconds.
    pub probe_timeout: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: 45,
            connect_timeout: 5,
            probe_timeout: 3,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DaemonConfig {
    /// Seconds between polling cycles.
    pub poll_interval: u64,

    /// Backoff in seconds after repeated failed cycles.
    pub failure_backoff: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            poll_interval: 300,
            failure_backoff: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from an explicit path, or the first config file found in the
    /// search locations, or defaults when none exists.
    pub fn load(explicit: Option<&str>) -> Result<Self> {
        if let Some(path) = explicit {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {path}"))?;
            return toml::from_str(&contents)
                .with_context(|| format!("failed to parse config file {path}"));
        }

        let search = [
            Some(PathBuf::from("stationctl.toml")),
            Some(PathBuf::from("/etc/stationctl/config.toml")),
            dirs::config_dir().map(|d| d.join("stationctl/config.toml")),
        ];

        for path in search.into_iter().flatten() {
            if path.exists() {
                tracing::debug!("loading config from {}", path.display());
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                return toml::from_str(&contents)
                    .with_context(|| format!("failed to parse {}", path.display()));
            }
        }

        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_sections_absent() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.device.username, "admin");
        assert_eq!(cfg.device.address, None);
        assert_eq!(cfg.http.timeout, 45);
        assert_eq!(cfg.daemon.poll_interval, 300);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [device]
            address = "192.168.100.1"

            [daemon]
            poll_interval = 60
            "#,
        )
        .unwrap();
        assert_eq!(cfg.device.address.as_deref(), Some("192.168.100.1"));
        assert_eq!(cfg.device.username, "admin");
        assert_eq!(cfg.daemon.poll_interval, 60);
        assert_eq!(cfg.daemon.failure_backoff, 60);
        assert_eq!(cfg.http.connect_timeout, 5);
    }
}
