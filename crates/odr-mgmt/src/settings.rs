//! Client settings: where the daemon listens and how long to wait for it.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::endpoint::{DEFAULT_RC_PORT, DEFAULT_STATS_PORT, Endpoint, TransportKind};
use crate::error::{Error, Result};
use crate::handshake::DABMUX_SERVICE;

const KNOWN_KEYS: [&str; 8] = [
    "host",
    "statsPort",
    "rcPort",
    "legacyPort",
    "expectedService",
    "connectTimeoutMs",
    "livenessTimeoutMs",
    "bulkTimeoutMs",
];

fn default_host() -> String {
    "localhost".to_string()
}

fn default_stats_port() -> u16 {
    DEFAULT_STATS_PORT
}

fn default_rc_port() -> u16 {
    DEFAULT_RC_PORT
}

fn default_expected_service() -> String {
    DABMUX_SERVICE.to_string()
}

fn default_connect_timeout() -> u64 {
    1000
}

fn default_liveness_timeout() -> u64 {
    1000
}

fn default_bulk_timeout() -> u64 {
    5000
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_stats_port")]
    pub stats_port: u16,

    #[serde(default = "default_rc_port")]
    pub rc_port: u16,

    /// Port of the old stream management server. It replaced the stats
    /// server on the same port, so both default to the same number.
    #[serde(default = "default_stats_port")]
    pub legacy_port: u16,

    /// Prefix the handshake requires of the service name.
    #[serde(default = "default_expected_service")]
    pub expected_service: String,

    /// Deadline for reaching the daemon's port, both on connect and when a
    /// socket is reopened after a timeout.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Deadline for ping, info and values.
    #[serde(default = "default_liveness_timeout")]
    pub liveness_timeout_ms: u64,

    /// Deadline for whole-configuration reads and writes.
    #[serde(default = "default_bulk_timeout")]
    pub bulk_timeout_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            stats_port: default_stats_port(),
            rc_port: default_rc_port(),
            legacy_port: default_stats_port(),
            expected_service: default_expected_service(),
            connect_timeout_ms: default_connect_timeout(),
            liveness_timeout_ms: default_liveness_timeout(),
            bulk_timeout_ms: default_bulk_timeout(),
        }
    }
}

impl ClientSettings {
    /// Load settings from a JSON file.
    ///
    /// A missing file yields the defaults. Unknown keys are logged and
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// sets a zero timeout.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        warn_unknown_keys(&content, path);

        let settings: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Settings(format!("{}: {e}", path.display())))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.connect_timeout_ms == 0
            || self.liveness_timeout_ms == 0
            || self.bulk_timeout_ms == 0
        {
            return Err(Error::Settings("timeouts must be at least 1 ms".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn stats_endpoint(&self) -> Endpoint {
        Endpoint::new(&self.host, self.stats_port, TransportKind::MessageQueue)
    }

    #[must_use]
    pub fn rc_endpoint(&self) -> Endpoint {
        Endpoint::new(&self.host, self.rc_port, TransportKind::MessageQueue)
    }

    #[must_use]
    pub fn legacy_endpoint(&self) -> Endpoint {
        Endpoint::new(&self.host, self.legacy_port, TransportKind::Stream)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    #[must_use]
    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }

    #[must_use]
    pub fn bulk_timeout(&self) -> Duration {
        Duration::from_millis(self.bulk_timeout_ms)
    }
}

fn warn_unknown_keys(content: &str, path: &Path) {
    let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(content) else {
        return;
    };

    for key in obj.keys().filter(|k| !KNOWN_KEYS.contains(&k.as_str())) {
        tracing::warn!("Unknown settings field in {}: {}", path.display(), key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_settings_default() {
        let settings = ClientSettings::default();
        assert_eq!(settings.host, "localhost");
        assert_eq!(settings.stats_port, 12720);
        assert_eq!(settings.rc_port, 12722);
        assert_eq!(settings.legacy_port, 12720);
        assert_eq!(settings.expected_service, "ODR-DabMux");
        assert_eq!(settings.liveness_timeout(), Duration::from_secs(1));
        assert_eq!(settings.bulk_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_settings_load_nonexistent_returns_default() {
        let path = Path::new("/nonexistent/path/odr-mgmt.json");
        let settings = ClientSettings::load(path).unwrap();
        assert_eq!(settings, ClientSettings::default());
    }

    #[test]
    fn test_settings_load_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"host": "mux.example.net", "rcPort": 9400, "bulkTimeoutMs": 10000}}"#
        )
        .unwrap();

        let settings = ClientSettings::load(file.path()).unwrap();
        assert_eq!(settings.host, "mux.example.net");
        assert_eq!(settings.rc_port, 9400);
        assert_eq!(settings.stats_port, 12720);
        assert_eq!(settings.bulk_timeout(), Duration::from_secs(10));
        assert_eq!(settings.connect_timeout(), Duration::from_secs(1));
        assert_eq!(settings.rc_endpoint().zmq_url(), "tcp://mux.example.net:9400");
    }

    #[test]
    fn test_settings_unknown_keys_are_ignored() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"statsPort": 13000, "colour": "blue"}}"#).unwrap();

        let settings = ClientSettings::load(file.path()).unwrap();
        assert_eq!(settings.stats_port, 13000);
    }

    #[test]
    fn test_settings_load_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{not json").unwrap();

        let err = ClientSettings::load(file.path()).unwrap_err();
        assert!(matches!(err, Error::Settings(_)));
    }

    #[test]
    fn test_settings_reject_zero_timeout() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"livenessTimeoutMs": 0}}"#).unwrap();

        assert!(matches!(
            ClientSettings::load(file.path()),
            Err(Error::Settings(_))
        ));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"connectTimeoutMs": 0}}"#).unwrap();

        assert!(matches!(
            ClientSettings::load(file.path()),
            Err(Error::Settings(_))
        ));
    }

    #[test]
    fn test_settings_endpoints() {
        let settings = ClientSettings {
            host: "10.0.0.2".to_string(),
            ..ClientSettings::default()
        };

        assert_eq!(settings.stats_endpoint().kind(), TransportKind::MessageQueue);
        assert_eq!(settings.stats_endpoint().port(), 12720);
        assert_eq!(settings.rc_endpoint().port(), 12722);
        assert_eq!(settings.legacy_endpoint().kind(), TransportKind::Stream);
        assert_eq!(settings.legacy_endpoint().host(), "10.0.0.2");
    }
}
