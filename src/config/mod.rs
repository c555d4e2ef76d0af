// src/config/mod.rs - Fleet configuration
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration, loaded once at startup and immutable after.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FleetConfig {
    #[serde(default = "default_status_title")]
    pub status_title: String,

    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_seconds: u64,

    pub discord: DiscordConfig,

    /// Username (lowercase) -> platform user id, used to mention print
    /// owners in notifications. Optional; unresolved names fall back to
    /// a plain "@name".
    #[serde(default)]
    pub mentions: HashMap<String, u64>,

    #[serde(default)]
    pub printers: Vec<PrinterConfig>,
}

/// Webhook endpoints for the two output surfaces.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscordConfig {
    pub status_webhook_url: String,
    pub notification_webhook_url: String,
}

/// Identity and connection parameters for one monitored printer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PrinterConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub backend: BackendKind,

    /// Host name or IP address of the printer.
    pub host: String,

    // PrusaLink fields
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub auth: Option<AuthMode>,
    #[serde(default = "default_prusa_username")]
    pub username: String,

    // Bambu fields
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub access_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Pull: status is requested over HTTP each cycle (PrusaLink).
    Prusa,
    /// Push: status streams over MQTT into a local cache (Bambu Lab).
    Bambu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// X-Api-Key header (Prusa Mini / Mini+, MK4).
    #[default]
    ApiKey,
    /// HTTP Basic auth with the configured username.
    Basic,
}

fn default_status_title() -> String {
    "3D Printer Status".to_string()
}
fn default_refresh_interval() -> u64 {
    30
}
fn default_prusa_username() -> String {
    "maker".to_string()
}

impl FleetConfig {
    /// Load and validate configuration from a TOML file.
    /// Any failure here is fatal at startup; the monitor never reloads.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        let config: FleetConfig =
            toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval_seconds < 5 {
            return Err(ConfigError::Invalid(
                "refresh_interval_seconds must be at least 5".to_string(),
            ));
        }
        if self.printers.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one printer must be configured".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for printer in &self.printers {
            if printer.name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "printer name cannot be empty".to_string(),
                ));
            }
            if !seen.insert(printer.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate printer name: {}",
                    printer.name
                )));
            }
            if printer.host.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "printer {} has no host",
                    printer.name
                )));
            }
            match printer.backend {
                BackendKind::Prusa => {
                    if printer.api_key.as_deref().unwrap_or("").is_empty() {
                        return Err(ConfigError::Invalid(format!(
                            "prusa printer {} requires api_key",
                            printer.name
                        )));
                    }
                }
                BackendKind::Bambu => {
                    if printer.serial.as_deref().unwrap_or("").is_empty() {
                        return Err(ConfigError::Invalid(format!(
                            "bambu printer {} requires serial",
                            printer.name
                        )));
                    }
                    if printer.access_code.as_deref().unwrap_or("").is_empty() {
                        return Err(ConfigError::Invalid(format!(
                            "bambu printer {} requires access_code",
                            printer.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
status_title = "Makerspace Printers"
refresh_interval_seconds = 45

[discord]
status_webhook_url = "https://discord.example/api/webhooks/1/status"
notification_webhook_url = "https://discord.example/api/webhooks/2/notify"

[mentions]
"bob.smith" = 111222333

[[printers]]
name = "Mini"
type = "prusa"
host = "192.168.1.20"
api_key = "abc123"

[[printers]]
name = "X1C"
type = "bambu"
host = "192.168.1.21"
serial = "00M00A000000000"
access_code = "12345678"
"#;

    #[test]
    fn test_parse_sample_config() {
        let config: FleetConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.status_title, "Makerspace Printers");
        assert_eq!(config.refresh_interval_seconds, 45);
        assert_eq!(config.printers.len(), 2);
        assert_eq!(config.printers[0].backend, BackendKind::Prusa);
        assert_eq!(config.printers[1].backend, BackendKind::Bambu);
        assert_eq!(config.mentions.get("bob.smith"), Some(&111222333));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_applied() {
        let minimal = r#"
[discord]
status_webhook_url = "https://discord.example/a"
notification_webhook_url = "https://discord.example/b"

[[printers]]
name = "Mini"
type = "prusa"
host = "10.0.0.5"
api_key = "k"
"#;
        let config: FleetConfig = toml::from_str(minimal).unwrap();
        assert_eq!(config.status_title, "3D Printer Status");
        assert_eq!(config.refresh_interval_seconds, 30);
        assert_eq!(config.printers[0].username, "maker");
        assert!(config.printers[0].auth.is_none());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut config: FleetConfig = toml::from_str(SAMPLE).unwrap();
        config.printers[1].name = "Mini".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_prusa_requires_api_key() {
        let mut config: FleetConfig = toml::from_str(SAMPLE).unwrap();
        config.printers[0].api_key = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bambu_requires_serial_and_access_code() {
        let mut config: FleetConfig = toml::from_str(SAMPLE).unwrap();
        config.printers[1].access_code = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_interval_lower_bound() {
        let mut config: FleetConfig = toml::from_str(SAMPLE).unwrap();
        config.refresh_interval_seconds = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = FleetConfig::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.printers.len(), 2);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = FleetConfig::load("/nonexistent/printers.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
