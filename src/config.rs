use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dirs;
use crate::error::{ReplyError, Result};

/// Listen port used when `PORT` is unset or empty.
pub const DEFAULT_PORT: u16 = 8000;

/// Settings for the bot process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BotConfig {
    /// Listen host; the status server always binds all interfaces
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port (default: 8000, overridden by `$PORT`)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding session credentials and config
    #[serde(default = "dirs::reply_home")]
    pub data_dir: PathBuf,

    /// Session credential file name inside `data_dir`
    #[serde(default = "default_session_file")]
    pub session_file: String,

    /// Upper bound on how long to wait for a pairing scan
    #[serde(default = "default_pairing_timeout_secs")]
    pub pairing_timeout_secs: u64,

    /// Connect attempts before initialization gives up (1 = no retry)
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_session_file() -> String {
    dirs::SESSION_FILE.to_string()
}

fn default_pairing_timeout_secs() -> u64 {
    300
}

fn default_connect_attempts() -> u32 {
    1
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: dirs::reply_home(),
            session_file: default_session_file(),
            pairing_timeout_secs: default_pairing_timeout_secs(),
            connect_attempts: default_connect_attempts(),
        }
    }
}

impl BotConfig {
    /// Load configuration from the default config path, then apply `$PORT`.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&dirs::config_path())?;
        config.apply_env()?;
        Ok(config)
    }

    /// Load `<data_dir>/config.toml`, then apply `$PORT`.
    ///
    /// `data_dir` takes precedence over any `data_dir` set in the file.
    pub fn load_in(data_dir: &Path) -> Result<Self> {
        let mut config = Self::load_from(&data_dir.join(dirs::CONFIG_FILE))?;
        config.data_dir = data_dir.to_path_buf();
        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(port) = resolve_port(std::env::var("PORT").ok().as_deref())? {
            self.port = port;
        }
        Ok(())
    }

    /// Load configuration from a TOML file. Returns defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            ReplyError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let mut config: BotConfig = toml::from_str(&content)?;
        config.host = default_host();
        Ok(config)
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Returns the server bind address string (e.g., "0.0.0.0:8000").
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Path of the session credential file.
    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join(&self.session_file)
    }

    pub fn pairing_timeout(&self) -> Duration {
        Duration::from_secs(self.pairing_timeout_secs)
    }
}

/// Interpret a raw `PORT` value.
///
/// Absent or blank means "no override"; anything else must be a valid port.
pub fn resolve_port(raw: Option<&str>) -> Result<Option<u16>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<u16>()
            .map(Some)
            .map_err(|e| ReplyError::Config(format!("Invalid PORT '{}': {}", value, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BotConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert_eq!(config.session_file, "session.json");
        assert_eq!(config.pairing_timeout(), Duration::from_secs(300));
        assert_eq!(config.connect_attempts, 1);
    }

    #[test]
    fn test_bind_address_all_interfaces() {
        let config = BotConfig {
            port: 9090,
            ..BotConfig::default()
        };
        assert_eq!(config.bind_address(), "0.0.0.0:9090");
    }

    #[test]
    fn test_resolve_port() {
        assert_eq!(resolve_port(None).unwrap(), None);
        assert_eq!(resolve_port(Some("")).unwrap(), None);
        assert_eq!(resolve_port(Some("  ")).unwrap(), None);
        assert_eq!(resolve_port(Some("3000")).unwrap(), Some(3000));
        assert!(matches!(
            resolve_port(Some("http")),
            Err(ReplyError::Config(_))
        ));
        assert!(resolve_port(Some("70000")).is_err());
    }

    #[test]
    fn test_config_deserialize_partial() {
        let toml_str = r#"
            port = 8081
            data_dir = "/var/lib/reply"
            pairing_timeout_secs = 60
        "#;
        let config: BotConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.port, 8081);
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/reply"));
        assert_eq!(config.pairing_timeout_secs, 60);
        assert_eq!(config.connect_attempts, 1);
        assert_eq!(
            config.session_path(),
            PathBuf::from("/var/lib/reply/session.json")
        );
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = BotConfig::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn test_load_from_pins_host() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "host = \"127.0.0.1\"\nport = 8200\n").unwrap();

        let config = BotConfig::load_from(&path).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8200);
    }

    #[test]
    fn test_load_in_overrides_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "data_dir = \"/elsewhere\"\npairing_timeout_secs = 30\n",
        )
        .unwrap();

        let config = BotConfig::load_in(dir.path()).unwrap();
        assert_eq!(config.data_dir, dir.path());
        assert_eq!(config.pairing_timeout_secs, 30);
    }

    #[test]
    fn test_load_from_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "port = \"not a number\"").unwrap();
        assert!(matches!(
            BotConfig::load_from(&path),
            Err(ReplyError::TomlDe(_))
        ));
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let config = BotConfig {
            port: 8123,
            data_dir: PathBuf::from("/srv/reply"),
            ..BotConfig::default()
        };
        let rendered = config.to_toml().unwrap();
        let parsed: BotConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
