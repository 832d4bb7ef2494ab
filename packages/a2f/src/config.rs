//! Configuration management for the Audio2Face client
//!
//! Configuration is a plain serde struct with documented defaults. It can be
//! loaded from and saved to TOML, and a couple of environment variables
//! override the values that differ per machine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use a2f_domain::{DEFAULT_A2E_INSTANCE, DEFAULT_STREAM_PLAYER_INSTANCE};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result, config_error};

/// Environment variable overriding [`A2fConfig::base_url`].
pub const ENV_URL: &str = "A2F_URL";
/// Environment variable overriding [`A2fConfig::install_path`].
pub const ENV_INSTALL_PATH: &str = "A2F_INSTALL_PATH";

#[cfg(windows)]
const DEFAULT_EXECUTABLE: &str = "audio2face_headless.bat";
#[cfg(not(windows))]
const DEFAULT_EXECUTABLE: &str = "audio2face_headless.sh";

/// Main client configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct A2fConfig {
    /// REST base URL of the headless server.
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Directory containing the headless launcher script.
    #[serde(rename = "install-path")]
    pub install_path: PathBuf,

    /// Launcher file name inside `install_path`.
    pub executable: String,

    /// Scene used for file conversion.
    #[serde(rename = "mark-scene")]
    pub mark_scene: PathBuf,

    /// Scene containing the streaming audio player.
    #[serde(rename = "streaming-scene")]
    pub streaming_scene: PathBuf,

    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,

    #[serde(rename = "startup-timeout-secs")]
    pub startup_timeout_secs: u64,

    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    #[serde(rename = "stream-port")]
    pub stream_port: u16,

    #[serde(rename = "default-fps")]
    pub default_fps: u32,

    /// Terminate an owned server process when the client is dropped.
    #[serde(rename = "shutdown-on-drop")]
    pub shutdown_on_drop: bool,

    /// Where `a2f start` records the id of the server it left running.
    /// Defaults to `a2f-headless.pid` in the system temp directory.
    #[serde(rename = "pid-file", skip_serializing_if = "Option::is_none")]
    pub pid_file: Option<PathBuf>,

    pub instances: InstanceConfig,
}

/// Prim paths of the server-side nodes the client talks to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    pub player: String,
    pub solver: String,
    pub emotion: String,
    #[serde(rename = "stream-player")]
    pub stream_player: String,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            player: "/World/audio2face/Player".to_string(),
            solver: "/World/audio2face/BlendshapeSolve".to_string(),
            emotion: DEFAULT_A2E_INSTANCE.to_string(),
            stream_player: DEFAULT_STREAM_PLAYER_INSTANCE.to_string(),
        }
    }
}

impl Default for A2fConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8011".to_string(),
            install_path: default_install_path(),
            executable: DEFAULT_EXECUTABLE.to_string(),
            mark_scene: PathBuf::from("assets/mark_arkit_solved_default.usd"),
            streaming_scene: PathBuf::from("assets/mark_arkit_solved_streaming.usd"),
            poll_interval_ms: 500,
            startup_timeout_secs: 60,
            request_timeout_secs: 30,
            stream_port: 50051,
            default_fps: 60,
            shutdown_on_drop: false,
            pid_file: None,
            instances: InstanceConfig::default(),
        }
    }
}

impl A2fConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `A2F_URL` / `A2F_INSTALL_PATH` when set
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(ENV_URL) {
            self.base_url = url;
        }
        if let Ok(path) = std::env::var(ENV_INSTALL_PATH) {
            self.install_path = PathBuf::from(path);
        }
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Full path of the launcher script
    pub fn executable_path(&self) -> PathBuf {
        self.install_path.join(&self.executable)
    }

    pub fn pid_file(&self) -> PathBuf {
        self.pid_file
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("a2f-headless.pid"))
    }

    /// `host:port` of the streaming endpoint, derived from the REST host
    pub fn stream_addr(&self) -> Result<String> {
        let url = parse_base_url(&self.base_url)?;
        let host = url
            .host_str()
            .ok_or_else(|| config_error("base-url", "missing host"))?;
        Ok(format!("{host}:{}", self.stream_port))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        parse_base_url(&self.base_url)?;

        if self.install_path.as_os_str().is_empty() {
            return Err(config_error("install-path", "cannot be empty").into());
        }

        if self.executable.is_empty() {
            return Err(config_error("executable", "cannot be empty").into());
        }

        if self.poll_interval_ms == 0 {
            return Err(config_error("poll-interval-ms", "must be greater than 0").into());
        }

        if self.startup_timeout_secs == 0 {
            return Err(config_error("startup-timeout-secs", "must be greater than 0").into());
        }

        if self.poll_interval() > self.startup_timeout() {
            return Err(config_error(
                "poll-interval-ms",
                "must not exceed startup-timeout-secs",
            )
            .into());
        }

        if self.stream_port == 0 {
            return Err(config_error("stream-port", "must be greater than 0").into());
        }

        if self.default_fps == 0 {
            return Err(config_error("default-fps", "must be greater than 0").into());
        }

        for (field, value) in [
            ("instances.player", &self.instances.player),
            ("instances.solver", &self.instances.solver),
            ("instances.emotion", &self.instances.emotion),
            ("instances.stream-player", &self.instances.stream_player),
        ] {
            if value.is_empty() {
                return Err(config_error(field, "cannot be empty").into());
            }
        }

        Ok(())
    }

    /// Save configuration to file
    pub async fn save(&self, path: &Path) -> Result<()> {
        let toml_content = toml::to_string_pretty(self).map_err(|e| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        tokio::fs::write(path, toml_content)
            .await
            .map_err(|e| ConfigError::WriteFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        Ok(())
    }

    /// Load configuration from file
    pub async fn load(path: &Path) -> Result<Self> {
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|_| ConfigError::FileNotFound {
                    path: path.to_path_buf(),
                })?;

        let config: A2fConfig = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = raw
        .parse::<Url>()
        .map_err(|e| config_error("base-url", &e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(config_error("base-url", "scheme must be http or https").into());
    }
    Ok(url)
}

/// Standard per-user install location of Audio2Face 2023.1.1
fn default_install_path() -> PathBuf {
    let base = std::env::var_os("LOCALAPPDATA")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/share")))
        .unwrap_or_default();
    base.join("ov/pkg/audio2face-2023.1.1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_are_valid() {
        let config = A2fConfig::default();
        config.validate().unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.startup_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn stream_addr_uses_rest_host() {
        let config = A2fConfig {
            base_url: "http://10.0.0.7:8011".to_string(),
            ..A2fConfig::default()
        };
        assert_eq!(config.stream_addr().unwrap(), "10.0.0.7:50051");
    }

    #[test]
    fn rejects_bad_values() {
        let bad_url = A2fConfig {
            base_url: "ftp://localhost".to_string(),
            ..A2fConfig::default()
        };
        assert!(bad_url.validate().is_err());

        let bad_interval = A2fConfig {
            poll_interval_ms: 0,
            ..A2fConfig::default()
        };
        assert!(bad_interval.validate().is_err());

        let slow_poll = A2fConfig {
            poll_interval_ms: 5_000,
            startup_timeout_secs: 1,
            ..A2fConfig::default()
        };
        assert!(slow_poll.validate().is_err());
    }

    #[tokio::test]
    async fn save_then_load_preserves_overrides() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a2f.toml");
        let config = A2fConfig {
            base_url: "http://127.0.0.1:9000".to_string(),
            stream_port: 6000,
            ..A2fConfig::default()
        };

        config.save(&path).await.unwrap();
        let loaded = A2fConfig::load(&path).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let dir = tempdir().unwrap();
        let err = A2fConfig::load(&dir.path().join("nope.toml"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::A2fError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
