use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;

pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["config.yml", "config.yaml"];

/// Runtime settings, read from an optional yaml file. Every field has a default so
/// the file only needs the keys that differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File holding the StreamElements JWT and the twitch token pair
    pub credentials_path: PathBuf,
    /// Delay between two iterations of the playback poller
    pub poll_interval_secs: u64,
    /// Delay between noticing that playback stopped and pressing play/pause
    pub toggle_delay_secs: u64,
    /// Chat message understood by the StreamElements bot to advance the queue
    pub skip_command: String,
    /// Announcement sent to chat once the bridge is connected
    pub connect_message: String,
    /// Local port the twitch OAuth redirect lands on
    pub redirect_port: u16,
    /// How long before expiry the twitch access token is refreshed
    pub refresh_margin_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("MediashareAutoskip.yml"),
            poll_interval_secs: 3,
            toggle_delay_secs: 1,
            skip_command: String::from("!skip"),
            connect_message: String::from("Mediashare autoskip connected to chat"),
            redirect_port: 17563,
            refresh_margin_secs: 60,
        }
    }
}

impl Config {
    /// Load the first file in `paths` that exists, or the defaults if none do
    pub fn load_with_fallback<P: AsRef<Path>, I: IntoIterator<Item = P>>(
        paths: I,
    ) -> Result<Self, Error> {
        match paths.into_iter().find(|p| p.as_ref().exists()) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let config_file = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(config_file.as_str())?;
        log::debug!("Loaded settings from {}", path.display());
        config.validate()
    }

    fn validate(self) -> Result<Self, Error> {
        if self.skip_command.trim().is_empty() {
            return Err(Error::Config("`skip_command` must not be empty".into()));
        }
        if self.poll_interval_secs == 0 {
            return Err(Error::Config("`poll_interval_secs` must be at least 1".into()));
        }
        Ok(self)
    }

    pub fn with_credentials_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.credentials_path = path.into();
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn toggle_delay(&self) -> Duration {
        Duration::from_secs(self.toggle_delay_secs)
    }

    pub fn refresh_margin(&self) -> Duration {
        Duration::from_secs(self.refresh_margin_secs)
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}", self.redirect_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: Config = serde_yaml::from_str("poll_interval_secs: 5\nskip_command: '!next'").unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.skip_command, "!next");
        assert_eq!(config.toggle_delay(), Duration::from_secs(1));
        assert_eq!(config.redirect_uri(), "http://localhost:17563");
    }

    #[test]
    fn missing_files_fall_back_to_defaults() {
        let config = Config::load_with_fallback(["does-not-exist.yml"]).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn empty_skip_command_is_rejected() {
        let path = std::env::temp_dir().join(format!("{}.yml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "skip_command: ' '").unwrap();
        let result = Config::load(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
