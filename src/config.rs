use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Filesystem locations and discovery tuning shared by devices and virtual devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding `event<N>` nodes
    pub input_dir: PathBuf,
    /// uinput special file used to provision virtual devices
    pub uinput_path: PathBuf,
    /// Root of the kernel's sysfs mount
    pub sysfs_dir: PathBuf,
    /// How many times to look for a freshly created device node
    pub discovery_attempts: u32,
    /// Base delay between discovery attempts; attempt n waits n times this
    pub discovery_delay_ms: u64,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("/dev/input"),
            uinput_path: PathBuf::from("/dev/uinput"),
            sysfs_dir: PathBuf::from("/sys"),
            discovery_attempts: 10,
            discovery_delay_ms: 50,
        }
    }
}
impl Config {
    /// Defaults overridden by any `EVDEVIO_*` environment variables that are set
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("EVDEVIO_INPUT_DIR") {
            config.input_dir = PathBuf::from(dir);
        }
        if let Ok(path) = std::env::var("EVDEVIO_UINPUT_PATH") {
            config.uinput_path = PathBuf::from(path);
        }
        if let Ok(dir) = std::env::var("EVDEVIO_SYSFS_DIR") {
            config.sysfs_dir = PathBuf::from(dir);
        }
        if let Some(n) = env_number("EVDEVIO_DISCOVERY_ATTEMPTS") {
            config.discovery_attempts = n as u32;
        }
        if let Some(ms) = env_number("EVDEVIO_DISCOVERY_DELAY_MS") {
            config.discovery_delay_ms = ms;
        }

        config
    }

    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Sleep before discovery attempt `attempt` (zero-based)
    pub fn discovery_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.discovery_delay_ms.saturating_mul(attempt as u64))
    }
}

fn env_number(key: &str) -> Option<u64> {
    let value = std::env::var(key).ok()?;
    match value.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not a number", key, value);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = Config::from_json(r#"{ "input_dir": "/tmp/input", "discovery_attempts": 3 }"#)
            .unwrap();
        assert_eq!(config.input_dir, PathBuf::from("/tmp/input"));
        assert_eq!(config.discovery_attempts, 3);
        assert_eq!(config.uinput_path, PathBuf::from("/dev/uinput"));
        assert_eq!(config.discovery_delay_ms, 50);
    }

    #[test]
    fn test_linear_backoff() {
        let config = Config::default();
        assert_eq!(config.discovery_delay(0), Duration::ZERO);
        assert_eq!(config.discovery_delay(3), Duration::from_millis(150));
    }
}
