//! bgd.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// File name looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "bgd.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BgdConfig {
    pub platform: PlatformConfig,
    pub smoke_test: SmokeTestConfig,
    pub manifest: ManifestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Executable used to talk to the platform.
    pub cf_binary: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            cf_binary: "cf".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SmokeTestConfig {
    /// Maximum run time, e.g. "90s" or "5m". Unbounded when absent.
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    pub on_error: ManifestErrorPolicy,
}

/// What a deploy does when the manifest cannot be read or is invalid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestErrorPolicy {
    /// Log a warning and deploy with live-app and platform defaults.
    #[default]
    Warn,
    /// Fail the deploy before anything is pushed.
    Abort,
}

impl BgdConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BgdConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `path` if given, else `bgd.toml` when it exists, else defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn smoke_test_timeout(&self) -> anyhow::Result<Option<Duration>> {
        self.smoke_test
            .timeout
            .as_deref()
            .map(|raw| {
                parse_duration(raw)
                    .ok_or_else(|| anyhow::anyhow!("invalid smoke test timeout: {raw}"))
            })
            .transpose()
    }
}

/// Parse "500ms", "30s", "5m", "1h" or a plain number of seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else if let Some(hours) = s.strip_suffix('h') {
        hours
            .parse::<u64>()
            .ok()
            .and_then(|h| h.checked_mul(3600))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
