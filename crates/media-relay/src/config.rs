//! Pipeline configuration.
//!
//! Values come from (lowest to highest precedence) built-in defaults, an
//! optional TOML file and the `MEDIA_DIR`, `FFMPEG_PATH` and `FFPROBE_PATH`
//! environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::media::TranscodeSpec;
use crate::{Error, Result};

/// Browser user agent sent on media downloads and stream remuxing.
pub const DEFAULT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// User agent sent to metadata (JSON API) endpoints.
pub const DEFAULT_METADATA_UA: &str = concat!("media-relay/", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_METADATA_BASE_URL: &str = "https://www.reddit.com";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Directory every fetched and transcoded file is written to.
    pub media_dir: PathBuf,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub user_agent: String,
    pub metadata_user_agent: String,
    /// Base URL of the platform's JSON API.
    pub metadata_base_url: String,
    /// Per-request timeout; 0 disables it.
    pub request_timeout_secs: u64,
    pub transcode: TranscodeSpec,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            media_dir: PathBuf::from("media"),
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            user_agent: DEFAULT_UA.to_string(),
            metadata_user_agent: DEFAULT_METADATA_UA.to_string(),
            metadata_base_url: DEFAULT_METADATA_BASE_URL.to_string(),
            request_timeout_secs: 0,
            transcode: TranscodeSpec::default(),
        }
    }
}

impl RelayConfig {
    /// Load configuration from an optional TOML file, then apply environment
    /// overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::io_path("reading config", path, e))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::config(format!("invalid TOML: {e}")))
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = non_empty("MEDIA_DIR") {
            debug!(media_dir = %dir, "MEDIA_DIR override");
            self.media_dir = PathBuf::from(dir);
        }
        if let Some(path) = non_empty("FFMPEG_PATH") {
            self.ffmpeg_path = path;
        }
        if let Some(path) = non_empty("FFPROBE_PATH") {
            self.ffprobe_path = path;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let spec = &self.transcode;
        if !(spec.max_duration_secs.is_finite() && spec.max_duration_secs > 0.0) {
            return Err(Error::config("transcode.max_duration_secs must be positive"));
        }
        if spec.max_output_size_bytes == 0 {
            return Err(Error::config("transcode.max_output_size_bytes must be positive"));
        }
        if spec.fallback_bitrate >= spec.target_bitrate {
            return Err(Error::config(format!(
                "transcode.fallback_bitrate ({}) must be lower than target_bitrate ({})",
                spec.fallback_bitrate, spec.target_bitrate
            )));
        }
        if self.media_dir.as_os_str().is_empty() {
            return Err(Error::config("media_dir must not be empty"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}
