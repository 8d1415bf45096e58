//! Core data types shared by the fetchers, the transcoder and callers.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A reference to remotely hosted content.
///
/// `id` is a stable caller-supplied identifier (usually the source post id)
/// and namespaces every file written for this reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentReference {
    url: String,
    id: String,
}

impl ContentReference {
    pub fn new(url: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            id: id.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Fetch strategy, derived purely from the shape of a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    StaticImage,
    Gallery,
    NativeVideo,
    DirectVideo,
    Unrecognized,
}

impl MediaKind {
    /// Whether results of this kind go through the transcoder.
    pub fn is_video(&self) -> bool {
        matches!(self, Self::NativeVideo | Self::DirectVideo)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StaticImage => "static_image",
            Self::Gallery => "gallery",
            Self::NativeVideo => "native_video",
            Self::DirectVideo => "direct_video",
            Self::Unrecognized => "unrecognized",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Files produced by a successful fetch.
///
/// Every path in `local_paths` pointed at an existing, non-empty file when the
/// result was handed out; `primary_path` is always one of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchResult {
    pub kind: MediaKind,
    pub local_paths: Vec<PathBuf>,
    pub primary_path: PathBuf,
}

impl FetchResult {
    /// Single-file result.
    pub fn single(kind: MediaKind, path: PathBuf) -> Self {
        Self {
            kind,
            local_paths: vec![path.clone()],
            primary_path: path,
        }
    }

    /// Multi-file result whose primary path is the first entry.
    ///
    /// Returns `None` when `paths` is empty.
    pub fn from_paths(kind: MediaKind, paths: Vec<PathBuf>) -> Option<Self> {
        let primary_path = paths.first()?.clone();
        Some(Self {
            kind,
            local_paths: paths,
            primary_path,
        })
    }
}

/// A video bitrate in bits per second.
///
/// Parses from and renders to the ffmpeg notation (`2M`, `1500k`, `800000`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "BitrateRepr", into = "String")]
pub struct Bitrate(u64);

impl Bitrate {
    pub const fn from_bps(bps: u64) -> Self {
        Self(bps)
    }

    pub const fn from_kbps(kbps: u64) -> Self {
        Self(kbps * 1_000)
    }

    pub const fn from_mbps(mbps: u64) -> Self {
        Self(mbps * 1_000_000)
    }

    pub fn bps(&self) -> u64 {
        self.0
    }

    /// Value for ffmpeg's `-b:v` option.
    pub fn to_ffmpeg_arg(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 1_000_000 && self.0 % 1_000_000 == 0 {
            write!(f, "{}M", self.0 / 1_000_000)
        } else if self.0 >= 1_000 && self.0 % 1_000 == 0 {
            write!(f, "{}k", self.0 / 1_000)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl FromStr for Bitrate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (digits, multiplier) = match s.chars().last() {
            Some('M' | 'm') => (&s[..s.len() - 1], 1_000_000),
            Some('K' | 'k') => (&s[..s.len() - 1], 1_000),
            _ => (s, 1),
        };
        let value: u64 = digits
            .trim()
            .parse()
            .map_err(|_| format!("invalid bitrate: {s:?}"))?;
        if value == 0 {
            return Err(format!("bitrate must be positive: {s:?}"));
        }
        value
            .checked_mul(multiplier)
            .map(Self)
            .ok_or_else(|| format!("bitrate out of range: {s:?}"))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BitrateRepr {
    Bits(u64),
    Text(String),
}

impl TryFrom<BitrateRepr> for Bitrate {
    type Error = String;

    fn try_from(repr: BitrateRepr) -> Result<Self, Self::Error> {
        match repr {
            BitrateRepr::Bits(0) => Err("bitrate must be positive".to_string()),
            BitrateRepr::Bits(bps) => Ok(Self(bps)),
            BitrateRepr::Text(text) => text.parse(),
        }
    }
}

impl From<Bitrate> for String {
    fn from(bitrate: Bitrate) -> Self {
        bitrate.to_string()
    }
}

/// Destination-platform constraints for video normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeSpec {
    /// Longer inputs are trimmed to this many seconds before encoding.
    pub max_duration_secs: f64,
    /// Output size above which a single re-encode at `fallback_bitrate` runs.
    pub max_output_size_bytes: u64,
    pub target_bitrate: Bitrate,
    pub fallback_bitrate: Bitrate,
}

impl Default for TranscodeSpec {
    fn default() -> Self {
        Self {
            max_duration_secs: 140.0,
            max_output_size_bytes: 512 * 1024 * 1024,
            target_bitrate: Bitrate::from_mbps(2),
            fallback_bitrate: Bitrate::from_mbps(1),
        }
    }
}

/// A normalized video ready for upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscodeResult {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub used_fallback_bitrate: bool,
}

impl TranscodeResult {
    pub fn path(&self) -> &Path {
        &self.path
    }
}
