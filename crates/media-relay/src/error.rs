//! Pipeline error types.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::media::ContentReference;

/// Pipeline-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Classify,
    Image,
    Gallery,
    NativeVideo,
    DirectVideo,
    Transcode,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classify => "classify",
            Self::Image => "image",
            Self::Gallery => "gallery",
            Self::NativeVideo => "native_video",
            Self::DirectVideo => "direct_video",
            Self::Transcode => "transcode",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline error type.
///
/// Each variant carries enough context (stage, content id, URL or path) for
/// a scheduler to log the failure and move on to the next item.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported format for {id}: {url}")]
    UnsupportedFormat { id: String, url: String },

    #[error("[{stage}] fetch failed for {id} ({url}): {reason}")]
    FetchFailed {
        stage: Stage,
        id: String,
        url: String,
        reason: String,
    },

    #[error("[{stage}] metadata unavailable for {id} ({url}): {reason}")]
    MetadataUnavailable {
        stage: Stage,
        id: String,
        url: String,
        reason: String,
    },

    #[error("Gallery {id} contains no items ({url})")]
    EmptyGallery { id: String, url: String },

    #[error("Transcode failed for {}: {reason}", path.display())]
    TranscodeFailed { path: PathBuf, reason: String },

    #[error("IO error while {op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Error {
    pub fn unsupported(reference: &ContentReference) -> Self {
        Self::UnsupportedFormat {
            id: reference.id().to_string(),
            url: reference.url().to_string(),
        }
    }

    pub fn fetch_failed(
        stage: Stage,
        reference: &ContentReference,
        reason: impl Into<String>,
    ) -> Self {
        Self::FetchFailed {
            stage,
            id: reference.id().to_string(),
            url: reference.url().to_string(),
            reason: reason.into(),
        }
    }

    pub fn metadata_unavailable(
        stage: Stage,
        reference: &ContentReference,
        reason: impl Into<String>,
    ) -> Self {
        Self::MetadataUnavailable {
            stage,
            id: reference.id().to_string(),
            url: reference.url().to_string(),
            reason: reason.into(),
        }
    }

    pub fn empty_gallery(reference: &ContentReference) -> Self {
        Self::EmptyGallery {
            id: reference.id().to_string(),
            url: reference.url().to_string(),
        }
    }

    pub fn transcode_failed(path: &Path, reason: impl Into<String>) -> Self {
        Self::TranscodeFailed {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn io_path(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// The stage this error was raised in, when it belongs to one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::UnsupportedFormat { .. } => Some(Stage::Classify),
            Self::FetchFailed { stage, .. } | Self::MetadataUnavailable { stage, .. } => {
                Some(*stage)
            }
            Self::EmptyGallery { .. } => Some(Stage::Gallery),
            Self::TranscodeFailed { .. } => Some(Stage::Transcode),
            Self::Io { .. } | Self::Configuration(_) => None,
        }
    }

    /// Whether a later cycle may reasonably try the same content again.
    ///
    /// Only transport-level fetch failures qualify; everything else is
    /// permanent for the content item.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::FetchFailed { .. })
    }
}
