//! # Media Relay
//!
//! Acquisition and normalization of social-media content for re-upload.
//!
//! A [`ContentReference`] is classified by URL shape into a [`MediaKind`],
//! downloaded by the matching fetcher into a shared media directory, and,
//! for videos, re-encoded by the [`Transcoder`] to fit destination limits.
//!
//! ## Features
//!
//! - Static images and multi-item galleries
//! - Platform-hosted adaptive video (HLS remux, or split DASH tracks muxed together)
//! - Progressive direct video downloads
//! - H.264/AAC normalization with a single fallback-bitrate retry
//! - Injected HTTP, metadata and process capabilities for testing with fakes
//!
//! ## License
//!
//! MIT OR Apache-2.0

pub mod classifier;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod fs;
pub mod http;
pub mod media;
pub mod metadata;
pub mod pipeline;
pub mod process;
pub mod transcode;

#[cfg(test)]
mod testing;

pub use classifier::classify;
pub use config::RelayConfig;
pub use error::{Error, Result, Stage};
pub use http::{HttpClient, ReqwestHttpClient};
pub use media::{
    Bitrate, ContentReference, FetchResult, MediaKind, TranscodeResult, TranscodeSpec,
};
pub use metadata::{RedditVideoMetadata, VideoMetadata, VideoMetadataSource};
pub use pipeline::{Capabilities, MediaPipeline, PipelineState, Processed};
pub use process::{CommandRunner, ProcessOutput, ProcessRunner};
pub use transcode::Transcoder;
