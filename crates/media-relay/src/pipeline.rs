//! The fetch dispatcher: classify, fetch, and (for video) transcode.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::classifier::classify;
use crate::config::RelayConfig;
use crate::fetcher::{
    DirectVideoFetcher, FetchContext, Fetcher, GalleryFetcher, ImageFetcher, NativeVideoFetcher,
};
use crate::fs::{ensure_dir_all, non_empty_size};
use crate::http::{HttpClient, ReqwestHttpClient};
use crate::media::{ContentReference, FetchResult, MediaKind, TranscodeResult, TranscodeSpec};
use crate::metadata::{RedditVideoMetadata, VideoMetadataSource};
use crate::process::{CommandRunner, ProcessRunner};
use crate::transcode::Transcoder;
use crate::{Error, Result, Stage};

/// Injected capabilities. Nothing in the pipeline reaches for a global client.
#[derive(Clone)]
pub struct Capabilities {
    pub http: Arc<dyn HttpClient>,
    pub video_metadata: Arc<dyn VideoMetadataSource>,
    pub process: Arc<dyn ProcessRunner>,
}

impl Capabilities {
    /// Production capabilities: reqwest, the public post JSON and real child processes.
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let http: Arc<dyn HttpClient> = Arc::new(
            ReqwestHttpClient::new(config.request_timeout())
                .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?,
        );
        let video_metadata = Arc::new(RedditVideoMetadata::new(
            http.clone(),
            config.metadata_base_url.clone(),
            config.metadata_user_agent.clone(),
        ));
        Ok(Self {
            http,
            video_metadata,
            process: Arc::new(CommandRunner),
        })
    }
}

/// Where a single item is in the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Classified(MediaKind),
    Fetching(MediaKind),
    Transcoding,
    Done,
    Failed(Option<Stage>),
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classified(kind) => write!(f, "classified({kind})"),
            Self::Fetching(kind) => write!(f, "fetching({kind})"),
            Self::Transcoding => f.write_str("transcoding"),
            Self::Done => f.write_str("done"),
            Self::Failed(Some(stage)) => write!(f, "failed({stage})"),
            Self::Failed(None) => f.write_str("failed"),
        }
    }
}

/// Output of [`MediaPipeline::process`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Processed {
    pub fetch: FetchResult,
    /// Present only for video kinds.
    pub transcode: Option<TranscodeResult>,
}

impl Processed {
    /// The file a caller should upload: the transcoded output when there is one.
    pub fn upload_path(&self) -> &Path {
        self.transcode
            .as_ref()
            .map(|t| t.path.as_path())
            .unwrap_or(self.fetch.primary_path.as_path())
    }
}

/// Acquisition and normalization pipeline over one media directory.
///
/// Each call handles one content reference with no automatic retries beyond
/// the bounded ones inside the native video fetcher and the transcoder.
/// Files are namespaced by content id, so independent references may be
/// processed concurrently (see [`MediaPipeline::acquire_all`]).
pub struct MediaPipeline {
    media_dir: PathBuf,
    spec: TranscodeSpec,
    image: ImageFetcher,
    gallery: GalleryFetcher,
    native_video: NativeVideoFetcher,
    direct_video: DirectVideoFetcher,
    transcoder: Transcoder,
}

impl MediaPipeline {
    pub fn new(config: &RelayConfig, caps: Capabilities) -> Self {
        let ctx = FetchContext {
            http: caps.http,
            media_dir: config.media_dir.clone(),
            user_agent: config.user_agent.clone(),
            metadata_user_agent: config.metadata_user_agent.clone(),
        };

        Self {
            media_dir: config.media_dir.clone(),
            spec: config.transcode.clone(),
            image: ImageFetcher::new(ctx.clone()),
            gallery: GalleryFetcher::new(ctx.clone()),
            native_video: NativeVideoFetcher::new(
                ctx.clone(),
                caps.video_metadata,
                caps.process.clone(),
                config.ffmpeg_path.clone(),
            ),
            direct_video: DirectVideoFetcher::new(ctx),
            transcoder: Transcoder::new(
                caps.process,
                config.ffmpeg_path.clone(),
                config.ffprobe_path.clone(),
            ),
        }
    }

    /// Build a pipeline with production capabilities.
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        Ok(Self::new(config, Capabilities::from_config(config)?))
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    /// The configured transcode limits.
    pub fn transcode_spec(&self) -> &TranscodeSpec {
        &self.spec
    }

    fn fetcher_for(&self, kind: MediaKind) -> Option<&dyn Fetcher> {
        match kind {
            MediaKind::StaticImage => Some(&self.image),
            MediaKind::Gallery => Some(&self.gallery),
            MediaKind::NativeVideo => Some(&self.native_video),
            MediaKind::DirectVideo => Some(&self.direct_video),
            MediaKind::Unrecognized => None,
        }
    }

    fn fail<T>(reference: &ContentReference, err: Error) -> Result<T> {
        warn!(
            id = reference.id(),
            url = reference.url(),
            state = %PipelineState::Failed(err.stage()),
            error = %err,
            "acquisition failed"
        );
        Err(err)
    }

    /// Classify `reference` and download it with the matching fetcher.
    ///
    /// Unrecognized URLs fail with [`Error::UnsupportedFormat`] before any
    /// network access. Every returned path points at a readable, non-empty file.
    pub async fn acquire(&self, reference: &ContentReference) -> Result<FetchResult> {
        let kind = classify(reference.url());
        debug!(id = reference.id(), state = %PipelineState::Classified(kind), "classified");

        let Some(fetcher) = self.fetcher_for(kind) else {
            return Self::fail(reference, Error::unsupported(reference));
        };

        if let Err(e) = ensure_dir_all(&self.media_dir).await {
            return Self::fail(reference, e);
        }

        debug!(id = reference.id(), state = %PipelineState::Fetching(kind), "fetching");
        let result = match fetcher.fetch(reference).await {
            Ok(result) => result,
            Err(e) => return Self::fail(reference, e),
        };

        for path in &result.local_paths {
            if non_empty_size(path).await.is_none() {
                let err = Error::fetch_failed(
                    fetcher.stage(),
                    reference,
                    format!("{} is missing or empty after fetch", path.display()),
                );
                return Self::fail(reference, err);
            }
        }

        info!(
            id = reference.id(),
            kind = %result.kind,
            files = result.local_paths.len(),
            primary = %result.primary_path.display(),
            "acquired"
        );
        Ok(result)
    }

    /// Normalize a local video file against `spec`.
    pub async fn normalize(&self, path: &Path, spec: &TranscodeSpec) -> Result<TranscodeResult> {
        debug!(path = %path.display(), state = %PipelineState::Transcoding, "normalizing");
        self.transcoder.normalize(path, spec).await
    }

    /// `acquire`, then `normalize` with the configured limits for video kinds.
    pub async fn process(&self, reference: &ContentReference) -> Result<Processed> {
        let fetch = self.acquire(reference).await?;
        let transcode = if fetch.kind.is_video() {
            match self.normalize(&fetch.primary_path, &self.spec).await {
                Ok(result) => Some(result),
                Err(e) => return Self::fail(reference, e),
            }
        } else {
            None
        };

        info!(id = reference.id(), state = %PipelineState::Done, "processed");
        Ok(Processed { fetch, transcode })
    }

    /// Acquire many references with at most `concurrency` in flight.
    ///
    /// Results are returned in input order; one failure does not affect the others.
    pub async fn acquire_all(
        &self,
        references: &[ContentReference],
        concurrency: usize,
    ) -> Vec<Result<FetchResult>> {
        let mut results: Vec<(usize, Result<FetchResult>)> =
            stream::iter(references.iter().enumerate())
                .map(|(index, reference)| async move { (index, self.acquire(reference).await) })
                .buffer_unordered(concurrency.max(1))
                .collect()
                .await;
        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }
}
