use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempPath;
use tracing::{debug, info, warn};

use super::audio::{CandidateFn, DEFAULT_CANDIDATES, audio_candidates, find_audio_track};
use super::{FetchContext, Fetcher};
use crate::fs::{non_empty_size, persist, remove_if_exists, scratch_file};
use crate::media::{ContentReference, FetchResult, MediaKind};
use crate::metadata::VideoMetadataSource;
use crate::process::ProcessRunner;
use crate::{Error, Result, Stage};

/// Fetches platform-hosted adaptive video into `{id}.mp4`.
///
/// Strategy, each step falling through to the next:
/// 1. remux the combined HLS stream (stream copy);
/// 2. download the progressive video-only rendition, probe sibling URLs for
///    its audio track and mux both;
/// 3. if muxing fails or no audio exists, keep the video-only download.
///
/// Intermediate files are `{id}_temp_*` scratch files which are removed on
/// every exit path, including cancellation.
pub struct NativeVideoFetcher {
    ctx: FetchContext,
    metadata: Arc<dyn VideoMetadataSource>,
    runner: Arc<dyn ProcessRunner>,
    ffmpeg_path: String,
    audio_generators: Vec<CandidateFn>,
}

impl NativeVideoFetcher {
    pub fn new(
        ctx: FetchContext,
        metadata: Arc<dyn VideoMetadataSource>,
        runner: Arc<dyn ProcessRunner>,
        ffmpeg_path: impl Into<String>,
    ) -> Self {
        Self {
            ctx,
            metadata,
            runner,
            ffmpeg_path: ffmpeg_path.into(),
            audio_generators: DEFAULT_CANDIDATES.to_vec(),
        }
    }

    /// Replace the audio candidate generators.
    pub fn with_audio_generators(mut self, generators: Vec<CandidateFn>) -> Self {
        self.audio_generators = generators;
        self
    }

    fn hls_remux_args(&self, stream_url: &str, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-headers".to_string(),
            format!("User-Agent: {}\r\n", self.ctx.user_agent),
            "-i".to_string(),
            stream_url.to_string(),
            "-c".to_string(),
            "copy".to_string(),
            "-bsf:a".to_string(),
            "aac_adtstoasc".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }

    fn mux_args(video: &Path, audio: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-i".to_string(),
            video.to_string_lossy().to_string(),
            "-i".to_string(),
            audio.to_string_lossy().to_string(),
            "-map".to_string(),
            "0:v:0".to_string(),
            "-map".to_string(),
            "1:a:0".to_string(),
            "-c:v".to_string(),
            "copy".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-shortest".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }

    /// Run ffmpeg and require a non-empty output.
    async fn run_ffmpeg(&self, args: &[String], output: &Path) -> std::result::Result<(), String> {
        let result = self
            .runner
            .run(&self.ffmpeg_path, args)
            .await
            .map_err(|e| format!("failed to run {}: {e}", self.ffmpeg_path))?;
        if !result.success() {
            warn!(stderr = %result.stderr.trim(), "ffmpeg failed");
            return Err(result.describe_failure());
        }
        if non_empty_size(output).await.is_none() {
            return Err("ffmpeg produced no output".to_string());
        }
        Ok(())
    }

    /// Step 1: stream-copy the combined playlist.
    async fn fetch_stream(
        &self,
        reference: &ContentReference,
        stream_url: &str,
        final_path: &Path,
    ) -> std::result::Result<(), String> {
        let scratch = scratch_file(&self.ctx.media_dir, reference.id(), "stream", "mp4")
            .await
            .map_err(|e| e.to_string())?;
        debug!(id = reference.id(), stream_url, "remuxing adaptive stream");

        self.run_ffmpeg(&self.hls_remux_args(stream_url, &scratch), &scratch)
            .await?;
        persist(scratch, final_path).map_err(|e| format!("persist failed: {e}"))
    }

    /// Steps 2 and 3: progressive video, optional audio, mux or passthrough.
    async fn fetch_split_tracks(
        &self,
        reference: &ContentReference,
        video_url: &str,
        final_path: &Path,
    ) -> Result<()> {
        let failed = |reason: String| Error::fetch_failed(Stage::NativeVideo, reference, reason);
        let dir = &self.ctx.media_dir;

        let video = scratch_file(dir, reference.id(), "video", "mp4").await?;
        let outcome = self
            .ctx
            .http
            .download(video_url, &self.ctx.ua_header(), &video)
            .await
            .map_err(|e| failed(format!("{video_url}: {e}")))?;
        if !outcome.is_success() {
            return Err(failed(format!("{video_url}: HTTP {}", outcome.status)));
        }
        if non_empty_size(&video).await.is_none() {
            return Err(failed(format!("{video_url}: empty video track")));
        }

        let audio = scratch_file(dir, reference.id(), "audio", "mp4").await?;
        let candidates = audio_candidates(video_url, &self.audio_generators);
        let audio_url = find_audio_track(
            self.ctx.http.as_ref(),
            &candidates,
            &self.ctx.ua_header(),
            &audio,
        )
        .await;

        let chosen = match audio_url {
            Some(audio_url) => {
                debug!(id = reference.id(), %audio_url, "muxing audio track");
                match self.mux(reference, &video, &audio).await {
                    Ok(muxed) => muxed,
                    Err(reason) => {
                        warn!(
                            id = reference.id(),
                            %reason,
                            "mux failed, keeping video-only track"
                        );
                        video
                    }
                }
            }
            None => {
                info!(
                    id = reference.id(),
                    tried = candidates.len(),
                    "no audio track found, keeping video-only track"
                );
                video
            }
        };

        persist(chosen, final_path)
            .map_err(|e| Error::io_path("moving video into place", final_path, e))
        // `audio` (and `video` when muxed) are dropped and deleted here
    }

    async fn mux(
        &self,
        reference: &ContentReference,
        video: &Path,
        audio: &Path,
    ) -> std::result::Result<TempPath, String> {
        let muxed = scratch_file(&self.ctx.media_dir, reference.id(), "mux", "mp4")
            .await
            .map_err(|e| e.to_string())?;
        self.run_ffmpeg(&Self::mux_args(video, audio, &muxed), &muxed)
            .await?;
        Ok(muxed)
    }

    fn final_path(&self, reference: &ContentReference) -> PathBuf {
        self.ctx.output_path(&format!("{}.mp4", reference.id()))
    }
}

#[async_trait]
impl Fetcher for NativeVideoFetcher {
    fn stage(&self) -> Stage {
        Stage::NativeVideo
    }

    async fn fetch(&self, reference: &ContentReference) -> Result<FetchResult> {
        let final_path = self.final_path(reference);
        let metadata = self.metadata.video_metadata(reference).await?;

        let mut fetched = false;
        if let Some(stream_url) = metadata.hls_url.as_deref() {
            match self.fetch_stream(reference, stream_url, &final_path).await {
                Ok(()) => {
                    info!(id = reference.id(), path = %final_path.display(), "adaptive stream remuxed");
                    fetched = true;
                }
                Err(reason) => {
                    warn!(id = reference.id(), %reason, "adaptive stream failed, trying split tracks");
                }
            }
        }

        if !fetched {
            let video_url = metadata.fallback_url.as_deref().ok_or_else(|| {
                Error::fetch_failed(
                    Stage::NativeVideo,
                    reference,
                    "no usable stream and no fallback url",
                )
            })?;
            self.fetch_split_tracks(reference, video_url, &final_path)
                .await?;
        }

        match non_empty_size(&final_path).await {
            Some(size) => {
                info!(id = reference.id(), path = %final_path.display(), size, "native video fetched");
                Ok(FetchResult::single(MediaKind::NativeVideo, final_path))
            }
            None => {
                remove_if_exists(&final_path).await;
                Err(Error::fetch_failed(
                    Stage::NativeVideo,
                    reference,
                    "final output missing or empty",
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::VideoMetadata;
    use crate::testing::{FakeHttp, FakeMetadata, FakeRun, FakeRunner, list_dir};
    use tempfile::TempDir;

    const VIDEO_URL: &str = "https://v.redd.it/abc/DASH_720.mp4?source=fallback";
    const AUDIO_URL: &str = "https://v.redd.it/abc/DASH_audio.mp4";
    const HLS_URL: &str = "https://v.redd.it/abc/HLSPlaylist.m3u8?a=1&v=1";

    struct Harness {
        dir: TempDir,
        http: Arc<FakeHttp>,
        runner: Arc<FakeRunner>,
    }

    impl Harness {
        fn new(runner: FakeRunner) -> Self {
            Self {
                dir: TempDir::new().unwrap(),
                http: Arc::new(FakeHttp::new()),
                runner: Arc::new(runner),
            }
        }

        fn fetcher(&self, metadata: FakeMetadata) -> NativeVideoFetcher {
            NativeVideoFetcher::new(
                FetchContext {
                    http: self.http.clone(),
                    media_dir: self.dir.path().to_path_buf(),
                    user_agent: "relay-ua".to_string(),
                    metadata_user_agent: "meta-ua".to_string(),
                },
                Arc::new(metadata),
                self.runner.clone(),
                "ffmpeg",
            )
        }

        fn files(&self) -> Vec<String> {
            list_dir(self.dir.path())
        }
    }

    fn reference() -> ContentReference {
        ContentReference::new("https://v.redd.it/abc", "post1")
    }

    fn split_only() -> FakeMetadata {
        FakeMetadata::new(VideoMetadata {
            hls_url: None,
            fallback_url: Some(VIDEO_URL.to_string()),
        })
    }

    fn both() -> FakeMetadata {
        FakeMetadata::new(VideoMetadata {
            hls_url: Some(HLS_URL.to_string()),
            fallback_url: Some(VIDEO_URL.to_string()),
        })
    }

    #[tokio::test]
    async fn test_adaptive_stream_success() {
        let h = Harness::new(FakeRunner::writing(2048));
        let result = h.fetcher(both()).fetch(&reference()).await.unwrap();

        assert_eq!(result.kind, MediaKind::NativeVideo);
        assert_eq!(result.primary_path, h.dir.path().join("post1.mp4"));
        assert_eq!(h.files(), ["post1.mp4"]);
        assert!(h.http.requests().is_empty());

        let calls = h.runner.ffmpeg_calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].contains(&HLS_URL.to_string()));
        assert!(calls[0].contains(&"User-Agent: relay-ua\r\n".to_string()));
        assert!(calls[0].windows(2).any(|w| w == ["-c", "copy"]));
    }

    #[tokio::test]
    async fn test_stream_fails_no_audio_keeps_video_only() {
        let h = Harness::new(FakeRunner::writing(2048).then(FakeRun::Fail("403 Forbidden")));
        h.http.respond(VIDEO_URL, 200, "video-bytes");

        let result = h.fetcher(both()).fetch(&reference()).await.unwrap();

        assert_eq!(std::fs::read(&result.primary_path).unwrap(), b"video-bytes");
        assert_eq!(h.files(), ["post1.mp4"]);
        // only the failed stream remux ran, no mux attempt
        assert_eq!(h.runner.ffmpeg_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_split_tracks_are_muxed() {
        let h = Harness::new(FakeRunner::writing(4096));
        h.http.respond(VIDEO_URL, 200, "video-bytes");
        h.http.respond(AUDIO_URL, 200, "audio-bytes");

        let result = h.fetcher(split_only()).fetch(&reference()).await.unwrap();

        assert_eq!(std::fs::metadata(&result.primary_path).unwrap().len(), 4096);
        assert_eq!(h.files(), ["post1.mp4"]);

        let calls = h.runner.ffmpeg_calls();
        assert_eq!(calls.len(), 1);
        let args = &calls[0];
        assert!(args.windows(2).any(|w| w == ["-c:v", "copy"]));
        assert!(args.windows(2).any(|w| w == ["-c:a", "aac"]));
        assert!(args.contains(&"-shortest".to_string()));
        assert!(args.iter().any(|a| a.ends_with("post1_temp_video.mp4")));
        assert!(args.iter().any(|a| a.ends_with("post1_temp_audio.mp4")));
    }

    #[tokio::test]
    async fn test_mux_failure_falls_back_to_video_only() {
        let h = Harness::new(FakeRunner::writing(4096).then(FakeRun::Fail("Invalid data")));
        h.http.respond(VIDEO_URL, 200, "video-bytes");
        h.http.respond(AUDIO_URL, 200, "audio-bytes");

        let result = h.fetcher(split_only()).fetch(&reference()).await.unwrap();

        assert_eq!(std::fs::read(&result.primary_path).unwrap(), b"video-bytes");
        assert_eq!(h.files(), ["post1.mp4"]);
    }

    #[tokio::test]
    async fn test_video_download_failure_leaves_nothing() {
        let h = Harness::new(FakeRunner::writing(4096).then(FakeRun::Fail("boom")));
        h.http.respond(VIDEO_URL, 404, "");

        let err = h.fetcher(both()).fetch(&reference()).await.unwrap_err();

        assert!(matches!(
            err,
            Error::FetchFailed {
                stage: Stage::NativeVideo,
                ..
            }
        ));
        assert!(h.files().is_empty());
    }

    #[tokio::test]
    async fn test_empty_video_download_fails() {
        let h = Harness::new(FakeRunner::writing(4096));
        h.http.respond(VIDEO_URL, 200, "");

        let err = h.fetcher(split_only()).fetch(&reference()).await.unwrap_err();
        assert!(err.to_string().contains("empty video track"));
        assert!(h.files().is_empty());
    }

    #[tokio::test]
    async fn test_metadata_unavailable_is_surfaced() {
        let h = Harness::new(FakeRunner::writing(4096));
        let err = h
            .fetcher(FakeMetadata::unavailable())
            .fetch(&reference())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MetadataUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_stream_failure_without_fallback() {
        let h = Harness::new(FakeRunner::writing(0));
        let metadata = FakeMetadata::new(VideoMetadata {
            hls_url: Some(HLS_URL.to_string()),
            fallback_url: None,
        });

        let err = h.fetcher(metadata).fetch(&reference()).await.unwrap_err();
        assert!(err.to_string().contains("no usable stream"));
        assert!(h.files().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_mux_leaves_no_files() {
        let h = Harness::new(FakeRunner::writing(4096).then(FakeRun::Hang));
        h.http.respond(VIDEO_URL, 200, "video-bytes");
        h.http.respond(AUDIO_URL, 200, "audio-bytes");
        let fetcher = h.fetcher(split_only());
        let reference = reference();

        let outcome = tokio::time::timeout(
            std::time::Duration::from_millis(200),
            fetcher.fetch(&reference),
        )
        .await;

        assert!(outcome.is_err(), "fetch should still be muxing");
        // the mux started with both tracks on disk
        let calls = h.runner.ffmpeg_calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].iter().any(|a| a.ends_with("post1_temp_audio.mp4")));
        assert!(h.files().is_empty());
    }
}
