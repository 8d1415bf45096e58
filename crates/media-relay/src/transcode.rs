//! Video normalization against destination-platform limits.
//!
//! The output is H.264/AAC in an MP4 container with `yuv420p` pixels and the
//! moov atom up front. Inputs longer than the duration ceiling are cut before
//! encoding. When the first encode exceeds the size ceiling the encoder runs
//! exactly once more at the fallback bitrate; the retry's size is not
//! checked again, so the result can still be over the limit.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::fs::{non_empty_size, persist, remove_if_exists, scratch_at};
use crate::media::{Bitrate, TranscodeResult, TranscodeSpec};
use crate::process::ProcessRunner;
use crate::{Error, Result};

/// Prefix of normalized output files, placed next to their input.
pub const OUTPUT_PREFIX: &str = "processed_";

pub struct Transcoder {
    runner: Arc<dyn ProcessRunner>,
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl Transcoder {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        ffmpeg_path: impl Into<String>,
        ffprobe_path: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Output location for `input`: `processed_{stem}.mp4` in the same directory.
    pub fn output_path_for(input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let parent = input.parent().unwrap_or_else(|| Path::new("."));
        parent.join(format!("{OUTPUT_PREFIX}{stem}.mp4"))
    }

    fn scratch_path_for(output: &Path, attempt: &str) -> PathBuf {
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        output.with_file_name(format!("{stem}_temp_{attempt}.mp4"))
    }

    /// Probe the container duration in seconds.
    pub async fn probe_duration(&self, input: &Path) -> Result<f64> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "default=noprint_wrappers=1:nokey=1".to_string(),
            input.to_string_lossy().to_string(),
        ];
        let output = self
            .runner
            .run(&self.ffprobe_path, &args)
            .await
            .map_err(|e| {
                Error::transcode_failed(input, format!("failed to run {}: {e}", self.ffprobe_path))
            })?;
        if !output.success() {
            return Err(Error::transcode_failed(
                input,
                format!("ffprobe {}", output.describe_failure()),
            ));
        }

        output
            .stdout
            .lines()
            .find_map(|line| line.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d >= 0.0)
            .ok_or_else(|| {
                Error::transcode_failed(
                    input,
                    format!("unparsable duration: {:?}", output.stdout.trim()),
                )
            })
    }

    /// Encoder arguments for one attempt.
    pub fn encode_args(
        input: &Path,
        output: &Path,
        bitrate: Bitrate,
        trim_to: Option<f64>,
    ) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
        ];
        if let Some(limit) = trim_to {
            args.extend(["-t".to_string(), format!("{limit:.3}")]);
        }
        args.extend([
            "-c:v".to_string(),
            "libx264".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:v".to_string(),
            bitrate.to_ffmpeg_arg(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            output.to_string_lossy().to_string(),
        ]);
        args
    }

    /// Run one encode into `scratch`; returns its size.
    async fn encode(
        &self,
        input: &Path,
        scratch: &Path,
        bitrate: Bitrate,
        trim_to: Option<f64>,
    ) -> Result<u64> {
        let args = Self::encode_args(input, scratch, bitrate, trim_to);
        debug!(input = %input.display(), %bitrate, ?trim_to, "encoding");

        let output = self
            .runner
            .run(&self.ffmpeg_path, &args)
            .await
            .map_err(|e| {
                Error::transcode_failed(input, format!("failed to run {}: {e}", self.ffmpeg_path))
            })?;
        if !output.success() {
            warn!(input = %input.display(), stderr = %output.stderr.trim(), "encoder failed");
            return Err(Error::transcode_failed(
                input,
                format!("ffmpeg {}", output.describe_failure()),
            ));
        }

        non_empty_size(scratch)
            .await
            .ok_or_else(|| Error::transcode_failed(input, "encoder produced no output"))
    }

    /// Normalize `input` according to `spec`.
    pub async fn normalize(&self, input: &Path, spec: &TranscodeSpec) -> Result<TranscodeResult> {
        if non_empty_size(input).await.is_none() {
            return Err(Error::transcode_failed(input, "input missing or empty"));
        }

        let output = Self::output_path_for(input);
        let duration = self.probe_duration(input).await?;
        let trim_to = (duration > spec.max_duration_secs).then_some(spec.max_duration_secs);
        if let Some(limit) = trim_to {
            info!(input = %input.display(), duration, limit, "trimming to duration ceiling");
        }

        let first = scratch_at(Self::scratch_path_for(&output, "encode")).await?;
        let mut size = self
            .encode(input, &first, spec.target_bitrate, trim_to)
            .await?;
        let mut chosen = first;
        let mut used_fallback_bitrate = false;

        if size > spec.max_output_size_bytes {
            warn!(
                input = %input.display(),
                size,
                limit = spec.max_output_size_bytes,
                bitrate = %spec.fallback_bitrate,
                "output over size ceiling, re-encoding once at fallback bitrate"
            );
            let retry = scratch_at(Self::scratch_path_for(&output, "retry")).await?;
            match self
                .encode(input, &retry, spec.fallback_bitrate, trim_to)
                .await
            {
                Ok(retry_size) => {
                    size = retry_size;
                    chosen = retry;
                    used_fallback_bitrate = true;
                }
                Err(e) => {
                    warn!(error = %e, "fallback encode failed, keeping first pass");
                }
            }
        }

        persist(chosen, &output).map_err(|e| Error::io_path("moving output into place", &output, e))?;
        if non_empty_size(&output).await.is_none() {
            remove_if_exists(&output).await;
            return Err(Error::transcode_failed(input, "output missing after encode"));
        }

        info!(
            output = %output.display(),
            size,
            used_fallback_bitrate,
            "video normalized"
        );
        Ok(TranscodeResult {
            path: output,
            size_bytes: size,
            used_fallback_bitrate,
        })
    }
}
