//! Audio track discovery for split-track (video-only) progressive renditions.
//!
//! The platform stores the audio of a DASH video next to the video file under
//! a handful of naming conventions that changed over the years. Candidates
//! are produced by an ordered list of generator functions and tried in
//! order; the first that downloads successfully wins.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::fs::non_empty_size;
use crate::http::HttpClient;

/// Derives one candidate audio URL from a (query-less) video URL.
pub type CandidateFn = fn(&str) -> Option<String>;

static DASH_QUALITY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"DASH_(?:\d+|[A-Za-z0-9]+_\d+)(\.mp4)?$").unwrap());

/// Default candidate generators, most likely first.
pub const DEFAULT_CANDIDATES: &[CandidateFn] = &[
    sibling_dash_audio,
    quality_suffix_to_audio,
    sibling_dash_audio_128,
    sibling_dash_audio_64,
    sibling_legacy_audio,
];

fn replace_last_segment(video_url: &str, name: &str) -> Option<String> {
    let (base, last) = video_url.rsplit_once('/')?;
    if last.is_empty() || base.ends_with('/') {
        return None;
    }
    Some(format!("{base}/{name}"))
}

/// `.../DASH_720.mp4` -> `.../DASH_audio.mp4`
pub fn sibling_dash_audio(video_url: &str) -> Option<String> {
    replace_last_segment(video_url, "DASH_audio.mp4")
}

/// Swap the quality suffix in place: `DASH_720` -> `DASH_audio`, keeping
/// whatever extension (or lack of one) the video used.
pub fn quality_suffix_to_audio(video_url: &str) -> Option<String> {
    let caps = DASH_QUALITY_REGEX.captures(video_url)?;
    let whole = caps.get(0)?;
    let ext = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    Some(format!("{}DASH_audio{}", &video_url[..whole.start()], ext))
}

/// `.../DASH_AUDIO_128.mp4`
pub fn sibling_dash_audio_128(video_url: &str) -> Option<String> {
    replace_last_segment(video_url, "DASH_AUDIO_128.mp4")
}

/// `.../DASH_AUDIO_64.mp4`
pub fn sibling_dash_audio_64(video_url: &str) -> Option<String> {
    replace_last_segment(video_url, "DASH_AUDIO_64.mp4")
}

/// `.../audio`, used by the oldest uploads.
pub fn sibling_legacy_audio(video_url: &str) -> Option<String> {
    replace_last_segment(video_url, "audio")
}

/// Candidate audio URLs for `video_url`, in order, without duplicates and
/// never equal to the video URL itself.
pub fn audio_candidates(video_url: &str, generators: &[CandidateFn]) -> Vec<String> {
    let base = video_url
        .split(['?', '#'])
        .next()
        .unwrap_or(video_url)
        .trim_end_matches('/');

    let mut candidates: Vec<String> = Vec::with_capacity(generators.len());
    for candidate in generators.iter().filter_map(|generate| generate(base)) {
        if candidate != base && !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }
    candidates
}

/// Try each candidate in order, downloading into `dest`.
///
/// Returns the URL of the first candidate that answered with a success status
/// and a non-empty body; `dest` then holds the audio track. Returns `None`
/// when no candidate worked, in which case `dest` may hold nothing useful
/// and should be discarded by the caller.
pub async fn find_audio_track(
    http: &dyn HttpClient,
    candidates: &[String],
    headers: &[(&str, &str)],
    dest: &Path,
) -> Option<String> {
    for candidate in candidates {
        match http.download(candidate, headers, dest).await {
            Ok(outcome) if outcome.is_success() && non_empty_size(dest).await.is_some() => {
                debug!(url = %candidate, bytes = outcome.bytes_written, "audio track found");
                return Some(candidate.clone());
            }
            Ok(outcome) => {
                debug!(url = %candidate, status = outcome.status, "audio candidate rejected");
            }
            Err(e) => {
                debug!(url = %candidate, error = %e, "audio candidate failed");
            }
        }
    }
    None
}
