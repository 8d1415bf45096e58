//! In-memory fakes for the injected capabilities.

use std::collections::{HashMap, VecDeque};
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::http::{DownloadOutcome, HttpClient, HttpError, HttpResponse};
use crate::media::ContentReference;
use crate::metadata::{VideoMetadata, VideoMetadataSource};
use crate::process::{ProcessOutput, ProcessRunner};
use crate::{Error, Result, Stage};

enum Route {
    Respond { status: u16, body: Bytes },
    Fail(String),
}

/// Fake HTTP client with canned routes. Unknown URLs answer 404.
#[derive(Default)]
pub(crate) struct FakeHttp {
    routes: Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl FakeHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, status: u16, body: impl Into<Bytes>) {
        self.routes.lock().insert(
            url.to_string(),
            Route::Respond {
                status,
                body: body.into(),
            },
        );
    }

    pub fn fail(&self, url: &str, message: &str) {
        self.routes
            .lock()
            .insert(url.to_string(), Route::Fail(message.to_string()));
    }

    /// Every requested URL, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().iter().map(|(u, _)| u.clone()).collect()
    }

    /// Headers of the last request to `url`.
    pub fn headers_for(&self, url: &str) -> Vec<(String, String)> {
        self.requests
            .lock()
            .iter()
            .rev()
            .find(|(u, _)| u == url)
            .map(|(_, h)| h.clone())
            .unwrap_or_default()
    }

    fn lookup(&self, url: &str, headers: &[(&str, &str)]) -> std::result::Result<HttpResponse, HttpError> {
        self.requests.lock().push((
            url.to_string(),
            headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ));
        match self.routes.lock().get(url) {
            Some(Route::Respond { status, body }) => Ok(HttpResponse {
                status: *status,
                body: body.clone(),
            }),
            Some(Route::Fail(message)) => Err(HttpError::Transport(message.clone())),
            None => Ok(HttpResponse {
                status: 404,
                body: Bytes::new(),
            }),
        }
    }
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> std::result::Result<HttpResponse, HttpError> {
        self.lookup(url, headers)
    }

    async fn download(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        dest: &Path,
    ) -> std::result::Result<DownloadOutcome, HttpError> {
        let response = self.lookup(url, headers)?;
        if !response.is_success() {
            return Ok(DownloadOutcome {
                status: response.status,
                bytes_written: 0,
            });
        }
        tokio::fs::write(dest, &response.body).await?;
        Ok(DownloadOutcome {
            status: response.status,
            bytes_written: response.body.len() as u64,
        })
    }
}

/// Scripted behaviour of one fake ffmpeg run.
#[derive(Debug, Clone)]
pub(crate) enum FakeRun {
    /// Exit 0 after writing this many bytes to the output (last argument).
    Write(usize),
    /// Exit 1 with the given stderr, leaving a partial output behind.
    Fail(&'static str),
    /// Write a partial output, then never finish.
    Hang,
}

/// Fake process runner emulating ffmpeg and ffprobe.
pub(crate) struct FakeRunner {
    duration: Mutex<Option<f64>>,
    ffmpeg: Mutex<VecDeque<FakeRun>>,
    default_run: FakeRun,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeRunner {
    /// Every ffmpeg run succeeds and writes `bytes` bytes.
    pub fn writing(bytes: usize) -> Self {
        Self {
            duration: Mutex::new(Some(30.0)),
            ffmpeg: Mutex::new(VecDeque::new()),
            default_run: FakeRun::Write(bytes),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue behaviours for the next ffmpeg runs, ahead of the default.
    pub fn then(self, run: FakeRun) -> Self {
        self.ffmpeg.lock().push_back(run);
        self
    }

    /// Probed duration; `None` makes ffprobe fail.
    pub fn with_duration(self, duration: Option<f64>) -> Self {
        *self.duration.lock() = duration;
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().clone()
    }

    /// Argument lists of the ffmpeg invocations only.
    pub fn ffmpeg_calls(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|(program, _)| program.contains("ffmpeg"))
            .map(|(_, args)| args)
            .collect()
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<ProcessOutput> {
        self.calls.lock().push((program.to_string(), args.to_vec()));

        if program.contains("ffprobe") {
            let duration = *self.duration.lock();
            return Ok(match duration {
                Some(d) => ProcessOutput {
                    code: Some(0),
                    stdout: format!("{d:.6}\n"),
                    stderr: String::new(),
                },
                None => ProcessOutput {
                    code: Some(1),
                    stdout: String::new(),
                    stderr: "moov atom not found".to_string(),
                },
            });
        }

        let run = self
            .ffmpeg
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.default_run.clone());
        let output = args.last().map(Path::new);
        match run {
            FakeRun::Write(bytes) => {
                if let Some(output) = output {
                    tokio::fs::write(output, vec![0u8; bytes]).await?;
                }
                Ok(ProcessOutput {
                    code: Some(0),
                    ..Default::default()
                })
            }
            FakeRun::Fail(stderr) => {
                if let Some(output) = output {
                    tokio::fs::write(output, b"partial").await?;
                }
                Ok(ProcessOutput {
                    code: Some(1),
                    stdout: String::new(),
                    stderr: stderr.to_string(),
                })
            }
            FakeRun::Hang => {
                if let Some(output) = output {
                    tokio::fs::write(output, b"partial").await?;
                }
                std::future::pending().await
            }
        }
    }
}

/// Fake metadata source returning a fixed answer.
pub(crate) struct FakeMetadata {
    metadata: Option<VideoMetadata>,
}

impl FakeMetadata {
    pub fn new(metadata: VideoMetadata) -> Self {
        Self {
            metadata: Some(metadata),
        }
    }

    pub fn unavailable() -> Self {
        Self { metadata: None }
    }
}

#[async_trait]
impl VideoMetadataSource for FakeMetadata {
    async fn video_metadata(&self, reference: &ContentReference) -> Result<VideoMetadata> {
        self.metadata.clone().ok_or_else(|| {
            Error::metadata_unavailable(Stage::NativeVideo, reference, "no such post")
        })
    }
}

/// Names of all files in `dir`, sorted.
pub(crate) fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
