//! Scripted [`TryOnApi`] for exercising poll loops without a network.
//!
//! Status checks consume the scripted [`Step`]s in order; once the script
//! runs out every further check reports `processing`.

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use crate::{
    api::TryOnApi,
    error::{Result, TryOnError},
    wire::{RemoteError, RemoteStatus, RunRequest, RunResponse, StatusResponse},
};

/// One scripted answer to `GET /status/{id}`
#[derive(Debug, Clone)]
pub enum Step {
    Processing,
    Completed(Vec<String>),
    Failed(String),
    Canceled(String),
    /// Non-2xx response with this status code
    Transport(u16),
    /// Never answers
    Hang,
}

#[derive(Debug, Clone)]
enum Submission {
    Accept(String),
    Reject(String),
}

#[derive(Debug, Default)]
pub struct ScriptedApi {
    submissions: Mutex<VecDeque<Submission>>,
    steps: Mutex<VecDeque<Step>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<Vec<RunRequest>>,
    status_calls: AtomicUsize,
    downloads: AtomicUsize,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next submission is accepted with `job_id`
    pub fn accept(self, job_id: impl Into<String>) -> Self {
        push(&self.submissions, Submission::Accept(job_id.into()));
        self
    }

    /// Next submission is rejected with a structured error
    pub fn reject(self, message: impl Into<String>) -> Self {
        push(&self.submissions, Submission::Reject(message.into()));
        self
    }

    pub fn steps(self, steps: impl IntoIterator<Item = Step>) -> Self {
        if let Ok(mut queue) = self.steps.lock() {
            queue.extend(steps);
        }
        self
    }

    /// Serve `bytes` for downloads of `url`
    pub fn serve(self, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        if let Ok(mut files) = self.files.lock() {
            files.insert(url.into(), bytes);
        }
        self
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RunRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

fn push<T>(queue: &Mutex<VecDeque<T>>, item: T) {
    if let Ok(mut queue) = queue.lock() {
        queue.push_back(item);
    }
}

fn pop<T>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
    queue.lock().ok().and_then(|mut queue| queue.pop_front())
}

#[async_trait]
impl TryOnApi for ScriptedApi {
    async fn run(&self, request: &RunRequest) -> Result<RunResponse> {
        let count = match self.requests.lock() {
            Ok(mut requests) => {
                requests.push(request.clone());
                requests.len()
            }
            Err(_) => 0,
        };
        Ok(match pop(&self.submissions) {
            Some(Submission::Reject(message)) => RunResponse {
                id: None,
                error: Some(RemoteError::Message(message)),
            },
            Some(Submission::Accept(id)) => RunResponse { id: Some(id), error: None },
            None => RunResponse {
                id: Some(format!("job-{count}")),
                error: None,
            },
        })
    }

    async fn status(&self, job_id: &str) -> Result<StatusResponse> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let reply = |status, output, error: Option<String>| StatusResponse {
            id: job_id.to_string(),
            status,
            output,
            error: error.map(RemoteError::Message),
        };

        match pop(&self.steps).unwrap_or(Step::Processing) {
            Step::Processing => Ok(reply(RemoteStatus::Processing, Vec::new(), None)),
            Step::Completed(urls) => Ok(reply(RemoteStatus::Completed, urls, None)),
            Step::Failed(message) => Ok(reply(RemoteStatus::Failed, Vec::new(), Some(message))),
            Step::Canceled(message) => Ok(reply(RemoteStatus::Canceled, Vec::new(), Some(message))),
            Step::Transport(status) => Err(TryOnError::Http {
                status,
                body: "scripted transport failure".to_string(),
            }),
            Step::Hang => std::future::pending().await,
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.files
            .lock()
            .ok()
            .and_then(|files| files.get(url).cloned())
            .ok_or_else(|| TryOnError::Http {
                status: 404,
                body: format!("nothing served at {url}"),
            })
    }
}

/// A small opaque PNG
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([90, 120, 200, 255])));
    let mut bytes = Cursor::new(Vec::new());
    // In-memory PNG encoding of a valid buffer cannot fail
    let _ = image.write_to(&mut bytes, ImageFormat::Png);
    bytes.into_inner()
}
