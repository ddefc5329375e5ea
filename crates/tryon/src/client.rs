use std::sync::Arc;
use std::time::Duration;

use image::DynamicImage;
use strum::{Display, IntoStaticStr};
use tracing::{debug, info, warn};
use wardrobe_common::GarmentCategory;

use crate::{
    api::TryOnApi,
    deadline::Deadline,
    error::{Result, TryOnError},
    wire::{DEFAULT_JPEG_QUALITY, RemoteStatus, RunRequest},
};

/// Lifecycle of one try-on job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum JobState {
    Submitted,
    Polling,
    Completed,
    Failed,
    Canceled,
    TimedOut,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled | Self::TimedOut)
    }
}

/// Poll cadence and overall budget for one flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub budget: Duration,
}

impl PollPolicy {
    /// Two chained try-ons composing an outfit
    pub const OUTFIT: Self = Self {
        interval: Duration::from_secs(2),
        budget: Duration::from_secs(120),
    };

    /// A single garment on a single photo
    pub const SINGLE: Self = Self {
        interval: Duration::from_secs(1),
        budget: Duration::from_secs(300),
    };

    pub fn new(interval: Duration, budget: Duration) -> Self {
        Self { interval, budget }
    }

    pub fn deadline(&self) -> Deadline {
        Deadline::after(self.budget)
    }
}

/// What a finished poll loop observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    pub job_id: String,
    pub output_urls: Vec<String>,
    pub status_checks: usize,
    pub sleeps: usize,
}

impl PollReport {
    /// First output image; a completed report always has one
    pub fn output_url(&self) -> &str {
        self.output_urls.first().map(String::as_str).unwrap_or_default()
    }
}

/// Submits model/garment pairs and polls them to a terminal state
#[derive(Clone)]
pub struct TryOnClient {
    api: Arc<dyn TryOnApi>,
    jpeg_quality: u8,
}

impl std::fmt::Debug for TryOnClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TryOnClient")
            .field("jpeg_quality", &self.jpeg_quality)
            .finish_non_exhaustive()
    }
}

impl TryOnClient {
    pub fn new(api: Arc<dyn TryOnApi>) -> Self {
        Self {
            api,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    pub fn api(&self) -> &Arc<dyn TryOnApi> {
        &self.api
    }

    /// Send one pair to `POST /run`, returning the job id
    pub async fn submit(
        &self,
        model: &DynamicImage,
        garment: &DynamicImage,
        category: GarmentCategory,
    ) -> Result<String> {
        let request = RunRequest::from_images(model, garment, category, self.jpeg_quality)?;
        let response = self.api.run(&request).await?;

        if let Some(error) = response.error {
            warn!(%category, %error, "Try-on submission rejected");
            return Err(TryOnError::Submission {
                message: error.to_string(),
            });
        }
        let job_id = response.id.filter(|id| !id.is_empty()).ok_or_else(|| TryOnError::Submission {
            message: "response carried no job id".to_string(),
        })?;

        info!(%job_id, %category, state = %JobState::Submitted, "Try-on job submitted");
        Ok(job_id)
    }

    /// Check `job_id` every `interval` until it ends or `deadline` does.
    ///
    /// Checks are strictly sequential; a transport error ends the loop
    /// without retrying.
    pub async fn poll(&self, job_id: &str, interval: Duration, deadline: &Deadline) -> Result<PollReport> {
        let mut report = PollReport {
            job_id: job_id.to_string(),
            output_urls: Vec::new(),
            status_checks: 0,
            sleeps: 0,
        };

        let outcome = loop {
            let status = match deadline.guard(self.api.status(job_id)).await {
                Ok(status) => status,
                Err(err) => break Err(err),
            };
            report.status_checks += 1;
            debug!(%job_id, status = %status.status, check = report.status_checks, "Polled try-on job");

            match status.status {
                RemoteStatus::Completed => {
                    if status.output.is_empty() {
                        break Err(TryOnError::MissingOutput {
                            job_id: job_id.to_string(),
                        });
                    }
                    report.output_urls = status.output;
                    break Ok(());
                }
                RemoteStatus::Failed => {
                    break Err(TryOnError::JobFailed {
                        job_id: job_id.to_string(),
                        message: status.error_message(),
                    });
                }
                RemoteStatus::Canceled => {
                    break Err(TryOnError::JobCanceled {
                        job_id: job_id.to_string(),
                        message: status.error_message(),
                    });
                }
                _ => {}
            }

            if let Err(err) = deadline.sleep(interval).await {
                break Err(err);
            }
            report.sleeps += 1;
        };

        match outcome {
            Ok(()) => {
                info!(%job_id, state = %JobState::Completed, checks = report.status_checks, "Try-on job finished");
                Ok(report)
            }
            Err(err) => {
                warn!(%job_id, state = %err.terminal_state(), checks = report.status_checks, error = %err, "Try-on job ended");
                Err(err)
            }
        }
    }

    /// Submit then poll, all under one deadline
    pub async fn run(
        &self,
        model: &DynamicImage,
        garment: &DynamicImage,
        category: GarmentCategory,
        interval: Duration,
        deadline: &Deadline,
    ) -> Result<PollReport> {
        let job_id = deadline.guard(self.submit(model, garment, category)).await?;
        self.poll(&job_id, interval, deadline).await
    }

    /// Download and decode an output image
    pub async fn fetch_image(&self, url: &str, deadline: &Deadline) -> Result<DynamicImage> {
        let bytes = deadline.guard(self.api.download(url)).await?;
        Ok(image::load_from_memory(&bytes)?)
    }
}
