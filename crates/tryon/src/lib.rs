//! # Try-On Job Client
//!
//! Submits model/garment image pairs to a remote virtual try-on service and
//! polls each job to a terminal state.
//!
//! Each job moves `Submitted -> Polling -> {Completed | Failed | Canceled | TimedOut}`.
//! Status checks are strictly sequential at a fixed interval, and the whole
//! chain runs under a [`Deadline`] that drops the in-flight request when the
//! budget runs out or the chain is cancelled.
//!
//! ```rust,no_run
//! use std::{sync::Arc, time::Duration};
//! use tryon::{HttpTryOnApi, PollPolicy, TryOnClient};
//! use wardrobe_common::GarmentCategory;
//!
//! # async fn demo() -> tryon::Result<()> {
//! let api = HttpTryOnApi::from_env("https://api.fashn.ai/v1", "TRYON_API_KEY", Duration::from_secs(30))?;
//! let client = TryOnClient::new(Arc::new(api));
//!
//! let model = image::open("me.jpg")?;
//! let garment = image::open("shirt.png")?;
//! let policy = PollPolicy::SINGLE;
//! let report = client
//!     .run(&model, &garment, GarmentCategory::Top, policy.interval, &policy.deadline())
//!     .await?;
//! println!("{}", report.output_url());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod deadline;
pub mod error;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod wire;

pub use api::{HttpTryOnApi, TryOnApi};
pub use client::{JobState, PollPolicy, PollReport, TryOnClient};
pub use deadline::Deadline;
pub use error::{Result, TryOnError};
pub use wire::{DEFAULT_JPEG_QUALITY, RemoteStatus, RunRequest, RunResponse, StatusResponse, jpeg_data_uri};
