//! # Wardrobe
//!
//! Local persistence for garment cut-outs and try-on results, plus the
//! [`Studio`] that drives outfit and single try-on flows against the remote
//! service.
//!
//! ```rust,no_run
//! use std::{sync::Arc, time::Duration};
//! use tryon::HttpTryOnApi;
//! use wardrobe::{AppConfig, Studio};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::from_file("closet.toml")?;
//! let api = HttpTryOnApi::from_env(&config.api.base_url, &config.api.api_key_env, config.api.request_timeout())?;
//! let mut studio = Studio::open(&config, Arc::new(api))?;
//!
//! let base = image::open("me.jpg")?;
//! let outfit = studio.start_outfit(base, "top-id", "bottom-id", Vec::new())?;
//! while let Some(update) = studio.next_update().await {
//!     let done = update.record_id() == outfit.id;
//!     studio.apply(update)?;
//!     if done {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod store;
pub mod studio;
pub mod wardrobe;

pub use config::{ApiConfig, AppConfig, FlowConfig, MaskingConfig, StorageConfig};
pub use error::{ConfigError, Result, StoreError, StudioError};
pub use store::{
    FileStore, FsImageProvider, ImageProvider, JsonFileStore, Keyed, LocalFileStore, MemoryStore, ObjectStore,
    load_photo,
};
pub use studio::{Studio, StudioUpdate};
pub use wardrobe::Wardrobe;
