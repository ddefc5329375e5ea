use cutout::MaskError;
use thiserror::Error;
use tryon::TryOnError;
use wardrobe_common::RecordError;

/// Local persistence failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Path escapes the store root: {0}")]
    InvalidPath(String),
}

/// Errors surfaced by the wardrobe service and the studio
#[derive(Error, Debug)]
pub enum StudioError {
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error(transparent)]
    TryOn(#[from] TryOnError),

    #[error(transparent)]
    Mask(#[from] MaskError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("No wardrobe item with id {0}")]
    UnknownItem(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl StudioError {
    /// Whether the user can fix this by redrawing or reselecting
    pub fn is_user_correctable(&self) -> bool {
        match self {
            Self::Mask(err) => err.is_user_correctable(),
            Self::UnknownItem(_) => true,
            _ => false,
        }
    }
}

/// Configuration loading failures
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub type Result<T> = std::result::Result<T, StudioError>;
