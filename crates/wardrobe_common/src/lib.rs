//! # Wardrobe Common - Shared Types and Utilities
//!
//! Shared data structures for the wardrobe workspace: view/image geometry,
//! garment categories and the persisted record types with their state
//! machines.
//!
//! ## Example
//!
//! ```rust
//! use wardrobe_common::{GarmentCategory, JobRecord, Point2D, Rectangle, Size};
//!
//! let rect = Rectangle::new(Point2D::new(10.0, 0.0), Size::new(300.0, 400.0));
//! assert!(rect.contains(Point2D::new(20.0, 20.0)));
//!
//! let mut record = JobRecord::pending("job-1", GarmentCategory::Top);
//! record.complete("https://cdn.example/out.jpg", Some("results/job-1.jpg".into())).unwrap();
//! assert!(record.is_completed());
//! ```

pub mod geometry;
pub mod records;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};
use thiserror::Error;

// Re-exports for convenience
pub use chrono::{DateTime, Utc};
pub use geometry::{Point2D, Rectangle, Size};
pub use records::{JobRecord, JobStatus, OutfitRecord, OutfitState, WardrobeItem};

/// Result type for shared record operations
pub type Result<T> = std::result::Result<T, RecordError>;

/// Errors raised by record state transitions
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("Invalid transition for record {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: &'static str,
        to: &'static str,
    },

    #[error("Unknown garment category: {0}")]
    UnknownCategory(String),
}

/// Garment category a wardrobe item is filed under
#[derive(
    Debug, Clone, Copy,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq, Eq, Hash,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GarmentCategory {
    Top,
    Bottom,
    Dress,
    Accessory,
    Shoes,
}

impl GarmentCategory {
    /// Category name in the remote try-on API vocabulary
    pub fn api_name(self) -> &'static str {
        match self {
            Self::Top => "tops",
            Self::Bottom => "bottoms",
            Self::Dress => "one-pieces",
            Self::Accessory => "accessories",
            Self::Shoes => "shoes",
        }
    }

    /// Parse a user-supplied category name (case-insensitive)
    pub fn parse(name: &str) -> Result<Self> {
        name.trim()
            .to_lowercase()
            .parse()
            .map_err(|_| RecordError::UnknownCategory(name.to_string()))
    }
}

/// Generate a fresh record id
pub fn new_record_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
