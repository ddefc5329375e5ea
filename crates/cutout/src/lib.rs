//! # Garment Cut-out Library
//!
//! Freehand lasso masking for clothing photos: strokes are collected in view
//! coordinates, mapped into the source image's pixel space and rasterized into
//! a cropped, transparent-background cut-out.
//!
//! ## Core Features
//!
//! - **Path Tracker**: begin / extend / close freehand strokes, with a redraw
//!   after every change
//! - **Coordinate Mapper**: letterboxed display rect and view -> image mapping
//! - **Mask Extractor**: anti-aliased polygon clip at source resolution,
//!   cropped to the polygon's bounding box
//! - **Preview Renderer**: imageproc-drawn outline and translucent fill
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cutout::{MaskingSession, encode_png};
//! use wardrobe_common::{Point2D, Size};
//!
//! let photo = image::open("shirt.jpg")?;
//! let mut session = MaskingSession::new(&photo, Size::new(390.0, 844.0))?;
//!
//! session.begin(Point2D::new(120.0, 140.0));
//! session.extend(Point2D::new(260.0, 150.0));
//! session.extend(Point2D::new(250.0, 380.0));
//! session.extend(Point2D::new(130.0, 370.0));
//! session.close();
//!
//! let cutout = session.extract()?;
//! std::fs::write("shirt.png", encode_png(&cutout)?)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Core modules
pub mod error;
pub mod extract;
pub mod mapper;
pub mod overlay;
pub mod session;
pub mod stroke;
pub mod traits;
pub mod types;

// Re-exports for convenience
pub use error::{MaskError, Result};
pub use extract::{FillRule, MaskExtractor, encode_png};
pub use mapper::{CoordinateMapper, DEFAULT_CONTROL_BAR_HEIGHT, fit_display_rect};
pub use overlay::{PreviewRenderer, compose_preview};
pub use session::MaskingSession;
pub use stroke::{PathTracker, Stroke};
pub use traits::*;
pub use types::ImagePolygon;
