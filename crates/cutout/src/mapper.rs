//! Display-rect fitting and view <-> image coordinate mapping.

use wardrobe_common::{Point2D, Rectangle, Size};

use crate::{
    error::{MaskError, Result},
    stroke::Stroke,
    types::ImagePolygon,
};

/// Height reserved below the photo for the masking controls
pub const DEFAULT_CONTROL_BAR_HEIGHT: f64 = 120.0;

/// Fit `image` inside `viewport` minus the bottom control bar.
///
/// Aspect ratio is preserved, the result is centered horizontally and
/// aligned to the top of the viewport.
pub fn fit_display_rect(viewport: Size, image: Size, control_bar_height: f64) -> Result<Rectangle> {
    if image.is_empty() {
        return Err(MaskError::EmptyImage);
    }

    let available = Size::new(viewport.width, viewport.height - control_bar_height.max(0.0));
    if available.is_empty() {
        return Err(MaskError::InvalidViewport {
            width: viewport.width,
            height: viewport.height,
        });
    }

    let scale = (available.width / image.width).min(available.height / image.height);
    let size = Size::new(image.width * scale, image.height * scale);
    let origin = Point2D::new((viewport.width - size.width) / 2.0, 0.0);

    Ok(Rectangle::new(origin, size))
}

/// Maps between viewport coordinates and source-image pixels for one
/// viewport/image pair. Build a new mapper whenever either changes.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateMapper {
    viewport: Size,
    image: Size,
    display: Rectangle,
}

impl CoordinateMapper {
    pub fn new(viewport: Size, image: Size, control_bar_height: f64) -> Result<Self> {
        let display = fit_display_rect(viewport, image, control_bar_height)?;
        Ok(Self {
            viewport,
            image,
            display,
        })
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn image_size(&self) -> Size {
        self.image
    }

    /// Where the image is drawn inside the viewport
    pub fn display_rect(&self) -> Rectangle {
        self.display
    }

    /// Source pixels per view point
    pub fn scale(&self) -> f64 {
        self.image.width / self.display.size.width
    }

    pub fn to_image_space(&self, point: Point2D) -> Point2D {
        (point - self.display.position) * self.scale()
    }

    pub fn to_view_space(&self, point: Point2D) -> Point2D {
        point * (1.0 / self.scale()) + self.display.position
    }

    /// Transform a stroke into source-image pixel coordinates
    pub fn polygon_to_image_space(&self, stroke: &Stroke) -> ImagePolygon {
        stroke
            .points()
            .iter()
            .map(|&p| self.to_image_space(p))
            .collect()
    }
}
