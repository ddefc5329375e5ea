//! One photo being masked inside one viewport.

use image::{DynamicImage, RgbaImage};
use wardrobe_common::{Point2D, Rectangle, Size};

use crate::{
    error::{MaskError, Result},
    extract::MaskExtractor,
    mapper::{CoordinateMapper, DEFAULT_CONTROL_BAR_HEIGHT},
    stroke::PathTracker,
    traits::{NoOpRenderer, OverlayRenderer},
    types::ImagePolygon,
};

/// Ties the lasso tracker, the current view mapping and the extractor
/// together for a single source photo.
#[derive(Debug)]
pub struct MaskingSession<R: OverlayRenderer = NoOpRenderer> {
    source: RgbaImage,
    control_bar_height: f64,
    mapper: CoordinateMapper,
    tracker: PathTracker<R>,
    extractor: MaskExtractor,
}

impl MaskingSession<NoOpRenderer> {
    pub fn new(source: &DynamicImage, viewport: Size) -> Result<Self> {
        Self::with_renderer(source, viewport, DEFAULT_CONTROL_BAR_HEIGHT, NoOpRenderer)
    }
}

impl<R: OverlayRenderer> MaskingSession<R> {
    pub fn with_renderer(
        source: &DynamicImage,
        viewport: Size,
        control_bar_height: f64,
        renderer: R,
    ) -> Result<Self> {
        let source = source.to_rgba8();
        let mapper = CoordinateMapper::new(viewport, image_size(&source), control_bar_height)?;
        Ok(Self {
            source,
            control_bar_height,
            mapper,
            tracker: PathTracker::with_renderer(renderer),
            extractor: MaskExtractor::default(),
        })
    }

    pub fn with_extractor(mut self, extractor: MaskExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn source(&self) -> &RgbaImage {
        &self.source
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    pub fn display_rect(&self) -> Rectangle {
        self.mapper.display_rect()
    }

    pub fn tracker(&self) -> &PathTracker<R> {
        &self.tracker
    }

    /// Pointer down, in view coordinates
    pub fn begin(&mut self, point: Point2D) {
        self.tracker.begin(point);
    }

    /// Pointer moved, in view coordinates
    pub fn extend(&mut self, point: Point2D) {
        self.tracker.extend(point);
    }

    /// Pointer lifted; `true` when a stroke was closed
    pub fn close(&mut self) -> bool {
        self.tracker.close().is_some()
    }

    /// Drop every stroke so the user can start over
    pub fn clear(&mut self) {
        self.tracker.clear();
    }

    /// Recompute the mapping for a new viewport. The open stroke is
    /// discarded; closed strokes are moved to stay over the same pixels.
    pub fn resize(&mut self, viewport: Size) -> Result<()> {
        let mapper = CoordinateMapper::new(viewport, self.mapper.image_size(), self.control_bar_height)?;
        let previous = std::mem::replace(&mut self.mapper, mapper);

        self.tracker.discard_active();
        self.tracker.renderer_mut().resize(viewport);
        let current = self.mapper.clone();
        self.tracker
            .remap_history(|p| current.to_view_space(previous.to_image_space(p)));
        Ok(())
    }

    /// Swap in a different photo; strokes drawn over the old one are dropped
    pub fn replace_image(&mut self, source: &DynamicImage) -> Result<()> {
        let source = source.to_rgba8();
        self.mapper = CoordinateMapper::new(self.mapper.viewport(), image_size(&source), self.control_bar_height)?;
        self.source = source;
        self.tracker.clear();
        Ok(())
    }

    /// Latest closed stroke in source pixel coordinates
    pub fn image_polygon(&self) -> Result<ImagePolygon> {
        let stroke = self.tracker.latest_closed().ok_or(MaskError::EmptyMask)?;
        if stroke.is_empty() {
            return Err(MaskError::EmptyMask);
        }
        Ok(self.mapper.polygon_to_image_space(stroke))
    }

    /// Cut the latest closed stroke out of the source photo
    pub fn extract(&self) -> Result<RgbaImage> {
        let polygon = self.image_polygon()?;
        self.extractor.extract(&self.source, &polygon)
    }
}

fn image_size(image: &RgbaImage) -> Size {
    Size::new(f64::from(image.width()), f64::from(image.height()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Intersects;
    use geo_types::Point;
    use image::Rgba;

    fn photo(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 7 % 256) as u8, (y * 3 % 256) as u8, 90, 255])
        }))
    }

    /// Lasso drawn as fractions of the display rect
    fn draw_lasso<R: OverlayRenderer>(session: &mut MaskingSession<R>) {
        let rect = session.display_rect();
        let at = |fx: f64, fy: f64| {
            Point2D::new(
                rect.position.x + rect.size.width * fx,
                rect.position.y + rect.size.height * fy,
            )
        };
        session.begin(at(0.31, 0.22));
        for (fx, fy) in [(0.72, 0.27), (0.81, 0.63), (0.52, 0.49), (0.27, 0.74)] {
            session.extend(at(fx, fy));
        }
        session.close();
    }

    #[test]
    fn test_extract_without_stroke_is_empty_mask_and_changes_nothing() {
        let mut session = MaskingSession::new(&photo(64, 48), Size::new(390.0, 844.0)).unwrap();
        session.begin(Point2D::new(20.0, 20.0));
        session.extend(Point2D::new(80.0, 20.0));

        let source_before = session.source().clone();
        let rect_before = session.display_rect();

        let err = session.extract().unwrap_err();
        assert!(matches!(err, MaskError::EmptyMask));
        assert_eq!(session.source().as_raw(), source_before.as_raw());
        assert_eq!(session.display_rect(), rect_before);
        assert!(session.tracker().active().is_some(), "open stroke is left alone");
    }

    #[test]
    fn test_cutout_size_is_independent_of_viewport() {
        let source = photo(1200, 900);
        let mut sizes = Vec::new();
        for viewport in [Size::new(390.0, 844.0), Size::new(1024.0, 1366.0), Size::new(800.0, 500.0)] {
            let mut session = MaskingSession::new(&source, viewport).unwrap();
            draw_lasso(&mut session);
            sizes.push(session.extract().unwrap().dimensions());
        }
        // Same relative lasso: pixel sizes agree to within rounding
        for pair in sizes.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!(a.0.abs_diff(b.0) <= 1 && a.1.abs_diff(b.1) <= 1, "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn test_no_bleed_across_viewports_and_aspects() {
        let viewports = [Size::new(390.0, 844.0), Size::new(834.0, 1194.0), Size::new(640.0, 400.0)];
        let photos = [photo(300, 200), photo(200, 300), photo(257, 257)];

        for viewport in viewports {
            for source in &photos {
                let mut session = MaskingSession::new(source, viewport).unwrap();
                draw_lasso(&mut session);

                let polygon = session.image_polygon().unwrap();
                let bbox = polygon.bounding_box().unwrap();
                let shape = polygon.to_geo_polygon();
                let cutout = session.extract().unwrap();

                for (x, y, pixel) in cutout.enumerate_pixels() {
                    if pixel[3] > 0 {
                        let center = Point::new(
                            bbox.position.x + f64::from(x) + 0.5,
                            bbox.position.y + f64::from(y) + 0.5,
                        );
                        assert!(shape.intersects(&center));
                    }
                }
            }
        }
    }

    #[test]
    fn test_repeated_extraction_dimensions_match() {
        let mut session = MaskingSession::new(&photo(500, 700), Size::new(390.0, 844.0)).unwrap();
        draw_lasso(&mut session);
        let first = session.extract().unwrap().dimensions();
        assert_eq!(session.extract().unwrap().dimensions(), first);
        assert_eq!(session.extract().unwrap().dimensions(), first);
    }

    #[test]
    fn test_resize_keeps_closed_strokes_over_same_pixels() {
        let mut session = MaskingSession::new(&photo(600, 400), Size::new(390.0, 844.0)).unwrap();
        draw_lasso(&mut session);
        let before = session.image_polygon().unwrap();

        session.begin(Point2D::new(5.0, 5.0));
        session.resize(Size::new(1024.0, 768.0)).unwrap();
        assert!(session.tracker().active().is_none());

        let after = session.image_polygon().unwrap();
        for (a, b) in before.points.iter().zip(&after.points) {
            assert!((a[0] - b[0]).abs() < 1e-6 && (a[1] - b[1]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_replace_image_clears_strokes() {
        let mut session = MaskingSession::new(&photo(100, 100), Size::new(390.0, 844.0)).unwrap();
        draw_lasso(&mut session);
        session.replace_image(&photo(50, 80)).unwrap();

        assert!(session.tracker().history().is_empty());
        assert!(matches!(session.extract(), Err(MaskError::EmptyMask)));
    }
}
