//! Polygon clip + crop producing a transparent cut-out.
//!
//! The polygon is rasterized at source resolution with a scanline filler:
//! each output row is sampled on `subsamples` horizontal lines and every
//! span contributes its exact horizontal overlap to per-pixel coverage.
//! Whether a pixel center is inside is decided separately with exact
//! orientation tests against the source-space ring, counting the boundary as
//! inside; pixels whose center is outside always stay fully transparent.

use std::io::Cursor;

use geo::kernels::{Kernel, Orientation, RobustKernel};
use geo_types::Coord;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use strum::{Display, EnumString};

use crate::{
    error::{MaskError, Result},
    types::ImagePolygon,
};

/// How self-intersecting lassos are filled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

/// Largest crop, per axis, as a multiple of the source image
pub const MAX_CROP_FACTOR: f64 = 4.0;

/// Clips an image through a closed polygon and crops to its bounding box
#[derive(Debug, Clone)]
pub struct MaskExtractor {
    pub fill_rule: FillRule,
    /// Sub-scanlines per pixel row used for edge coverage
    pub subsamples: u32,
}

impl Default for MaskExtractor {
    fn default() -> Self {
        Self {
            fill_rule: FillRule::NonZero,
            subsamples: 4,
        }
    }
}

/// Non-horizontal polygon edge, stored top to bottom
#[derive(Debug, Clone, Copy)]
struct Edge {
    x_top: f64,
    y_top: f64,
    y_bottom: f64,
    dx_dy: f64,
    winding: i32,
}

impl Edge {
    fn new([x0, y0]: [f64; 2], [x1, y1]: [f64; 2]) -> Option<Self> {
        if y0 == y1 || !(y0.is_finite() && y1.is_finite()) {
            return None;
        }
        let (top, bottom, winding) = if y0 < y1 {
            ([x0, y0], [x1, y1], 1)
        } else {
            ([x1, y1], [x0, y0], -1)
        };
        Some(Self {
            x_top: top[0],
            y_top: top[1],
            y_bottom: bottom[1],
            dx_dy: (bottom[0] - top[0]) / (bottom[1] - top[1]),
            winding,
        })
    }

    fn crossing(&self, y: f64) -> Option<f64> {
        (self.y_top <= y && y < self.y_bottom).then(|| self.x_top + (y - self.y_top) * self.dx_dy)
    }
}

impl MaskExtractor {
    pub fn new(fill_rule: FillRule) -> Self {
        Self {
            fill_rule,
            ..Self::default()
        }
    }

    /// Extract from any decoded image
    pub fn extract_dynamic(&self, source: &DynamicImage, polygon: &ImagePolygon) -> Result<RgbaImage> {
        self.extract(&source.to_rgba8(), polygon)
    }

    /// Cut `polygon` (source pixel coordinates) out of `source`.
    ///
    /// The result measures `ceil(bbox.width) x ceil(bbox.height)`.
    pub fn extract(&self, source: &RgbaImage, polygon: &ImagePolygon) -> Result<RgbaImage> {
        let bbox = polygon.bounding_box().ok_or(MaskError::EmptyMask)?;
        if !(bbox.size.width > 0.0 && bbox.size.height > 0.0) {
            return Err(MaskError::DegenerateMask {
                width: bbox.size.width,
                height: bbox.size.height,
            });
        }

        let limit_w = f64::from(source.width().max(1)) * MAX_CROP_FACTOR;
        let limit_h = f64::from(source.height().max(1)) * MAX_CROP_FACTOR;
        if !(bbox.size.width <= limit_w && bbox.size.height <= limit_h) {
            return Err(MaskError::MaskTooLarge {
                width: bbox.size.width,
                height: bbox.size.height,
            });
        }

        let width = bbox.size.width.ceil() as u32;
        let height = bbox.size.height.ceil() as u32;
        let origin = bbox.position;

        let local = polygon.translated(-origin.x, -origin.y);
        let edges: Vec<Edge> = local.edges().filter_map(|(a, b)| Edge::new(a, b)).collect();

        let subsamples = self.subsamples.max(1);
        let weight = 1.0 / f64::from(subsamples);
        let columns = width as usize;

        let mut output = RgbaImage::new(width, height);
        let mut coverage = vec![0.0_f64; columns];
        let ring: Vec<(Coord<f64>, Coord<f64>)> = polygon
            .edges()
            .map(|([x0, y0], [x1, y1])| (Coord { x: x0, y: y0 }, Coord { x: x1, y: y1 }))
            .collect();
        let mut row_edges: Vec<(Coord<f64>, Coord<f64>)> = Vec::new();
        let mut crossings: Vec<(f64, i32)> = Vec::new();
        let mut spans: Vec<(f64, f64)> = Vec::new();

        for row in 0..height {
            let row_top = f64::from(row);

            coverage.fill(0.0);
            for sub in 0..subsamples {
                let y = row_top + (f64::from(sub) + 0.5) * weight;
                self.spans_at(&edges, y, &mut crossings, &mut spans);
                for &(start, end) in &spans {
                    accumulate_span(&mut coverage, start, end, weight);
                }
            }

            let center_y = origin.y + row_top + 0.5;
            row_edges.clear();
            row_edges.extend(
                ring.iter()
                    .copied()
                    .filter(|(a, b)| a.y.min(b.y) <= center_y && center_y <= a.y.max(b.y)),
            );

            for col in 0..columns {
                let cover = coverage[col].clamp(0.0, 1.0);
                if cover <= 0.0 {
                    continue;
                }
                let center = Coord {
                    x: origin.x + col as f64 + 0.5,
                    y: center_y,
                };
                if !self.contains_center(&row_edges, center) {
                    continue;
                }
                let Some(pixel) = sample(source, center.x, center.y) else {
                    continue;
                };
                let alpha = (f64::from(pixel[3]) * cover).round() as u8;
                if alpha > 0 {
                    output.put_pixel(col as u32, row, Rgba([pixel[0], pixel[1], pixel[2], alpha]));
                }
            }
        }

        tracing::debug!(width, height, edges = edges.len(), "extracted cutout");
        Ok(output)
    }

    /// Inside intervals of the polygon along the horizontal line `y`
    fn spans_at(
        &self,
        edges: &[Edge],
        y: f64,
        crossings: &mut Vec<(f64, i32)>,
        spans: &mut Vec<(f64, f64)>,
    ) {
        crossings.clear();
        spans.clear();
        crossings.extend(edges.iter().filter_map(|e| e.crossing(y).map(|x| (x, e.winding))));
        crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut winding = 0;
        let mut span_start = 0.0;
        for &(x, dir) in crossings.iter() {
            let was_inside = self.is_inside(winding);
            winding += match self.fill_rule {
                FillRule::NonZero => dir,
                FillRule::EvenOdd => 1,
            };
            let now_inside = self.is_inside(winding);
            if !was_inside && now_inside {
                span_start = x;
            } else if was_inside && !now_inside && x > span_start {
                spans.push((span_start, x));
            }
        }
    }

    /// Exact winding test for `point`; `edges` must hold every ring edge whose
    /// vertical extent includes `point.y`. Points on an edge count as inside.
    fn contains_center(&self, edges: &[(Coord<f64>, Coord<f64>)], point: Coord<f64>) -> bool {
        let mut winding = 0;
        for &(a, b) in edges {
            let orientation = RobustKernel::orient2d(a, b, point);
            if orientation == Orientation::Collinear
                && a.x.min(b.x) <= point.x
                && point.x <= a.x.max(b.x)
            {
                return true;
            }
            if a.y <= point.y {
                if b.y > point.y && orientation == Orientation::CounterClockwise {
                    winding += 1;
                }
            } else if b.y <= point.y && orientation == Orientation::Clockwise {
                winding -= 1;
            }
        }
        self.is_inside(winding)
    }

    fn is_inside(&self, winding: i32) -> bool {
        match self.fill_rule {
            FillRule::NonZero => winding != 0,
            FillRule::EvenOdd => winding % 2 != 0,
        }
    }
}

/// Add the horizontal overlap of `[start, end)` with each pixel column
fn accumulate_span(coverage: &mut [f64], start: f64, end: f64, weight: f64) {
    let start = start.max(0.0);
    let end = end.min(coverage.len() as f64);
    if end <= start {
        return;
    }
    let first = start.floor() as usize;
    let last = (end.ceil() as usize).min(coverage.len());
    for (col, cell) in coverage.iter_mut().enumerate().take(last).skip(first) {
        let left = start.max(col as f64);
        let right = end.min(col as f64 + 1.0);
        if right > left {
            *cell += (right - left) * weight;
        }
    }
}

/// Source pixel containing the point `(x, y)`, if it is inside the image
fn sample(source: &RgbaImage, x: f64, y: f64) -> Option<Rgba<u8>> {
    if x < 0.0 || y < 0.0 {
        return None;
    }
    let (px, py) = (x.floor() as u32, y.floor() as u32);
    (px < source.width() && py < source.height()).then(|| *source.get_pixel(px, py))
}

/// Encode a cut-out as PNG, keeping its transparency
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png)?;
    Ok(bytes.into_inner())
}
