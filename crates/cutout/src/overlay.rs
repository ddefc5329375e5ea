use image::{Rgba, RgbaImage, imageops};
use imageproc::{
    drawing::{Blend, draw_line_segment_mut, draw_polygon_mut},
    point::Point,
};
use wardrobe_common::{Point2D, Size};

use crate::{
    mapper::CoordinateMapper,
    stroke::Stroke,
    traits::{OverlayFrame, OverlayRenderer},
};

/// Draws the lasso overlay into a transparent viewport-sized layer
#[derive(Debug, Clone)]
pub struct PreviewRenderer {
    layer: RgbaImage,
    pub outline: Rgba<u8>,
    pub fill: Rgba<u8>,
}

impl PreviewRenderer {
    pub fn new(viewport: Size) -> Self {
        Self {
            layer: blank_layer(viewport),
            outline: Rgba([255, 255, 255, 255]),
            fill: Rgba([255, 255, 255, 77]),
        }
    }

    /// The most recently rendered overlay
    pub fn layer(&self) -> &RgbaImage {
        &self.layer
    }
}

impl OverlayRenderer for PreviewRenderer {
    fn render(&mut self, frame: OverlayFrame<'_>) {
        let (width, height) = self.layer.dimensions();
        let mut canvas = Blend(RgbaImage::new(width, height));

        for stroke in frame.closed {
            let ring = polygon_ring(stroke);
            if ring.len() >= 3 {
                draw_polygon_mut(&mut canvas, &ring, self.fill);
            }
            draw_outline(&mut canvas, stroke, self.outline);
        }
        if let Some(stroke) = frame.active {
            draw_outline(&mut canvas, stroke, self.outline);
        }

        self.layer = canvas.0;
    }

    fn resize(&mut self, viewport: Size) {
        self.layer = blank_layer(viewport);
    }
}

fn blank_layer(viewport: Size) -> RgbaImage {
    RgbaImage::new(
        viewport.width.max(0.0).ceil() as u32,
        viewport.height.max(0.0).ceil() as u32,
    )
}

fn draw_outline(canvas: &mut Blend<RgbaImage>, stroke: &Stroke, color: Rgba<u8>) {
    for pair in stroke.points().windows(2) {
        let (a, b) = (pair[0], pair[1]);
        draw_line_segment_mut(canvas, (a.x as f32, a.y as f32), (b.x as f32, b.y as f32), color);
    }
}

/// Integer ring for imageproc: no repeated neighbours and an open end
fn polygon_ring(stroke: &Stroke) -> Vec<Point<i32>> {
    let mut ring: Vec<Point<i32>> = Vec::with_capacity(stroke.len());
    for p in stroke.points() {
        let point = Point::new(p.x.round() as i32, p.y.round() as i32);
        if ring.last() != Some(&point) {
            ring.push(point);
        }
    }
    while ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

/// Render what the user sees: the fitted photo with the overlay on top
pub fn compose_preview(photo: &RgbaImage, mapper: &CoordinateMapper, layer: &RgbaImage) -> RgbaImage {
    let viewport = mapper.viewport();
    let display = mapper.display_rect();
    let mut canvas = RgbaImage::from_pixel(
        viewport.width.ceil() as u32,
        viewport.height.ceil() as u32,
        Rgba([0, 0, 0, 255]),
    );

    let fitted = imageops::resize(
        photo,
        display.size.width.round().max(1.0) as u32,
        display.size.height.round().max(1.0) as u32,
        imageops::FilterType::Triangle,
    );
    let Point2D { x, y } = display.position;
    imageops::overlay(&mut canvas, &fitted, x.round() as i64, y.round() as i64);
    imageops::overlay(&mut canvas, layer, 0, 0);
    canvas
}
