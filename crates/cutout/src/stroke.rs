//! Freehand lasso strokes in view coordinates.

use serde::{Deserialize, Serialize};
use wardrobe_common::Point2D;

use crate::traits::{NoOpRenderer, OverlayFrame, OverlayRenderer};

/// An ordered run of view-space points. Once closed its last point repeats
/// the first and it no longer changes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Stroke {
    points: Vec<Point2D>,
    closed: bool,
}

impl Stroke {
    fn starting_at(point: Point2D) -> Self {
        Self {
            points: vec![point],
            closed: false,
        }
    }

    /// Rebuild a closed stroke from already-closed points
    pub(crate) fn closed_from(points: Vec<Point2D>) -> Self {
        Self { points, closed: true }
    }

    pub fn points(&self) -> &[Point2D] {
        &self.points
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Accumulates the user's lasso strokes and redraws after every change
#[derive(Debug)]
pub struct PathTracker<R: OverlayRenderer = NoOpRenderer> {
    active: Option<Stroke>,
    history: Vec<Stroke>,
    renderer: R,
}

impl PathTracker<NoOpRenderer> {
    pub fn new() -> Self {
        Self::with_renderer(NoOpRenderer)
    }
}

impl Default for PathTracker<NoOpRenderer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: OverlayRenderer> PathTracker<R> {
    pub fn with_renderer(renderer: R) -> Self {
        Self {
            active: None,
            history: Vec::new(),
            renderer,
        }
    }

    /// Start a new stroke, dropping any stroke that was never closed
    pub fn begin(&mut self, point: Point2D) {
        self.active = Some(Stroke::starting_at(point));
        self.redraw();
    }

    /// Append to the active stroke; ignored when nothing is being drawn
    pub fn extend(&mut self, point: Point2D) {
        let Some(stroke) = self.active.as_mut() else {
            return;
        };
        stroke.points.push(point);
        self.redraw();
    }

    /// Close the active stroke into a polygon and keep it in the history.
    ///
    /// Returns `None` when there is no stroke with points to close.
    pub fn close(&mut self) -> Option<&Stroke> {
        let mut stroke = self.active.take().filter(|s| !s.is_empty())?;
        let first = stroke.points[0];
        stroke.points.push(first);
        stroke.closed = true;
        self.history.push(stroke);
        self.redraw();
        self.history.last()
    }

    /// Drop the open stroke without touching the history
    pub fn discard_active(&mut self) {
        if self.active.take().is_some() {
            self.redraw();
        }
    }

    /// Forget every stroke
    pub fn clear(&mut self) {
        self.active = None;
        self.history.clear();
        self.redraw();
    }

    pub fn active(&self) -> Option<&Stroke> {
        self.active.as_ref()
    }

    pub fn history(&self) -> &[Stroke] {
        &self.history
    }

    /// The stroke extraction works from
    pub fn latest_closed(&self) -> Option<&Stroke> {
        self.history.last()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Map every closed stroke through `f`, e.g. after the viewport moved
    pub(crate) fn remap_history(&mut self, f: impl Fn(Point2D) -> Point2D) {
        self.history = self
            .history
            .iter()
            .map(|stroke| Stroke::closed_from(stroke.points.iter().copied().map(&f).collect()))
            .collect();
        self.redraw();
    }

    fn redraw(&mut self) {
        self.renderer.render(OverlayFrame {
            active: self.active.as_ref(),
            closed: &self.history,
        });
    }
}
