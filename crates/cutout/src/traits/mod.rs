use wardrobe_common::Size;

use crate::stroke::Stroke;

/// Snapshot of the lasso overlay handed to a renderer after every change
#[derive(Debug, Clone, Copy)]
pub struct OverlayFrame<'a> {
    /// Stroke still being drawn, if any
    pub active: Option<&'a Stroke>,
    /// Closed strokes, oldest first
    pub closed: &'a [Stroke],
}

/// Trait for anything that redraws the lasso overlay
pub trait OverlayRenderer: Send {
    /// Redraw the outline of every stroke and the translucent fill of closed ones
    fn render(&mut self, frame: OverlayFrame<'_>);

    /// Called before the redraw that follows a viewport change
    fn resize(&mut self, _viewport: Size) {}
}

/// Renderer that draws nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpRenderer;

impl OverlayRenderer for NoOpRenderer {
    fn render(&mut self, _frame: OverlayFrame<'_>) {}
}

/// Renderer that only counts redraws
#[derive(Debug, Clone, Copy, Default)]
pub struct CountingRenderer {
    pub redraws: usize,
}

impl OverlayRenderer for CountingRenderer {
    fn render(&mut self, _frame: OverlayFrame<'_>) {
        self.redraws += 1;
    }
}
