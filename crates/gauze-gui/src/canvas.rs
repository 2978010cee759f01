//! The 2D drawing context supplied by the host.
//!
//! This crate never rasterizes pixels itself: controls describe blits and
//! fills against this trait during the host's paint pass, and vector scenes
//! rasterize themselves offscreen through the opaque vector library. The
//! trait is intentionally minimal - only the operations the controls in this
//! crate actually issue.

use crate::color::Color;
use crate::geometry::{Padding, Rect};
use crate::surface::RasterSurface;

/// How a bitmap maps onto a control's measured box
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Stretch {
    None,
    #[default]
    Fill,
    /// Scale by `min(w ratio, h ratio)` and center (letterbox/pillarbox)
    Uniform,
    Extend,
    NinePatch,
}

/// Host-supplied 2D drawing context
pub trait Canvas {
    /// Clear a region to transparent
    fn clear_rect(&mut self, rect: Rect);

    /// Blit an offscreen surface into `dst`
    fn draw_surface(&mut self, surface: &RasterSurface, dst: Rect);

    /// Fill a rounded rectangle, with an optional `(color, thickness)` border
    fn fill_round_rect(
        &mut self,
        rect: Rect,
        fill: Color,
        border: Option<(Color, f32)>,
        corner_radius: f32,
    );

    /// Draw an image by source identifier, honoring stretch and optional
    /// 9-slice margins
    fn draw_image(&mut self, source: &str, dst: Rect, stretch: Stretch, slice: Option<Padding>);
}
