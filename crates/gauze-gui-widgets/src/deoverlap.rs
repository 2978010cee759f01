//! De-overlap solver for floating controls (tooltips, badges).
//!
//! Pure functions over an explicit collection of positioned boxes: callers
//! snapshot their controls into [`OverlapItem`]s, run the solver, and write
//! the positions back.

use gauze_gui::{ControlHandle, Padding};
use glam::Vec2;

/// A positioned box participating in the de-overlap pass
#[derive(Clone, Debug)]
pub struct OverlapItem {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub padding: Padding,
    /// Pinned items repel others but never move themselves
    pub fixed: bool,
    /// Per-item scale on the applied displacement
    pub delta_multiplier: f32,
}

impl OverlapItem {
    pub fn from_control(control: &ControlHandle) -> Self {
        Self {
            left: control.left_px(),
            top: control.top_px(),
            width: control.width_px(),
            height: control.height_px(),
            padding: control.padding(),
            fixed: false,
            delta_multiplier: 1.0,
        }
    }

    pub fn apply_to(&self, control: &ControlHandle) {
        control.set_position_px(self.left, self.top);
    }

    fn center(&self) -> Vec2 {
        Vec2::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }
}

/// Overlap test over the averaged extents of the two boxes
pub fn are_overlapping(a: &OverlapItem, b: &OverlapItem) -> bool {
    let width = (a.width + b.width) / 2.0;
    let height = (a.height + b.height) / 2.0;
    let ca = a.center();
    let cb = b.center();

    !(ca.x > cb.x + width
        || ca.x + width < cb.x
        || ca.y > cb.y + height
        || ca.y + height < cb.y)
}

/// Push an item back inside the screen. Returns true if it moved. An item
/// overflowing on both opposite edges is left alone (it cannot fit).
pub fn force_on_screen(item: &mut OverlapItem, screen_width: f32, screen_height: f32) -> bool {
    let mut moved = false;

    let left_overflow = -item.left + item.padding.left;
    let right_overflow = item.left + item.width + item.padding.right - screen_width;
    let top_overflow = -item.top + item.padding.top;
    let bottom_overflow = item.top + item.height + item.padding.bottom - screen_height;

    if left_overflow > 0.0 && right_overflow <= 0.0 {
        item.left += left_overflow;
        moved = true;
    }
    if right_overflow > 0.0 && left_overflow <= 0.0 {
        item.left -= right_overflow;
        moved = true;
    }
    if top_overflow > 0.0 && bottom_overflow <= 0.0 {
        item.top += top_overflow;
        moved = true;
    }
    if bottom_overflow > 0.0 && top_overflow <= 0.0 {
        item.top -= bottom_overflow;
        moved = true;
    }

    moved
}

/// One relaxation step: overlapping items repel along the line between their
/// centers, then everything is clamped on-screen. Returns true while
/// something still moved (callers iterate until it settles).
pub fn deoverlap(
    items: &mut [OverlapItem],
    screen_width: f32,
    screen_height: f32,
    delta_step: f32,
    repel_factor: f32,
) -> bool {
    let mut velocities = vec![Vec2::ZERO; items.len()];
    let mut moved = false;

    for i in 0..items.len() {
        for j in (i + 1)..items.len() {
            if !are_overlapping(&items[i], &items[j]) {
                continue;
            }
            let mut diff = items[i].center() - items[j].center();
            let mut length = diff.length();
            // Coincident centers still need a direction: push downward
            if length <= 0.001 {
                length = 0.001;
                diff = Vec2::new(0.0, -1.0);
            }
            let delta = diff.normalize() * (repel_factor / length);
            velocities[i] += delta;
            velocities[j] -= delta;
        }
    }

    for (item, velocity) in items.iter_mut().zip(velocities) {
        if item.fixed {
            continue;
        }
        if velocity.length() > 0.0 {
            let displacement = velocity.normalize() * (delta_step * item.delta_multiplier);
            item.left += displacement.x;
            item.top += displacement.y;
            moved = true;
        }
        if force_on_screen(item, screen_width, screen_height) {
            moved = true;
        }
    }

    moved
}
