//! Offscreen raster target owned by a [`Vg`](crate::Vg) control.

use std::cell::RefCell;
use std::rc::Rc;

struct SurfaceState {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    /// Whether a rasterization already wrote into the current allocation
    used: bool,
}

/// An offscreen RGBA raster target.
///
/// Sized to the scene viewport it was last rasterized at; reallocated only
/// when the rounded-up viewport dimensions change. The handle is cheap to
/// clone so an in-flight rasterization can keep drawing into it, but each
/// surface belongs to exactly one control.
pub struct RasterSurface {
    inner: Rc<RefCell<SurfaceState>>,
}

impl Clone for RasterSurface {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl Default for RasterSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl RasterSurface {
    /// An empty (0x0) surface; allocation happens at first `ensure_size`
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SurfaceState {
                width: 0,
                height: 0,
                pixels: Vec::new(),
                used: false,
            })),
        }
    }

    pub fn width(&self) -> u32 {
        self.inner.borrow().width
    }

    pub fn height(&self) -> u32 {
        self.inner.borrow().height
    }

    pub fn is_empty(&self) -> bool {
        let state = self.inner.borrow();
        state.width == 0 || state.height == 0
    }

    /// Reallocate only if the dimensions changed. Returns whether it did.
    /// A fresh allocation is zeroed and marked unused, so the next
    /// `begin_render` can skip its clear.
    pub fn ensure_size(&self, width: u32, height: u32) -> bool {
        let mut state = self.inner.borrow_mut();
        if state.width == width && state.height == height {
            return false;
        }
        state.width = width;
        state.height = height;
        state.pixels = vec![0; (width as usize) * (height as usize) * 4];
        state.used = false;
        true
    }

    /// Prepare for a rasterization pass: clear the pixels only if a previous
    /// pass already used this allocation
    pub fn begin_render(&self) {
        let mut state = self.inner.borrow_mut();
        if state.used {
            state.pixels.fill(0);
        }
        state.used = true;
    }

    /// Mutable pixel access for the rasterizing vector library (RGBA,
    /// row-major)
    pub fn with_pixels_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        f(&mut self.inner.borrow_mut().pixels)
    }

    /// Drop the allocation (used on dispose)
    pub fn release(&self) {
        let mut state = self.inner.borrow_mut();
        state.width = 0;
        state.height = 0;
        state.pixels = Vec::new();
        state.used = false;
    }
}
