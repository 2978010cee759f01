//! Deterministic stand-ins for the external collaborators (vector library,
//! host canvas), used by this crate's tests and by downstream crates' tests.

use std::cell::RefCell;
use std::rc::Rc;

use crate::canvas::{Canvas, Stretch};
use crate::color::Color;
use crate::geometry::{NaturalSize, Padding, Rect, Viewport};
use crate::observable::Observable;
use crate::promise::Promise;
use crate::scene::{
    DynamicRegion, TextEngine, TextScene, TextSceneParams, VectorScene,
};
use crate::surface::RasterSurface;

/// How a stub scene settles its asynchronous operations
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Settle {
    /// Promises resolve as soon as they are created
    #[default]
    Immediate,
    /// Promises stay pending until released through the stub's handle
    Manual,
}

struct StubSceneInner {
    viewport: Viewport,
    render_count: u32,
    pending_renders: Vec<Promise<()>>,
    settle: Settle,
    render_error: Option<String>,
    interactive: bool,
    regions: Vec<DynamicRegion>,
    hover_log: Vec<(u64, bool)>,
    needs_redraw: Observable<()>,
}

/// A scriptable [`VectorScene`]
pub struct StubScene {
    inner: Rc<RefCell<StubSceneInner>>,
}

impl Clone for StubScene {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl StubScene {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            inner: Rc::new(RefCell::new(StubSceneInner {
                viewport,
                render_count: 0,
                pending_renders: Vec::new(),
                settle: Settle::Immediate,
                render_error: None,
                interactive: false,
                regions: Vec::new(),
                hover_log: Vec::new(),
                needs_redraw: Observable::new(),
            })),
        }
    }

    pub fn with_settle(self, settle: Settle) -> Self {
        self.inner.borrow_mut().settle = settle;
        self
    }

    /// Make every subsequent rasterization reject with `reason`
    pub fn with_render_error(self, reason: impl Into<String>) -> Self {
        self.inner.borrow_mut().render_error = Some(reason.into());
        self
    }

    pub fn with_regions(self, regions: Vec<DynamicRegion>) -> Self {
        {
            let mut inner = self.inner.borrow_mut();
            inner.interactive = !regions.is_empty();
            inner.regions = regions;
        }
        self
    }

    /// How many rasterizations were started
    pub fn render_count(&self) -> u32 {
        self.inner.borrow().render_count
    }

    /// Resolve every pending rasterization (for [`Settle::Manual`])
    pub fn complete_renders(&self) {
        let pending = std::mem::take(&mut self.inner.borrow_mut().pending_renders);
        for promise in pending {
            promise.resolve(());
        }
    }

    /// Hover transitions pushed into the scene, in order
    pub fn hover_log(&self) -> Vec<(u64, bool)> {
        self.inner.borrow().hover_log.clone()
    }

    pub fn fire_needs_redraw(&self) {
        let observable = self.inner.borrow().needs_redraw.clone();
        observable.notify(&());
    }
}

impl VectorScene for StubScene {
    fn viewport(&self) -> Viewport {
        self.inner.borrow().viewport
    }

    fn set_viewport(&self, viewport: Viewport) {
        self.inner.borrow_mut().viewport = viewport;
    }

    fn render_into(&self, surface: &RasterSurface) -> Promise<()> {
        surface.with_pixels_mut(|_| {});
        let mut inner = self.inner.borrow_mut();
        inner.render_count += 1;
        if let Some(reason) = &inner.render_error {
            return Promise::rejected(crate::Error::RenderFailed(reason.clone()));
        }
        match inner.settle {
            Settle::Immediate => Promise::resolved(()),
            Settle::Manual => {
                let promise = Promise::pending();
                inner.pending_renders.push(promise.clone());
                promise
            }
        }
    }

    fn is_interactive(&self) -> bool {
        self.inner.borrow().interactive
    }

    fn dynamic_regions(&self) -> Vec<DynamicRegion> {
        self.inner.borrow().regions.clone()
    }

    fn set_region_hover(&self, region_id: u64, hovered: bool) {
        self.inner.borrow_mut().hover_log.push((region_id, hovered));
    }

    fn on_needs_redraw(&self) -> Option<Observable<()>> {
        Some(self.inner.borrow().needs_redraw.clone())
    }
}

struct StubTextSceneInner {
    natural: NaturalSize,
    text_area: Viewport,
    measure_settle: Settle,
    pending_measures: Vec<(Promise<NaturalSize>, NaturalSize)>,
}

/// A scriptable [`TextScene`] built by [`StubTextEngine`]
pub struct StubTextScene {
    scene: StubScene,
    inner: Rc<RefCell<StubTextSceneInner>>,
    pub params: TextSceneParams,
}

impl Clone for StubTextScene {
    fn clone(&self) -> Self {
        Self {
            scene: self.scene.clone(),
            inner: Rc::clone(&self.inner),
            params: self.params.clone(),
        }
    }
}

impl StubTextScene {
    pub fn new(params: TextSceneParams, natural: NaturalSize, settle: Settle) -> Self {
        Self {
            // A fresh scene has no viewport yet; the owning control's adapt
            // pass assigns it
            scene: StubScene::new(Viewport::default()).with_settle(settle),
            inner: Rc::new(RefCell::new(StubTextSceneInner {
                natural,
                text_area: params.area,
                measure_settle: settle,
                pending_measures: Vec::new(),
            })),
            params,
        }
    }

    pub fn stub_scene(&self) -> &StubScene {
        &self.scene
    }

    pub fn set_natural_size(&self, natural: NaturalSize) {
        self.inner.borrow_mut().natural = natural;
    }

    pub fn text_area(&self) -> Viewport {
        self.inner.borrow().text_area
    }

    pub fn render_count(&self) -> u32 {
        self.scene.render_count()
    }

    pub fn complete_renders(&self) {
        self.scene.complete_renders();
    }

    /// Resolve every pending measurement (for [`Settle::Manual`])
    pub fn complete_measures(&self) {
        let pending = std::mem::take(&mut self.inner.borrow_mut().pending_measures);
        for (promise, natural) in pending {
            promise.resolve(natural);
        }
    }

    fn measure(&self) -> Promise<NaturalSize> {
        let mut inner = self.inner.borrow_mut();
        match inner.measure_settle {
            Settle::Immediate => Promise::resolved(inner.natural),
            Settle::Manual => {
                let promise = Promise::pending();
                let natural = inner.natural;
                inner.pending_measures.push((promise.clone(), natural));
                promise
            }
        }
    }
}

impl VectorScene for StubTextScene {
    fn viewport(&self) -> Viewport {
        self.scene.viewport()
    }

    fn set_viewport(&self, viewport: Viewport) {
        self.scene.set_viewport(viewport);
    }

    fn render_into(&self, surface: &RasterSurface) -> Promise<()> {
        self.scene.render_into(surface)
    }

    fn is_interactive(&self) -> bool {
        self.scene.is_interactive()
    }

    fn dynamic_regions(&self) -> Vec<DynamicRegion> {
        self.scene.dynamic_regions()
    }

    fn set_region_hover(&self, region_id: u64, hovered: bool) {
        self.scene.set_region_hover(region_id, hovered);
    }

    fn on_needs_redraw(&self) -> Option<Observable<()>> {
        self.scene.on_needs_redraw()
    }
}

impl TextScene for StubTextScene {
    fn content_bounding_box(&self) -> Promise<NaturalSize> {
        self.measure()
    }

    fn content_width(&self) -> Promise<f32> {
        let natural = self.inner.borrow().natural;
        let settle = self.inner.borrow().measure_settle;
        match settle {
            Settle::Immediate => Promise::resolved(natural.width),
            Settle::Manual => {
                // Width/height queries piggyback on the bbox settlement
                let promise = Promise::pending();
                let chained = promise.clone();
                self.measure().then(move |result| {
                    if let Ok(natural) = result {
                        chained.resolve(natural.width);
                    }
                });
                promise
            }
        }
    }

    fn content_height(&self) -> Promise<f32> {
        let natural = self.inner.borrow().natural;
        let settle = self.inner.borrow().measure_settle;
        match settle {
            Settle::Immediate => Promise::resolved(natural.height),
            Settle::Manual => {
                let promise = Promise::pending();
                let chained = promise.clone();
                self.measure().then(move |result| {
                    if let Ok(natural) = result {
                        chained.resolve(natural.height);
                    }
                });
                promise
            }
        }
    }

    fn set_text_area(&self, area: Viewport) {
        self.inner.borrow_mut().text_area = area;
    }
}

struct StubTextEngineInner {
    settle: Settle,
    natural: NaturalSize,
    created: Vec<StubTextScene>,
}

/// A [`TextEngine`] that records every scene it builds
pub struct StubTextEngine {
    inner: Rc<RefCell<StubTextEngineInner>>,
}

impl Clone for StubTextEngine {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl Default for StubTextEngine {
    fn default() -> Self {
        Self::new(NaturalSize::new(120.0, 40.0), Settle::Immediate)
    }
}

impl StubTextEngine {
    pub fn new(natural: NaturalSize, settle: Settle) -> Self {
        Self {
            inner: Rc::new(RefCell::new(StubTextEngineInner {
                settle,
                natural,
                created: Vec::new(),
            })),
        }
    }

    /// The natural size handed to scenes created from now on
    pub fn set_natural_size(&self, natural: NaturalSize) {
        self.inner.borrow_mut().natural = natural;
    }

    pub fn created_count(&self) -> usize {
        self.inner.borrow().created.len()
    }

    pub fn last_scene(&self) -> Option<StubTextScene> {
        self.inner.borrow().created.last().cloned()
    }

    pub fn scenes(&self) -> Vec<StubTextScene> {
        self.inner.borrow().created.clone()
    }
}

impl TextEngine for StubTextEngine {
    fn create_text_scene(&self, params: &TextSceneParams) -> Rc<dyn TextScene> {
        let mut inner = self.inner.borrow_mut();
        let scene = StubTextScene::new(params.clone(), inner.natural, inner.settle);
        inner.created.push(scene.clone());
        Rc::new(scene)
    }
}

/// One recorded drawing operation
#[derive(Clone, Debug, PartialEq)]
pub enum CanvasOp {
    ClearRect(Rect),
    DrawSurface {
        dst: Rect,
        surface_size: (u32, u32),
    },
    FillRoundRect {
        rect: Rect,
        fill: Color,
        corner_radius: f32,
    },
    DrawImage {
        source: String,
        dst: Rect,
        stretch: Stretch,
    },
}

/// A [`Canvas`] that records the operations issued against it
#[derive(Default)]
pub struct RecordingCanvas {
    pub ops: Vec<CanvasOp>,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Canvas for RecordingCanvas {
    fn clear_rect(&mut self, rect: Rect) {
        self.ops.push(CanvasOp::ClearRect(rect));
    }

    fn draw_surface(&mut self, surface: &RasterSurface, dst: Rect) {
        self.ops.push(CanvasOp::DrawSurface {
            dst,
            surface_size: (surface.width(), surface.height()),
        });
    }

    fn fill_round_rect(
        &mut self,
        rect: Rect,
        fill: Color,
        _border: Option<(Color, f32)>,
        corner_radius: f32,
    ) {
        self.ops.push(CanvasOp::FillRoundRect {
            rect,
            fill,
            corner_radius,
        });
    }

    fn draw_image(&mut self, source: &str, dst: Rect, stretch: Stretch, _slice: Option<Padding>) {
        self.ops.push(CanvasOp::DrawImage {
            source: source.to_string(),
            dst,
            stretch,
        });
    }
}
