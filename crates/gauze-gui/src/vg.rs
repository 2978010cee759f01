//! The vector-graphic leaf control: owns a scene, rasterizes it offscreen,
//! blits the result during paint.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::canvas::{Canvas, Stretch};
use crate::control::{Control, ControlHandle};
use crate::debounce::Debounced;
use crate::geometry::{Point, Rect};
use crate::observable::Observable;
use crate::promise::Promise;
use crate::regions::{DynamicRegionManager, PointMapper, RegionObservables};
use crate::scene::{RegionEvent, VectorScene};
use crate::schedule::Scheduler;
use crate::surface::RasterSurface;

struct VgState {
    scene: Option<Rc<dyn VectorScene>>,
    surface: RasterSurface,
    rendered: bool,
    stretch: Stretch,
    auto_scale: bool,
    /// Set when a specialization (flowing text) drives sizing itself
    auto_vg: bool,
    manager: Option<DynamicRegionManager>,
    on_rendered: Observable<()>,
    on_infotip_open: Observable<RegionEvent>,
    on_infotip_close: Observable<RegionEvent>,
    on_link_activated: Observable<RegionEvent>,
}

/// A control that renders a vector scene.
///
/// The scene rasterizes asynchronously into an owned offscreen
/// [`RasterSurface`]; the paint pass blits that surface into the measured
/// rectangle according to the stretch mode. Scene replacement while a
/// rasterization is in flight is safe: a stale completion is discarded by
/// re-checking the owned scene before touching any state.
pub struct Vg {
    base: ControlHandle,
    state: Rc<RefCell<VgState>>,
    render_op: Rc<Debounced>,
}

impl Clone for Vg {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            state: Rc::clone(&self.state),
            render_op: Rc::clone(&self.render_op),
        }
    }
}

impl Vg {
    pub fn new(name: impl Into<String>, scheduler: &Scheduler) -> Self {
        let base = ControlHandle::new(name, scheduler);
        let state = Rc::new(RefCell::new(VgState {
            scene: None,
            surface: RasterSurface::new(),
            rendered: false,
            stretch: Stretch::default(),
            auto_scale: false,
            auto_vg: false,
            manager: None,
            on_rendered: Observable::new(),
            on_infotip_open: Observable::new(),
            on_infotip_close: Observable::new(),
            on_link_activated: Observable::new(),
        }));

        let render_op = {
            let state = Rc::downgrade(&state);
            let base = base.clone();
            Debounced::new(scheduler, move |()| Self::render_now(&state, &base))
        };

        Self {
            base,
            state,
            render_op: Rc::new(render_op),
        }
    }

    pub fn scene(&self) -> Option<Rc<dyn VectorScene>> {
        self.state.borrow().scene.clone()
    }

    /// Replace the owned scene. `None` clears the rendering state
    /// synchronously; a scene triggers the debounced asynchronous
    /// rasterization.
    pub fn set_scene(&self, scene: Option<Rc<dyn VectorScene>>) {
        match scene {
            None => self.clear_scene(),
            Some(scene) => {
                self.adopt_scene(scene);
                self.request_render();
            }
        }
    }

    /// Take ownership of a scene without scheduling a rasterization; the
    /// caller sequences the render itself (used by the flowing-text layer,
    /// which adapts the viewport first)
    pub(crate) fn adopt_scene(&self, scene: Rc<dyn VectorScene>) {
        let manager = {
            let mut state = self.state.borrow_mut();
            state.scene = Some(scene);
            state.rendered = false;
            state.manager.take()
        };
        if let Some(manager) = manager {
            manager.destroy();
        }
    }

    fn clear_scene(&self) {
        let manager = {
            let mut state = self.state.borrow_mut();
            state.scene = None;
            state.rendered = false;
            state.manager.take()
        };
        if let Some(manager) = manager {
            manager.destroy();
        }
        self.base.mark_dirty();
    }

    /// Schedule a (debounced) rasterization of the current scene
    pub(crate) fn request_render(&self) -> Promise<()> {
        self.render_op.trigger()
    }

    /// Completion of the scheduled or in-flight rasterization, if any
    pub fn pending_render(&self) -> Option<Promise<()>> {
        self.render_op.completion()
    }

    pub fn is_rendered(&self) -> bool {
        self.state.borrow().rendered
    }

    pub fn stretch(&self) -> Stretch {
        self.state.borrow().stretch
    }

    pub fn set_stretch(&self, stretch: Stretch) {
        self.state.borrow_mut().stretch = stretch;
        self.base.mark_dirty();
    }

    pub fn auto_scale(&self) -> bool {
        self.state.borrow().auto_scale
    }

    /// When set, the control's own size follows the bitmap's native size
    /// once rendered
    pub fn set_auto_scale(&self, auto_scale: bool) {
        {
            let mut state = self.state.borrow_mut();
            if state.auto_scale == auto_scale {
                return;
            }
            state.auto_scale = auto_scale;
        }
        if auto_scale {
            self.synchronize_size_with_content();
        }
    }

    pub(crate) fn set_auto_vg(&self, auto_vg: bool) {
        self.state.borrow_mut().auto_vg = auto_vg;
    }

    /// Native pixel size of the rendered bitmap
    pub fn bitmap_size(&self) -> (u32, u32) {
        let state = self.state.borrow();
        (state.surface.width(), state.surface.height())
    }

    /// Set the control's size to the bitmap's native pixel size. No-op
    /// before the first completed rasterization.
    pub fn synchronize_size_with_content(&self) {
        let state = self.state.borrow();
        if !state.rendered {
            return;
        }
        let (width, height) = (state.surface.width() as f32, state.surface.height() as f32);
        drop(state);
        self.base.set_size_px(width, height);
    }

    pub fn on_rendered(&self) -> Observable<()> {
        self.state.borrow().on_rendered.clone()
    }

    pub fn on_infotip_open(&self) -> Observable<RegionEvent> {
        self.state.borrow().on_infotip_open.clone()
    }

    pub fn on_infotip_close(&self) -> Observable<RegionEvent> {
        self.state.borrow().on_infotip_close.clone()
    }

    pub fn on_link_activated(&self) -> Observable<RegionEvent> {
        self.state.borrow().on_link_activated.clone()
    }

    pub(crate) fn destroy_region_manager(&self) {
        if let Some(manager) = self.state.borrow_mut().manager.take() {
            manager.destroy();
        }
    }

    fn render_now(state_weak: &Weak<RefCell<VgState>>, base: &ControlHandle) -> Promise<()> {
        let Some(state_rc) = state_weak.upgrade() else {
            return Promise::resolved(());
        };
        if base.is_disposed() {
            return Promise::resolved(());
        }

        let (scene, surface) = {
            let state = state_rc.borrow();
            let Some(scene) = state.scene.clone() else {
                return Promise::resolved(());
            };
            (scene, state.surface.clone())
        };

        let viewport = scene.viewport();
        let width = viewport.width.max(0.0).ceil() as u32;
        let height = viewport.height.max(0.0).ceil() as u32;
        surface.ensure_size(width, height);
        surface.begin_render();

        let completion = Promise::pending();
        let done = completion.clone();
        let state_weak = state_weak.clone();
        let base = base.clone();
        scene.render_into(&surface).then(move |result| {
            if let Err(error) = result {
                done.reject(error.clone());
                return;
            }

            let Some(state_rc) = state_weak.upgrade() else {
                done.resolve(());
                return;
            };
            // A stale completion (scene replaced, control disposed) is an
            // expected race: discard without touching state
            let still_current = state_rc
                .borrow()
                .scene
                .as_ref()
                .map(|current| Rc::ptr_eq(current, &scene))
                .unwrap_or(false);
            if base.is_disposed() || !still_current {
                done.resolve(());
                return;
            }

            let (auto_scale, on_rendered) = {
                let mut state = state_rc.borrow_mut();
                state.rendered = true;
                (state.auto_scale, state.on_rendered.clone())
            };

            if auto_scale {
                let (width, height) = {
                    let state = state_rc.borrow();
                    (state.surface.width() as f32, state.surface.height() as f32)
                };
                base.set_size_px(width, height);
            }

            on_rendered.notify(&());
            base.mark_dirty();

            if scene.is_interactive() {
                Self::ensure_region_manager(&state_rc, &base, &scene);
            }

            done.resolve(());
        });

        completion
    }

    fn ensure_region_manager(
        state_rc: &Rc<RefCell<VgState>>,
        base: &ControlHandle,
        scene: &Rc<dyn VectorScene>,
    ) {
        let existing = state_rc
            .borrow()
            .manager
            .as_ref()
            .map(DynamicRegionManager::clone);
        if let Some(manager) = existing {
            manager.refresh_regions();
            return;
        }

        let events = {
            let state = state_rc.borrow();
            RegionObservables {
                infotip_open: state.on_infotip_open.clone(),
                infotip_close: state.on_infotip_close.clone(),
                link_activated: state.on_link_activated.clone(),
            }
        };

        let mapper: PointMapper = {
            let state_weak = Rc::downgrade(state_rc);
            let base = base.clone();
            Rc::new(move |point| {
                let state_rc = state_weak.upgrade()?;
                let state = state_rc.borrow();
                let scene = state.scene.as_ref()?;
                let (width, height) =
                    (state.surface.width() as f32, state.surface.height() as f32);
                if width <= 0.0 || height <= 0.0 {
                    return None;
                }
                let dst = blit_rect(state.stretch, width, height, base.measured());
                if dst.width() <= 0.0 || dst.height() <= 0.0 || !dst.contains(point) {
                    return None;
                }
                let viewport = scene.viewport();
                Some(Point::new(
                    viewport.x + (point.x - dst.left()) * viewport.width / dst.width(),
                    viewport.y + (point.y - dst.top()) * viewport.height / dst.height(),
                ))
            })
        };

        let manager = DynamicRegionManager::bind(base, Rc::clone(scene), mapper, events);
        state_rc.borrow_mut().manager = Some(manager);
    }
}

impl Control for Vg {
    fn base(&self) -> &ControlHandle {
        &self.base
    }

    fn type_name(&self) -> &'static str {
        "VG"
    }

    fn pre_measure(&self) {
        let (rendered, auto_vg, auto_scale) = {
            let state = self.state.borrow();
            (state.rendered, state.auto_vg, state.auto_scale)
        };
        if !rendered || auto_vg {
            return;
        }
        if auto_scale {
            self.synchronize_size_with_content();
        }
        // The host does not always re-measure nested auto-sizing containers;
        // flag the owner to adapt one hop up
        self.base.request_parent_adapt();
    }

    fn draw(&self, canvas: &mut dyn Canvas) {
        let state = self.state.borrow();
        if !state.rendered {
            return;
        }
        if state.surface.is_empty() {
            log::warn!(
                "{}: rendered bitmap has zero extent, skipping draw",
                self.base.name()
            );
            return;
        }
        let dst = blit_rect(
            state.stretch,
            state.surface.width() as f32,
            state.surface.height() as f32,
            self.base.measured(),
        );
        canvas.draw_surface(&state.surface, dst);
    }

    fn dispose(&self) {
        let manager = self.state.borrow_mut().manager.take();
        if let Some(manager) = manager {
            manager.destroy();
        }
        self.state.borrow().surface.release();
        self.base.dispose();
    }
}

/// Where a bitmap of `bitmap_width` x `bitmap_height` lands inside
/// `measured`, honoring the stretch mode
pub fn blit_rect(stretch: Stretch, bitmap_width: f32, bitmap_height: f32, measured: Rect) -> Rect {
    match stretch {
        Stretch::Uniform => {
            if bitmap_width <= 0.0 || bitmap_height <= 0.0 {
                return measured;
            }
            let ratio = (measured.width() / bitmap_width).min(measured.height() / bitmap_height);
            let width = bitmap_width * ratio;
            let height = bitmap_height * ratio;
            let left = measured.left() + (measured.width() - width) / 2.0;
            let top = measured.top() + (measured.height() - height) / 2.0;
            Rect::from_min_size([left, top], [width, height])
        }
        Stretch::None | Stretch::Fill | Stretch::Extend | Stretch::NinePatch => measured,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_blit_letterboxes_and_centers() {
        let measured = Rect::from_min_size([0.0, 0.0], [200.0, 200.0]);
        let dst = blit_rect(Stretch::Uniform, 100.0, 50.0, measured);
        assert_eq!(dst.width(), 200.0);
        assert_eq!(dst.height(), 100.0);
        assert_eq!(dst.left(), 0.0);
        assert_eq!(dst.top(), 50.0);
    }

    #[test]
    fn test_uniform_blit_pillarboxes() {
        let measured = Rect::from_min_size([10.0, 10.0], [100.0, 200.0]);
        let dst = blit_rect(Stretch::Uniform, 50.0, 200.0, measured);
        assert_eq!(dst.height(), 200.0);
        assert_eq!(dst.width(), 50.0);
        assert_eq!(dst.left(), 35.0);
        assert_eq!(dst.top(), 10.0);
    }

    #[test]
    fn test_fill_blit_covers_measured_rect() {
        let measured = Rect::from_min_size([5.0, 6.0], [70.0, 80.0]);
        for stretch in [
            Stretch::None,
            Stretch::Fill,
            Stretch::Extend,
            Stretch::NinePatch,
        ] {
            assert_eq!(blit_rect(stretch, 10.0, 10.0, measured), measured);
        }
    }
}
