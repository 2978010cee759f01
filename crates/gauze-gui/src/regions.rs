//! Dynamic-region management: pointer semantics for the interactive
//! sub-regions of a rasterized scene.

use std::cell::RefCell;
use std::rc::Rc;

use crate::control::ControlHandle;
use crate::geometry::Point;
use crate::observable::Observable;
use crate::scene::{DynamicRegion, RegionAction, RegionEvent, VectorScene};

/// Maps a pointer position in screen pixels into scene units, or `None` when
/// the position misses the blitted bitmap
pub type PointMapper = Rc<dyn Fn(Point) -> Option<Point>>;

/// The observable streams a manager feeds, owned by the bound control
#[derive(Clone)]
pub struct RegionObservables {
    pub infotip_open: Observable<RegionEvent>,
    pub infotip_close: Observable<RegionEvent>,
    pub link_activated: Observable<RegionEvent>,
}

struct ManagerInner {
    scene: Rc<dyn VectorScene>,
    events: RegionObservables,
    regions: Vec<DynamicRegion>,
    hovered: Option<DynamicRegion>,
    last_pointer: Point,
    teardown: Vec<Box<dyn FnMut()>>,
    destroyed: bool,
}

/// Turns the dynamic regions of a rasterized scene into pointer-observable
/// events on the owning control.
///
/// Subscribes to the control's pointer observables, hit-tests regions in
/// scene space, tracks the hovered region, and forwards:
/// - region entered/left, realized as infotip open/close events,
/// - clicks, realized as link activation (or infotip open for tap support),
/// - the scene's needs-redraw signal, realized as a dirty mark.
///
/// Created lazily by the owning control, destroyed with it (or earlier, when
/// the content it indexed is regenerated).
pub struct DynamicRegionManager {
    inner: Rc<RefCell<ManagerInner>>,
}

impl Clone for DynamicRegionManager {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl DynamicRegionManager {
    pub fn bind(
        control: &ControlHandle,
        scene: Rc<dyn VectorScene>,
        mapper: PointMapper,
        events: RegionObservables,
    ) -> Self {
        let manager = Self {
            inner: Rc::new(RefCell::new(ManagerInner {
                scene: Rc::clone(&scene),
                events,
                regions: scene.dynamic_regions(),
                hovered: None,
                last_pointer: Point::zero(),
                teardown: Vec::new(),
                destroyed: false,
            })),
        };

        let mut teardown: Vec<Box<dyn FnMut()>> = Vec::new();

        for observable in [control.on_pointer_enter(), control.on_pointer_move()] {
            let inner = Rc::clone(&manager.inner);
            let mapper = Rc::clone(&mapper);
            let id = observable.add(move |event| {
                let scene_point = (mapper)(event.position);
                Self::update_hover(&inner, scene_point, event.position);
            });
            let cleanup = observable.clone();
            teardown.push(Box::new(move || {
                cleanup.remove(id);
            }));
        }

        {
            let observable = control.on_pointer_out();
            let inner = Rc::clone(&manager.inner);
            let id = observable.add(move |event| {
                Self::update_hover(&inner, None, event.position);
            });
            let cleanup = observable.clone();
            teardown.push(Box::new(move || {
                cleanup.remove(id);
            }));
        }

        {
            let observable = control.on_pointer_click();
            let inner = Rc::clone(&manager.inner);
            let mapper = Rc::clone(&mapper);
            let id = observable.add(move |event| {
                let Some(scene_point) = (mapper)(event.position) else {
                    return;
                };
                let hit = {
                    let inner = inner.borrow();
                    if inner.destroyed {
                        return;
                    }
                    Self::hit_test(&inner.regions, scene_point)
                };
                let Some(region) = hit else {
                    return;
                };
                let region_event = Self::region_event(&region, event.position);
                let events = inner.borrow().events.clone();
                match region.action {
                    RegionAction::Link(_) => events.link_activated.notify(&region_event),
                    RegionAction::Infotip(_) => events.infotip_open.notify(&region_event),
                }
            });
            let cleanup = observable.clone();
            teardown.push(Box::new(move || {
                cleanup.remove(id);
            }));
        }

        if let Some(needs_redraw) = scene.on_needs_redraw() {
            let control = control.clone();
            let id = needs_redraw.add(move |_| control.mark_dirty());
            let cleanup = needs_redraw;
            teardown.push(Box::new(move || {
                cleanup.remove(id);
            }));
        }

        manager.inner.borrow_mut().teardown = teardown;
        manager
    }

    /// Re-read the region list after the scene was re-rasterized
    pub fn refresh_regions(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.destroyed {
            return;
        }
        inner.regions = inner.scene.dynamic_regions();
        // A region under the pointer may be gone now
        let position = inner.last_pointer;
        let still_there = inner
            .hovered
            .as_ref()
            .map(|hovered| inner.regions.iter().any(|region| region.id == hovered.id))
            .unwrap_or(true);
        drop(inner);
        if !still_there {
            Self::update_hover(&self.inner, None, position);
        }
    }

    /// The region currently under the pointer, if any
    pub fn hovered_region(&self) -> Option<DynamicRegion> {
        self.inner.borrow().hovered.clone()
    }

    /// Unsubscribe from everything and close any open annotation
    pub fn destroy(&self) {
        let position = self.inner.borrow().last_pointer;
        Self::update_hover(&self.inner, None, position);

        let mut inner = self.inner.borrow_mut();
        if inner.destroyed {
            return;
        }
        inner.destroyed = true;
        let mut teardown = std::mem::take(&mut inner.teardown);
        drop(inner);
        for cleanup in &mut teardown {
            cleanup();
        }
    }

    fn hit_test(regions: &[DynamicRegion], point: Point) -> Option<DynamicRegion> {
        // Later regions draw on top of earlier ones
        regions
            .iter()
            .rev()
            .find(|region| region.bounds.contains(point))
            .cloned()
    }

    fn region_event(region: &DynamicRegion, position: Point) -> RegionEvent {
        RegionEvent {
            region_id: region.id,
            action: region.action.clone(),
            bounds: region.bounds,
            position,
        }
    }

    fn update_hover(
        inner: &Rc<RefCell<ManagerInner>>,
        scene_point: Option<Point>,
        position: Point,
    ) {
        let (left, entered, scene, events) = {
            let mut state = inner.borrow_mut();
            if state.destroyed {
                return;
            }
            state.last_pointer = position;

            let hit = scene_point.and_then(|point| Self::hit_test(&state.regions, point));
            let same = match (&state.hovered, &hit) {
                (Some(a), Some(b)) => a.id == b.id,
                (None, None) => true,
                _ => false,
            };
            if same {
                return;
            }

            let left = state.hovered.take();
            state.hovered = hit.clone();
            (
                left,
                hit,
                Rc::clone(&state.scene),
                state.events.clone(),
            )
        };

        if let Some(region) = left {
            scene.set_region_hover(region.id, false);
            if matches!(region.action, RegionAction::Infotip(_)) {
                events.infotip_close.notify(&Self::region_event(&region, position));
            }
        }
        if let Some(region) = entered {
            scene.set_region_hover(region.id, true);
            if matches!(region.action, RegionAction::Infotip(_)) {
                events.infotip_open.notify(&Self::region_event(&region, position));
            }
        }
    }
}
