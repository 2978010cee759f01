//! Control substrate: the shared per-control state every widget embeds, the
//! capability trait the host drives, and the basic decoration leaves.
//!
//! There is no inheritance chain here: a widget is a cheap-clone handle that
//! embeds a [`ControlHandle`] (the state the host framework cares about) and
//! composes whatever other capabilities it needs.

use std::cell::RefCell;
use std::rc::Rc;

use crate::canvas::{Canvas, Stretch};
use crate::color::Color;
use crate::geometry::{Padding, Point, Rect};
use crate::observable::Observable;
use crate::schedule::Scheduler;

/// A pointer interaction delivered by the host, in screen pixels
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    pub position: Point,
}

impl PointerEvent {
    pub const fn new(position: Point) -> Self {
        Self { position }
    }
}

pub(crate) struct ControlCore {
    name: String,
    scheduler: Scheduler,
    width: f32,
    height: f32,
    left: f32,
    top: f32,
    rotation: f32,
    padding: Padding,
    z_index: i32,
    visible: bool,
    pointer_blocker: bool,
    hover_cursor: Option<String>,
    has_parent: bool,
    measured: Rect,
    dirty: bool,
    relayout_requested: bool,
    parent_adapt_requested: bool,
    disposed: bool,
    on_pointer_enter: Observable<PointerEvent>,
    on_pointer_move: Observable<PointerEvent>,
    on_pointer_out: Observable<PointerEvent>,
    on_pointer_click: Observable<PointerEvent>,
    on_pointer_up: Observable<PointerEvent>,
}

/// Shared control state, as one cheap-clone handle.
///
/// Pixel geometry, padding, visibility, z-order, the dirty flag the host's
/// repaint pass consumes, and the pointer observables the host feeds. Widgets
/// embed one of these instead of subclassing anything.
pub struct ControlHandle {
    inner: Rc<RefCell<ControlCore>>,
}

impl Clone for ControlHandle {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl ControlHandle {
    pub fn new(name: impl Into<String>, scheduler: &Scheduler) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ControlCore {
                name: name.into(),
                scheduler: scheduler.clone(),
                width: 0.0,
                height: 0.0,
                left: 0.0,
                top: 0.0,
                rotation: 0.0,
                padding: Padding::default(),
                z_index: 0,
                visible: true,
                pointer_blocker: false,
                hover_cursor: None,
                has_parent: false,
                measured: Rect::default(),
                dirty: false,
                relayout_requested: false,
                parent_adapt_requested: false,
                disposed: false,
                on_pointer_enter: Observable::new(),
                on_pointer_move: Observable::new(),
                on_pointer_out: Observable::new(),
                on_pointer_click: Observable::new(),
                on_pointer_up: Observable::new(),
            })),
        }
    }

    /// Whether two handles refer to the same control
    pub fn ptr_eq(&self, other: &ControlHandle) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn name(&self) -> String {
        self.inner.borrow().name.clone()
    }

    pub fn scheduler(&self) -> Scheduler {
        self.inner.borrow().scheduler.clone()
    }

    // ---- pixel geometry ----

    pub fn width_px(&self) -> f32 {
        self.inner.borrow().width
    }

    pub fn height_px(&self) -> f32 {
        self.inner.borrow().height
    }

    pub fn set_size_px(&self, width: f32, height: f32) {
        {
            let mut core = self.inner.borrow_mut();
            if core.width == width && core.height == height {
                return;
            }
            core.width = width;
            core.height = height;
        }
        self.mark_dirty();
    }

    pub fn set_width_px(&self, width: f32) {
        let height = self.height_px();
        self.set_size_px(width, height);
    }

    pub fn set_height_px(&self, height: f32) {
        let width = self.width_px();
        self.set_size_px(width, height);
    }

    pub fn left_px(&self) -> f32 {
        self.inner.borrow().left
    }

    pub fn top_px(&self) -> f32 {
        self.inner.borrow().top
    }

    pub fn set_position_px(&self, left: f32, top: f32) {
        {
            let mut core = self.inner.borrow_mut();
            if core.left == left && core.top == top {
                return;
            }
            core.left = left;
            core.top = top;
        }
        self.mark_dirty();
    }

    pub fn rotation(&self) -> f32 {
        self.inner.borrow().rotation
    }

    pub fn set_rotation(&self, radians: f32) {
        {
            let mut core = self.inner.borrow_mut();
            if core.rotation == radians {
                return;
            }
            core.rotation = radians;
        }
        self.mark_dirty();
    }

    pub fn padding(&self) -> Padding {
        self.inner.borrow().padding
    }

    pub fn set_padding(&self, padding: Padding) {
        {
            let mut core = self.inner.borrow_mut();
            if core.padding == padding {
                return;
            }
            core.padding = padding;
        }
        self.mark_dirty();
    }

    /// The on-screen rectangle resolved by the host's measurement pass.
    /// Only meaningful during paint.
    pub fn measured(&self) -> Rect {
        self.inner.borrow().measured
    }

    pub fn set_measured(&self, rect: Rect) {
        self.inner.borrow_mut().measured = rect;
    }

    // ---- z-order / visibility / pointer config ----

    pub fn z_index(&self) -> i32 {
        self.inner.borrow().z_index
    }

    pub fn set_z_index(&self, z_index: i32) {
        self.inner.borrow_mut().z_index = z_index;
    }

    pub fn is_visible(&self) -> bool {
        self.inner.borrow().visible
    }

    pub fn set_visible(&self, visible: bool) {
        {
            let mut core = self.inner.borrow_mut();
            if core.visible == visible {
                return;
            }
            core.visible = visible;
        }
        self.mark_dirty();
    }

    pub fn is_pointer_blocker(&self) -> bool {
        self.inner.borrow().pointer_blocker
    }

    pub fn set_pointer_blocker(&self, blocker: bool) {
        self.inner.borrow_mut().pointer_blocker = blocker;
    }

    pub fn hover_cursor(&self) -> Option<String> {
        self.inner.borrow().hover_cursor.clone()
    }

    pub fn set_hover_cursor(&self, cursor: Option<String>) {
        self.inner.borrow_mut().hover_cursor = cursor;
    }

    // ---- host plumbing ----

    /// Request a repaint from the host
    pub fn mark_dirty(&self) {
        self.inner.borrow_mut().dirty = true;
    }

    /// Consumed by the host's paint pass
    pub fn take_dirty(&self) -> bool {
        std::mem::replace(&mut self.inner.borrow_mut().dirty, false)
    }

    /// Request a full relayout from the host (implies a repaint)
    pub fn mark_all_dirty(&self) {
        let mut core = self.inner.borrow_mut();
        core.dirty = true;
        core.relayout_requested = true;
    }

    /// Consumed by the host's measurement pass
    pub fn take_relayout_request(&self) -> bool {
        std::mem::replace(&mut self.inner.borrow_mut().relayout_requested, false)
    }

    pub fn set_has_parent(&self, has_parent: bool) {
        self.inner.borrow_mut().has_parent = has_parent;
    }

    pub fn has_parent(&self) -> bool {
        self.inner.borrow().has_parent
    }

    /// Flag the owning container that this control changed size and the
    /// container should adapt. Consumed by the container's measure pass.
    pub fn request_parent_adapt(&self) {
        self.inner.borrow_mut().parent_adapt_requested = true;
    }

    pub fn take_parent_adapt_request(&self) -> bool {
        std::mem::replace(&mut self.inner.borrow_mut().parent_adapt_requested, false)
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.borrow().disposed
    }

    /// Release the control's host-facing state. Idempotent.
    pub fn dispose(&self) {
        let mut core = self.inner.borrow_mut();
        if core.disposed {
            return;
        }
        core.disposed = true;
        core.on_pointer_enter.clear();
        core.on_pointer_move.clear();
        core.on_pointer_out.clear();
        core.on_pointer_click.clear();
        core.on_pointer_up.clear();
    }

    // ---- pointer observables ----

    pub fn on_pointer_enter(&self) -> Observable<PointerEvent> {
        self.inner.borrow().on_pointer_enter.clone()
    }

    pub fn on_pointer_move(&self) -> Observable<PointerEvent> {
        self.inner.borrow().on_pointer_move.clone()
    }

    pub fn on_pointer_out(&self) -> Observable<PointerEvent> {
        self.inner.borrow().on_pointer_out.clone()
    }

    pub fn on_pointer_click(&self) -> Observable<PointerEvent> {
        self.inner.borrow().on_pointer_click.clone()
    }

    pub fn on_pointer_up(&self) -> Observable<PointerEvent> {
        self.inner.borrow().on_pointer_up.clone()
    }
}

/// The capability every widget exposes to the host's lifecycle.
///
/// The host (or an owning container) drives `pre_measure`/`post_measure`
/// around its measurement pass and `draw` during paint. `dispose` releases
/// owned resources first and the embedded parts last.
pub trait Control {
    fn base(&self) -> &ControlHandle;

    fn type_name(&self) -> &'static str;

    fn pre_measure(&self) {}

    fn post_measure(&self) {}

    fn draw(&self, canvas: &mut dyn Canvas) {
        let _ = canvas;
    }

    fn dispose(&self) {
        self.base().dispose();
    }
}

/// A plain filled-rectangle decoration leaf
pub struct RectangleControl {
    base: ControlHandle,
    style: Rc<RefCell<RectangleVisual>>,
}

struct RectangleVisual {
    background: Color,
    border_color: Color,
    border_thickness: f32,
    corner_radius: f32,
}

impl Clone for RectangleControl {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            style: Rc::clone(&self.style),
        }
    }
}

impl RectangleControl {
    pub fn new(name: impl Into<String>, scheduler: &Scheduler) -> Self {
        Self {
            base: ControlHandle::new(name, scheduler),
            style: Rc::new(RefCell::new(RectangleVisual {
                background: Color::transparent(),
                border_color: Color::transparent(),
                border_thickness: 0.0,
                corner_radius: 0.0,
            })),
        }
    }

    pub fn background(&self) -> Color {
        self.style.borrow().background
    }

    pub fn set_background(&self, color: Color) {
        self.style.borrow_mut().background = color;
        self.base.mark_dirty();
    }

    pub fn border_color(&self) -> Color {
        self.style.borrow().border_color
    }

    pub fn set_border_color(&self, color: Color) {
        self.style.borrow_mut().border_color = color;
        self.base.mark_dirty();
    }

    pub fn border_thickness(&self) -> f32 {
        self.style.borrow().border_thickness
    }

    pub fn set_border_thickness(&self, thickness: f32) {
        self.style.borrow_mut().border_thickness = thickness;
        self.base.mark_dirty();
    }

    pub fn corner_radius(&self) -> f32 {
        self.style.borrow().corner_radius
    }

    pub fn set_corner_radius(&self, radius: f32) {
        self.style.borrow_mut().corner_radius = radius;
        self.base.mark_dirty();
    }
}

impl Control for RectangleControl {
    fn base(&self) -> &ControlHandle {
        &self.base
    }

    fn type_name(&self) -> &'static str {
        "Rectangle"
    }

    fn draw(&self, canvas: &mut dyn Canvas) {
        let style = self.style.borrow();
        let border = if style.border_thickness > 0.0 {
            Some((style.border_color, style.border_thickness))
        } else {
            None
        };
        canvas.fill_round_rect(
            self.base.measured(),
            style.background,
            border,
            style.corner_radius,
        );
    }
}

/// An image decoration leaf (source + stretch + optional 9-slice margins)
pub struct ImageControl {
    base: ControlHandle,
    style: Rc<RefCell<ImageVisual>>,
}

struct ImageVisual {
    source: String,
    stretch: Stretch,
    slice: Option<Padding>,
}

impl Clone for ImageControl {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            style: Rc::clone(&self.style),
        }
    }
}

impl ImageControl {
    pub fn new(name: impl Into<String>, scheduler: &Scheduler) -> Self {
        Self {
            base: ControlHandle::new(name, scheduler),
            style: Rc::new(RefCell::new(ImageVisual {
                source: String::new(),
                stretch: Stretch::Fill,
                slice: None,
            })),
        }
    }

    pub fn source(&self) -> String {
        self.style.borrow().source.clone()
    }

    pub fn set_source(&self, source: impl Into<String>) {
        self.style.borrow_mut().source = source.into();
        self.base.mark_dirty();
    }

    pub fn stretch(&self) -> Stretch {
        self.style.borrow().stretch
    }

    pub fn set_stretch(&self, stretch: Stretch) {
        self.style.borrow_mut().stretch = stretch;
        self.base.mark_dirty();
    }

    pub fn slice(&self) -> Option<Padding> {
        self.style.borrow().slice
    }

    pub fn set_slice(&self, slice: Option<Padding>) {
        self.style.borrow_mut().slice = slice;
        self.base.mark_dirty();
    }
}

impl Control for ImageControl {
    fn base(&self) -> &ControlHandle {
        &self.base
    }

    fn type_name(&self) -> &'static str {
        "Image"
    }

    fn draw(&self, canvas: &mut dyn Canvas) {
        let style = self.style.borrow();
        if style.source.is_empty() {
            return;
        }
        canvas.draw_image(
            &style.source,
            self.base.measured(),
            style.stretch,
            style.slice,
        );
    }
}
