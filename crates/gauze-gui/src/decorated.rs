//! Composite control with a decoration layer and a content layer.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::canvas::{Canvas, Stretch};
use crate::color::Color;
use crate::control::{Control, ControlHandle, ImageControl, RectangleControl};
use crate::debounce::Debounced;
use crate::flowing_text::{ContentMeasure, FlowingText};
use crate::geometry::Padding;
use crate::observable::Observable;
use crate::promise::Promise;
use crate::scene::{
    DynamicTextStyles, HorizontalAlign, RegionEvent, TextAttributes, TextEngine, TextSource,
    TextSpan, TextWrapping, VectorScene, VerticalAlign,
};
use crate::schedule::Scheduler;
use crate::vg::Vg;

const DECORATION_LAYER: i32 = 0;
const CONTENT_LAYER: i32 = 1;

/// The capability a control needs to occupy a container's content slot
pub trait ContentControl: Control {
    fn on_size_updated(&self) -> Option<Observable<ContentMeasure>> {
        None
    }

    /// Synchronous query of the last reported measure
    fn content_measure(&self) -> Option<ContentMeasure> {
        None
    }

    fn on_infotip_open(&self) -> Option<Observable<RegionEvent>> {
        None
    }

    fn on_infotip_close(&self) -> Option<Observable<RegionEvent>> {
        None
    }

    /// Apply the container's declared intent to this control
    fn apply_content_properties(&self, properties: &ContentProperties);

    /// Read back the properties as this control's setters coerced them
    fn properties_snapshot(&self) -> ContentProperties;
}

/// The container's declared intent for its content control.
///
/// This is the durable source of truth: it survives content recreation and
/// is (re)applied whenever a content control is attached.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContentProperties {
    pub padding: Padding,
    pub source: Option<TextSource>,
    pub attr: Option<TextAttributes>,
    pub line_spacing: Option<f32>,
    pub wrapping: Option<TextWrapping>,
    pub horizontal_align: Option<HorizontalAlign>,
    pub vertical_align: Option<VerticalAlign>,
    pub dynamic_styles: Option<DynamicTextStyles>,
    pub fx: Option<String>,
}

/// Which decoration the container builds for its background layer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DecorationKind {
    #[default]
    Rectangle,
    Image,
    VectorGraphic,
}

/// Styling of a [`DecorationKind::Rectangle`] decoration
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RectangleDecoration {
    pub background: Color,
    pub border_color: Color,
    pub border_thickness: f32,
    pub corner_radius: f32,
}

impl Default for RectangleDecoration {
    fn default() -> Self {
        Self {
            background: Color::srgb(0x00, 0x80, 0x00),
            border_color: Color::srgb(0xff, 0xa5, 0x00),
            border_thickness: 4.0,
            corner_radius: 20.0,
        }
    }
}

/// Styling of a [`DecorationKind::Image`] decoration
#[derive(Clone, Debug, PartialEq)]
pub struct ImageDecoration {
    pub source: String,
    pub stretch: Stretch,
    pub slice: Option<Padding>,
}

impl Default for ImageDecoration {
    fn default() -> Self {
        Self {
            source: String::new(),
            stretch: Stretch::NinePatch,
            slice: None,
        }
    }
}

struct ContainerState {
    decoration: Option<Box<dyn Control>>,
    content: Option<Box<dyn ContentControl>>,
    rect_decoration: Option<RectangleControl>,
    image_decoration: Option<ImageControl>,
    vg_decoration: Option<Vg>,
    kind: DecorationKind,
    rect_style: RectangleDecoration,
    image_style: ImageDecoration,
    vg_scene: Option<Rc<dyn VectorScene>>,
    properties: ContentProperties,
    auto_scale_to_content: bool,
    ideal_width: f32,
    ideal_height: f32,
    turn_visible_on_ready: bool,
    content_size_ready: bool,
    auto_scale_ready: Promise<()>,
    on_content_created: Observable<()>,
    on_infotip_open: Observable<RegionEvent>,
    on_infotip_close: Observable<RegionEvent>,
    content_teardown: Vec<Box<dyn FnMut()>>,
    decoration_hook: Option<Rc<dyn Fn(&dyn Control)>>,
}

/// A container with two independently swappable children: a decoration
/// (background visual) and a content control (typically flowing text).
///
/// The decoration always sits on layer 0 and the content on layer 1.
/// Replacing either slot detaches the previous occupant and hands its
/// ownership back to the caller. Content properties live on the container
/// and are re-applied whenever content is (re)created; with
/// `auto_scale_to_content` the container sizes itself from the content's
/// reported natural size.
pub struct DecoratedContainer {
    base: ControlHandle,
    state: Rc<RefCell<ContainerState>>,
    rebuild_op: Rc<Debounced>,
    apply_op: Rc<Debounced>,
}

impl Clone for DecoratedContainer {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            state: Rc::clone(&self.state),
            rebuild_op: Rc::clone(&self.rebuild_op),
            apply_op: Rc::clone(&self.apply_op),
        }
    }
}

impl DecoratedContainer {
    pub fn new(name: impl Into<String>, scheduler: &Scheduler) -> Self {
        let base = ControlHandle::new(name, scheduler);
        let state = Rc::new(RefCell::new(ContainerState {
            decoration: None,
            content: None,
            rect_decoration: None,
            image_decoration: None,
            vg_decoration: None,
            kind: DecorationKind::default(),
            rect_style: RectangleDecoration::default(),
            image_style: ImageDecoration::default(),
            vg_scene: None,
            properties: ContentProperties::default(),
            auto_scale_to_content: false,
            ideal_width: 0.0,
            ideal_height: 0.0,
            turn_visible_on_ready: false,
            content_size_ready: false,
            auto_scale_ready: Promise::pending(),
            on_content_created: Observable::new(),
            on_infotip_open: Observable::new(),
            on_infotip_close: Observable::new(),
            content_teardown: Vec::new(),
            decoration_hook: None,
        }));

        let rebuild_op = {
            let state = Rc::downgrade(&state);
            let base = base.clone();
            Rc::new(Debounced::new(scheduler, move |()| {
                Self::rebuild_decoration_now(&state, &base);
                Promise::resolved(())
            }))
        };

        let apply_op = {
            let state = Rc::downgrade(&state);
            let base = base.clone();
            Rc::new(Debounced::new(scheduler, move |()| {
                Self::apply_content_properties_now(&state, &base);
                Promise::resolved(())
            }))
        };

        Self {
            base,
            state,
            rebuild_op,
            apply_op,
        }
    }

    // ---- decoration slot ----

    /// Replace the decoration. Returns the previous occupant (ownership
    /// transfers back to the caller; it is detached, not disposed).
    /// Assigning the control already in place is a no-op that hands the
    /// argument straight back.
    pub fn set_decoration(&self, decoration: Box<dyn Control>) -> Option<Box<dyn Control>> {
        Self::install_decoration(&self.state, &self.base, decoration)
    }

    fn install_decoration(
        state_rc: &Rc<RefCell<ContainerState>>,
        base: &ControlHandle,
        decoration: Box<dyn Control>,
    ) -> Option<Box<dyn Control>> {
        let identical = state_rc
            .borrow()
            .decoration
            .as_ref()
            .map(|current| current.base().ptr_eq(decoration.base()))
            .unwrap_or(false);
        if identical {
            return Some(decoration);
        }

        let previous = {
            let mut state = state_rc.borrow_mut();
            state.rect_decoration = None;
            state.image_decoration = None;
            state.vg_decoration = None;
            state.decoration.take()
        };
        if let Some(previous) = &previous {
            previous.base().set_has_parent(false);
        }

        Self::attach_child(state_rc, base, decoration.base(), DECORATION_LAYER);
        let hook = state_rc.borrow().decoration_hook.clone();
        if let Some(hook) = hook {
            hook(decoration.as_ref());
        }
        state_rc.borrow_mut().decoration = Some(decoration);
        base.mark_dirty();
        previous
    }

    pub fn has_decoration(&self) -> bool {
        self.state.borrow().decoration.is_some()
    }

    pub fn map_decoration<R>(&self, f: impl FnOnce(&dyn Control) -> R) -> Option<R> {
        let state = self.state.borrow();
        state.decoration.as_deref().map(f)
    }

    /// Hook invoked on every newly attached decoration (event registration)
    pub fn set_decoration_hook(&self, hook: impl Fn(&dyn Control) + 'static) {
        self.state.borrow_mut().decoration_hook = Some(Rc::new(hook));
    }

    // ---- content slot ----

    /// Replace the content control. Same detach/attach protocol as
    /// [`set_decoration`](Self::set_decoration); additionally wires the
    /// content's size and infotip observables and applies the stored
    /// content properties.
    pub fn set_content(&self, content: Box<dyn ContentControl>) -> Option<Box<dyn ContentControl>> {
        let identical = self
            .state
            .borrow()
            .content
            .as_ref()
            .map(|current| current.base().ptr_eq(content.base()))
            .unwrap_or(false);
        if identical {
            return Some(content);
        }

        let (previous, mut teardown) = {
            let mut state = self.state.borrow_mut();
            (
                state.content.take(),
                std::mem::take(&mut state.content_teardown),
            )
        };
        for cleanup in &mut teardown {
            cleanup();
        }
        if let Some(previous) = &previous {
            previous.base().set_has_parent(false);
        }

        Self::attach_child(&self.state, &self.base, content.base(), CONTENT_LAYER);

        let mut teardown: Vec<Box<dyn FnMut()>> = Vec::new();

        if let Some(size_updated) = content.on_size_updated() {
            let state_weak = Rc::downgrade(&self.state);
            let base = self.base.clone();
            let id = size_updated.add(move |measure| {
                Self::on_content_size_report(&state_weak, &base, Some(*measure));
            });
            let cleanup = size_updated;
            teardown.push(Box::new(move || {
                cleanup.remove(id);
            }));
        }

        // Bubble the content's infotip events one level up
        if let Some(open) = content.on_infotip_open() {
            let forward = self.state.borrow().on_infotip_open.clone();
            let id = open.add(move |event| forward.notify(event));
            let cleanup = open;
            teardown.push(Box::new(move || {
                cleanup.remove(id);
            }));
        }
        if let Some(close) = content.on_infotip_close() {
            let forward = self.state.borrow().on_infotip_close.clone();
            let id = close.add(move |event| forward.notify(event));
            let cleanup = close;
            teardown.push(Box::new(move || {
                cleanup.remove(id);
            }));
        }

        let created = {
            let mut state = self.state.borrow_mut();
            state.content = Some(content);
            state.content_teardown = teardown;
            state.on_content_created.clone()
        };

        Self::apply_content_properties_now(&Rc::downgrade(&self.state), &self.base);
        created.notify(&());
        Self::on_content_size_report(&Rc::downgrade(&self.state), &self.base, None);
        self.base.mark_dirty();
        previous
    }

    pub fn has_content(&self) -> bool {
        self.state.borrow().content.is_some()
    }

    pub fn map_content<R>(&self, f: impl FnOnce(&dyn ContentControl) -> R) -> Option<R> {
        let state = self.state.borrow();
        state.content.as_deref().map(f)
    }

    /// Create a [`FlowingText`], install it as content and hand back a
    /// typed handle
    pub fn spawn_flowing_text_content(&self, engine: Rc<dyn TextEngine>) -> FlowingText {
        let text = FlowingText::new(
            format!("{}:flowingText", self.base.name()),
            &self.base.scheduler(),
            engine,
        );
        self.set_content(Box::new(text.clone()));
        text
    }

    fn attach_child(
        state_rc: &Rc<RefCell<ContainerState>>,
        base: &ControlHandle,
        child: &ControlHandle,
        layer: i32,
    ) {
        child.set_z_index(layer);
        child.set_has_parent(true);
        {
            let state = state_rc.borrow();
            if state.auto_scale_to_content
                && state.turn_visible_on_ready
                && !state.content_size_ready
            {
                child.set_visible(false);
            }
        }
        child.set_pointer_blocker(base.is_pointer_blocker());
        child.set_hover_cursor(base.hover_cursor());
        child.set_size_px(base.width_px(), base.height_px());
    }

    // ---- decoration kind + styles ----

    pub fn decoration_kind(&self) -> DecorationKind {
        self.state.borrow().kind
    }

    /// Select the decoration kind; the decoration control is torn down and
    /// rebuilt (debounced), even when the kind is re-applied
    pub fn set_decoration_kind(&self, kind: DecorationKind) {
        self.state.borrow_mut().kind = kind;
        self.rebuild_op.trigger();
    }

    pub fn rectangle_style(&self) -> RectangleDecoration {
        self.state.borrow().rect_style
    }

    pub fn image_style(&self) -> ImageDecoration {
        self.state.borrow().image_style.clone()
    }

    pub fn set_background_color(&self, color: Color) {
        if self.state.borrow().kind != DecorationKind::Rectangle {
            return;
        }
        self.state.borrow_mut().rect_style.background = color;
        if let Some(rect) = self.state.borrow().rect_decoration.clone() {
            rect.set_background(color);
        }
    }

    pub fn set_border_color(&self, color: Color) {
        if self.state.borrow().kind != DecorationKind::Rectangle {
            return;
        }
        self.state.borrow_mut().rect_style.border_color = color;
        if let Some(rect) = self.state.borrow().rect_decoration.clone() {
            rect.set_border_color(color);
        }
    }

    pub fn set_border_thickness(&self, thickness: f32) {
        if self.state.borrow().kind != DecorationKind::Rectangle {
            return;
        }
        self.state.borrow_mut().rect_style.border_thickness = thickness;
        if let Some(rect) = self.state.borrow().rect_decoration.clone() {
            rect.set_border_thickness(thickness);
        }
    }

    pub fn set_corner_radius(&self, radius: f32) {
        if self.state.borrow().kind != DecorationKind::Rectangle {
            return;
        }
        self.state.borrow_mut().rect_style.corner_radius = radius;
        if let Some(rect) = self.state.borrow().rect_decoration.clone() {
            rect.set_corner_radius(radius);
        }
    }

    pub fn set_image_source(&self, source: impl Into<String>) {
        if self.state.borrow().kind != DecorationKind::Image {
            return;
        }
        let source = source.into();
        self.state.borrow_mut().image_style.source = source.clone();
        if let Some(image) = self.state.borrow().image_decoration.clone() {
            image.set_source(source);
        }
    }

    pub fn set_image_stretch(&self, stretch: Stretch) {
        if self.state.borrow().kind != DecorationKind::Image {
            return;
        }
        self.state.borrow_mut().image_style.stretch = stretch;
        if let Some(image) = self.state.borrow().image_decoration.clone() {
            image.set_stretch(stretch);
        }
    }

    pub fn set_image_slice(&self, slice: Option<Padding>) {
        if self.state.borrow().kind != DecorationKind::Image {
            return;
        }
        self.state.borrow_mut().image_style.slice = slice;
        if let Some(image) = self.state.borrow().image_decoration.clone() {
            image.set_slice(slice);
        }
    }

    /// Supply the externally built scene for a
    /// [`DecorationKind::VectorGraphic`] decoration
    pub fn set_decoration_scene(&self, scene: Rc<dyn VectorScene>) {
        if self.state.borrow().kind != DecorationKind::VectorGraphic {
            return;
        }
        self.state.borrow_mut().vg_scene = Some(Rc::clone(&scene));
        if let Some(vg) = self.state.borrow().vg_decoration.clone() {
            vg.set_scene(Some(scene));
        }
    }

    fn rebuild_decoration_now(state_weak: &Weak<RefCell<ContainerState>>, base: &ControlHandle) {
        let Some(state_rc) = state_weak.upgrade() else {
            return;
        };
        if base.is_disposed() {
            return;
        }

        let (kind, rect_style, image_style, vg_scene) = {
            let state = state_rc.borrow();
            (
                state.kind,
                state.rect_style,
                state.image_style.clone(),
                state.vg_scene.clone(),
            )
        };
        let scheduler = base.scheduler();
        let previous = match kind {
            DecorationKind::Rectangle => {
                let rect = RectangleControl::new(format!("{}:rectangle", base.name()), &scheduler);
                rect.set_background(rect_style.background);
                rect.set_border_color(rect_style.border_color);
                rect.set_border_thickness(rect_style.border_thickness);
                rect.set_corner_radius(rect_style.corner_radius);
                let previous = Self::install_decoration(&state_rc, base, Box::new(rect.clone()));
                state_rc.borrow_mut().rect_decoration = Some(rect);
                previous
            }
            DecorationKind::Image => {
                let image = ImageControl::new(format!("{}:image", base.name()), &scheduler);
                image.set_source(image_style.source.clone());
                image.set_stretch(image_style.stretch);
                image.set_slice(image_style.slice);
                let previous = Self::install_decoration(&state_rc, base, Box::new(image.clone()));
                state_rc.borrow_mut().image_decoration = Some(image);
                previous
            }
            DecorationKind::VectorGraphic => {
                let vg = Vg::new(format!("{}:vg", base.name()), &scheduler);
                vg.set_stretch(Stretch::Fill);
                if let Some(scene) = vg_scene {
                    vg.set_scene(Some(scene));
                }
                let previous = Self::install_decoration(&state_rc, base, Box::new(vg.clone()));
                state_rc.borrow_mut().vg_decoration = Some(vg);
                previous
            }
        };
        // The replaced decoration was container-built: nobody else owns it
        if let Some(previous) = previous {
            previous.dispose();
        }
    }

    // ---- content properties ----

    pub fn content_properties(&self) -> ContentProperties {
        self.state.borrow().properties.clone()
    }

    pub fn text(&self) -> Option<String> {
        match &self.state.borrow().properties.source {
            Some(TextSource::Plain(text)) => Some(text.clone()),
            _ => None,
        }
    }

    pub fn set_text(&self, text: impl Into<String>) {
        self.set_property(|properties| properties.source = Some(TextSource::Plain(text.into())));
    }

    pub fn markup_text(&self) -> Option<String> {
        match &self.state.borrow().properties.source {
            Some(TextSource::Markup(text)) => Some(text.clone()),
            _ => None,
        }
    }

    pub fn set_markup_text(&self, text: impl Into<String>) {
        self.set_property(|properties| properties.source = Some(TextSource::Markup(text.into())));
    }

    pub fn structured_text(&self) -> Option<Vec<TextSpan>> {
        match &self.state.borrow().properties.source {
            Some(TextSource::Structured(spans)) => Some(spans.clone()),
            _ => None,
        }
    }

    pub fn set_structured_text(&self, spans: Vec<TextSpan>) {
        self.set_property(|properties| properties.source = Some(TextSource::Structured(spans)));
    }

    pub fn text_padding(&self) -> Padding {
        self.state.borrow().properties.padding
    }

    pub fn set_text_padding(&self, padding: Padding) {
        self.set_property(|properties| properties.padding = padding);
    }

    pub fn text_attr(&self) -> Option<TextAttributes> {
        self.state.borrow().properties.attr.clone()
    }

    pub fn set_text_attr(&self, patch: &TextAttributes) {
        self.set_property(|properties| {
            properties
                .attr
                .get_or_insert_with(TextAttributes::default)
                .apply(patch);
        });
    }

    pub fn text_line_spacing(&self) -> Option<f32> {
        self.state.borrow().properties.line_spacing
    }

    pub fn set_text_line_spacing(&self, line_spacing: f32) {
        self.set_property(|properties| properties.line_spacing = Some(line_spacing));
    }

    pub fn text_wrapping(&self) -> Option<TextWrapping> {
        self.state.borrow().properties.wrapping
    }

    pub fn set_text_wrapping(&self, wrapping: TextWrapping) {
        self.set_property(|properties| properties.wrapping = Some(wrapping));
    }

    pub fn text_horizontal_align(&self) -> Option<HorizontalAlign> {
        self.state.borrow().properties.horizontal_align
    }

    pub fn set_text_horizontal_align(&self, align: HorizontalAlign) {
        self.set_property(|properties| properties.horizontal_align = Some(align));
    }

    pub fn text_vertical_align(&self) -> Option<VerticalAlign> {
        self.state.borrow().properties.vertical_align
    }

    pub fn set_text_vertical_align(&self, align: VerticalAlign) {
        self.set_property(|properties| properties.vertical_align = Some(align));
    }

    pub fn text_dynamic_styles(&self) -> Option<DynamicTextStyles> {
        self.state.borrow().properties.dynamic_styles.clone()
    }

    pub fn set_text_dynamic_styles(&self, styles: DynamicTextStyles) {
        self.set_property(|properties| properties.dynamic_styles = Some(styles));
    }

    pub fn text_fx(&self) -> Option<String> {
        self.state.borrow().properties.fx.clone()
    }

    pub fn set_text_fx(&self, fx: Option<String>) {
        self.set_property(|properties| properties.fx = fx);
    }

    fn set_property(&self, mutate: impl FnOnce(&mut ContentProperties)) {
        {
            let mut state = self.state.borrow_mut();
            mutate(&mut state.properties);
        }
        if self.has_content() {
            self.apply_op.trigger();
        }
    }

    fn apply_content_properties_now(
        state_weak: &Weak<RefCell<ContainerState>>,
        base: &ControlHandle,
    ) {
        let Some(state_rc) = state_weak.upgrade() else {
            return;
        };
        if base.is_disposed() || state_rc.borrow().content.is_none() {
            return;
        }

        let properties = state_rc.borrow().properties.clone();

        // A container smaller than its content padding would measure
        // negative; grow to fit instead of failing
        let padding = properties.padding;
        if padding.vertical() > base.height_px() {
            log::warn!(
                "{}: height {} smaller than content padding {}, expanding",
                base.name(),
                base.height_px(),
                padding.vertical()
            );
            base.set_height_px(padding.vertical() + 1.0);
        }
        if padding.horizontal() > base.width_px() {
            log::warn!(
                "{}: width {} smaller than content padding {}, expanding",
                base.name(),
                base.width_px(),
                padding.horizontal()
            );
            base.set_width_px(padding.horizontal() + 1.0);
        }

        let state = state_rc.borrow();
        let Some(content) = state.content.as_deref() else {
            return;
        };
        // Content fills the container
        content.base().set_size_px(base.width_px(), base.height_px());
        content.apply_content_properties(&properties);
        let snapshot = content.properties_snapshot();
        drop(state);
        state_rc.borrow_mut().properties = snapshot;
    }

    // ---- auto-scale to content ----

    pub fn auto_scale_to_content(&self) -> bool {
        self.state.borrow().auto_scale_to_content
    }

    pub fn set_auto_scale_to_content(&self, enabled: bool) {
        self.state.borrow_mut().auto_scale_to_content = enabled;
        Self::on_content_size_report(&Rc::downgrade(&self.state), &self.base, None);
    }

    pub fn ideal_size(&self) -> (f32, f32) {
        let state = self.state.borrow();
        (state.ideal_width, state.ideal_height)
    }

    /// Sizing negotiation gate: the auto-scale algorithm runs only while
    /// both components are non-zero
    pub fn set_ideal_size(&self, width: f32, height: f32) {
        {
            let mut state = self.state.borrow_mut();
            state.ideal_width = width;
            state.ideal_height = height;
        }
        Self::on_content_size_report(&Rc::downgrade(&self.state), &self.base, None);
    }

    pub fn turn_visible_on_content_size_ready(&self) -> bool {
        self.state.borrow().turn_visible_on_ready
    }

    /// Keep decoration and content hidden until the first successful content
    /// measurement
    pub fn set_turn_visible_on_content_size_ready(&self, enabled: bool) {
        self.state.borrow_mut().turn_visible_on_ready = enabled;
    }

    /// One-shot signal resolved at the first non-degenerate content
    /// measurement (tooltip positioning waits on this)
    pub fn auto_scale_ready(&self) -> Promise<()> {
        self.state.borrow().auto_scale_ready.clone()
    }

    pub fn is_content_size_ready(&self) -> bool {
        self.state.borrow().content_size_ready
    }

    fn on_content_size_report(
        state_weak: &Weak<RefCell<ContainerState>>,
        base: &ControlHandle,
        pushed: Option<ContentMeasure>,
    ) {
        let Some(state_rc) = state_weak.upgrade() else {
            return;
        };
        if base.is_disposed() {
            return;
        }

        let measure = {
            let state = state_rc.borrow();
            if !state.auto_scale_to_content
                || state.ideal_width == 0.0
                || state.ideal_height == 0.0
            {
                return;
            }
            let Some(content) = state.content.as_deref() else {
                return;
            };
            let Some(measure) = pushed.or_else(|| content.content_measure()) else {
                return;
            };
            // Zero-sized content usually means assets are still loading;
            // the next size report retries
            if measure.is_degenerate() {
                return;
            }
            let padding = content.base().padding();
            ContentMeasure {
                width: measure.inner_width + padding.horizontal(),
                height: measure.inner_height + padding.vertical(),
                ..measure
            }
        };

        base.set_size_px(measure.width, measure.height);

        let reveal = {
            let mut state = state_rc.borrow_mut();
            if state.content_size_ready {
                None
            } else {
                state.content_size_ready = true;
                Some((state.auto_scale_ready.clone(), state.turn_visible_on_ready))
            }
        };
        if let Some((ready, turn_visible)) = reveal {
            if turn_visible {
                let state = state_rc.borrow();
                if let Some(decoration) = state.decoration.as_deref() {
                    decoration.base().set_visible(true);
                }
                if let Some(content) = state.content.as_deref() {
                    content.base().set_visible(true);
                }
            }
            ready.resolve(());
        }
    }

    // ---- observables ----

    pub fn on_content_created(&self) -> Observable<()> {
        self.state.borrow().on_content_created.clone()
    }

    pub fn on_infotip_open(&self) -> Observable<RegionEvent> {
        self.state.borrow().on_infotip_open.clone()
    }

    pub fn on_infotip_close(&self) -> Observable<RegionEvent> {
        self.state.borrow().on_infotip_close.clone()
    }
}

impl Control for DecoratedContainer {
    fn base(&self) -> &ControlHandle {
        &self.base
    }

    fn type_name(&self) -> &'static str {
        "DecoratedContainer"
    }

    fn pre_measure(&self) {
        // Children are 100%-sized: follow the container's effective size
        let (width, height) = (self.base.width_px(), self.base.height_px());
        let mut child_requested_adapt = false;
        {
            let state = self.state.borrow();
            if let Some(decoration) = state.decoration.as_deref() {
                decoration.base().set_size_px(width, height);
                child_requested_adapt |= decoration.base().take_parent_adapt_request();
                decoration.pre_measure();
            }
            if let Some(content) = state.content.as_deref() {
                content.base().set_size_px(width, height);
                child_requested_adapt |= content.base().take_parent_adapt_request();
                content.pre_measure();
            }
        }
        // A child grew or shrank on its own; adapt one hop up when this
        // container is itself nested
        if child_requested_adapt && self.base.has_parent() {
            Self::on_content_size_report(&Rc::downgrade(&self.state), &self.base, None);
        }
    }

    fn post_measure(&self) {
        let state = self.state.borrow();
        if let Some(decoration) = state.decoration.as_deref() {
            decoration.post_measure();
        }
        if let Some(content) = state.content.as_deref() {
            content.post_measure();
        }
    }

    fn draw(&self, canvas: &mut dyn Canvas) {
        let state = self.state.borrow();
        if let Some(decoration) = state.decoration.as_deref() {
            if decoration.base().is_visible() {
                decoration.draw(canvas);
            }
        }
        if let Some(content) = state.content.as_deref() {
            if content.base().is_visible() {
                content.draw(canvas);
            }
        }
    }

    fn dispose(&self) {
        let (decoration, content, mut teardown) = {
            let mut state = self.state.borrow_mut();
            (
                state.decoration.take(),
                state.content.take(),
                std::mem::take(&mut state.content_teardown),
            )
        };
        for cleanup in &mut teardown {
            cleanup();
        }
        if let Some(decoration) = decoration {
            decoration.dispose();
        }
        if let Some(content) = content {
            content.dispose();
        }
        self.base.dispose();
    }
}

impl ContentControl for FlowingText {
    fn on_size_updated(&self) -> Option<Observable<ContentMeasure>> {
        Some(FlowingText::on_size_updated(self))
    }

    fn content_measure(&self) -> Option<ContentMeasure> {
        FlowingText::content_measure(self)
    }

    fn on_infotip_open(&self) -> Option<Observable<RegionEvent>> {
        Some(FlowingText::on_infotip_open(self))
    }

    fn on_infotip_close(&self) -> Option<Observable<RegionEvent>> {
        Some(FlowingText::on_infotip_close(self))
    }

    fn apply_content_properties(&self, properties: &ContentProperties) {
        self.set_auto_scale(false);
        self.base().set_padding(properties.padding);
        if let Some(source) = &properties.source {
            self.set_source(source.clone());
        }
        if let Some(attr) = &properties.attr {
            self.set_text_attr(attr);
        }
        if let Some(line_spacing) = properties.line_spacing {
            self.set_line_spacing(line_spacing);
        }
        if let Some(wrapping) = properties.wrapping {
            self.set_text_wrapping(wrapping);
        }
        if let Some(align) = properties.horizontal_align {
            self.set_text_horizontal_align(align);
        }
        if let Some(align) = properties.vertical_align {
            self.set_text_vertical_align(align);
        }
        if let Some(styles) = &properties.dynamic_styles {
            self.set_text_dynamic_styles(styles.clone());
        }
        if properties.fx.is_some() {
            self.set_fx(properties.fx.clone());
        }
    }

    fn properties_snapshot(&self) -> ContentProperties {
        ContentProperties {
            padding: self.base().padding(),
            source: self.source(),
            attr: Some(self.text_attr()),
            line_spacing: Some(self.line_spacing()),
            wrapping: Some(self.text_wrapping()),
            horizontal_align: Some(self.text_horizontal_align()),
            vertical_align: Some(self.text_vertical_align()),
            dynamic_styles: Some(self.text_dynamic_styles()),
            fx: self.fx(),
        }
    }
}
