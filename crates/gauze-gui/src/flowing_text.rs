//! Auto-reflowing rich-text control layered on [`Vg`].

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::canvas::Canvas;
use crate::control::{Control, ControlHandle};
use crate::debounce::Debounced;
use crate::geometry::Viewport;
use crate::observable::Observable;
use crate::promise::Promise;
use crate::scene::{
    DynamicTextStyles, HorizontalAlign, TextAttributes, TextEngine, TextScene, TextSceneParams,
    TextSource, TextSpan, TextWrapping, VectorScene, VerticalAlign,
};
use crate::schedule::Scheduler;
use crate::vg::Vg;

/// The measured size a flowing text reports to its owner.
///
/// `width`/`height` are the clipped viewport size; `inner_width`/
/// `inner_height` are the unclipped natural content size. Auto-scaling
/// consumers size a surrounding frame from the inner values.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ContentMeasure {
    pub width: f32,
    pub height: f32,
    pub inner_width: f32,
    pub inner_height: f32,
}

impl ContentMeasure {
    /// A zero anywhere usually means content is still loading (fonts,
    /// images) - consumers treat it as "not ready yet"
    pub fn is_degenerate(&self) -> bool {
        self.width <= 0.0
            || self.height <= 0.0
            || self.inner_width <= 0.0
            || self.inner_height <= 0.0
    }
}

struct TextState {
    engine: Rc<dyn TextEngine>,
    source: Option<TextSource>,
    attr: TextAttributes,
    line_spacing: f32,
    wrapping: TextWrapping,
    horizontal_align: HorizontalAlign,
    vertical_align: VerticalAlign,
    dynamic_styles: DynamicTextStyles,
    fx: Option<String>,
    text_scene: Option<Rc<dyn TextScene>>,
    last_width: Option<f32>,
    last_height: Option<f32>,
    last_measure: Option<ContentMeasure>,
    on_size_updated: Observable<ContentMeasure>,
}

/// A control showing auto-reflowing rich text.
///
/// Owns the text content (plain, markup or structured - exactly one at a
/// time) and its typography; every mutation regenerates the vector scene
/// through the debounced pipeline: regenerate -> adapt viewport ->
/// rasterize -> report measured size. Bursts of mutations within one
/// scheduling turn collapse into a single regeneration using the last
/// written values.
pub struct FlowingText {
    vg: Vg,
    state: Rc<RefCell<TextState>>,
    generate_op: Rc<Debounced>,
    adapt_op: Rc<Debounced>,
    notify_op: Rc<Debounced>,
}

impl Clone for FlowingText {
    fn clone(&self) -> Self {
        Self {
            vg: self.vg.clone(),
            state: Rc::clone(&self.state),
            generate_op: Rc::clone(&self.generate_op),
            adapt_op: Rc::clone(&self.adapt_op),
            notify_op: Rc::clone(&self.notify_op),
        }
    }
}

impl FlowingText {
    pub fn new(
        name: impl Into<String>,
        scheduler: &Scheduler,
        engine: Rc<dyn TextEngine>,
    ) -> Self {
        let vg = Vg::new(name, scheduler);
        vg.set_auto_vg(true);

        let state = Rc::new(RefCell::new(TextState {
            engine,
            source: None,
            attr: TextAttributes {
                font_size: Some(30.0),
                color: Some(crate::color::Color::WHITE),
                outline: Some(true),
                outline_color: Some(crate::color::Color::BLACK),
                frame_corner_radius: Some(6.0),
                frame_outline_width: Some(3.0),
                ..Default::default()
            },
            line_spacing: 5.0,
            wrapping: TextWrapping::WordWrap,
            horizontal_align: HorizontalAlign::Left,
            vertical_align: VerticalAlign::Top,
            dynamic_styles: DynamicTextStyles::default(),
            fx: None,
            text_scene: None,
            last_width: None,
            last_height: None,
            last_measure: None,
            on_size_updated: Observable::new(),
        }));

        let notify_op = {
            let state = Rc::downgrade(&state);
            Rc::new(Debounced::new(scheduler, move |()| {
                Self::notify_now(&state)
            }))
        };

        let adapt_op = {
            let state = Rc::downgrade(&state);
            let vg = vg.clone();
            let notify_op = Rc::clone(&notify_op);
            Rc::new(Debounced::new(scheduler, move |()| {
                Self::adapt_now(&state, &vg, &notify_op)
            }))
        };

        let generate_op = {
            let state = Rc::downgrade(&state);
            let vg = vg.clone();
            let adapt_op = Rc::clone(&adapt_op);
            Rc::new(Debounced::new(scheduler, move |()| {
                Self::generate_now(&state, &vg, &adapt_op)
            }))
        };

        Self {
            vg,
            state,
            generate_op,
            adapt_op,
            notify_op,
        }
    }

    // ---- content identity ----

    pub fn text(&self) -> Option<String> {
        match &self.state.borrow().source {
            Some(TextSource::Plain(text)) => Some(text.clone()),
            _ => None,
        }
    }

    pub fn set_text(&self, text: impl Into<String>) {
        self.set_source(TextSource::Plain(text.into()));
    }

    pub fn markup_text(&self) -> Option<String> {
        match &self.state.borrow().source {
            Some(TextSource::Markup(text)) => Some(text.clone()),
            _ => None,
        }
    }

    pub fn set_markup_text(&self, text: impl Into<String>) {
        self.set_source(TextSource::Markup(text.into()));
    }

    pub fn structured_text(&self) -> Option<Vec<TextSpan>> {
        match &self.state.borrow().source {
            Some(TextSource::Structured(spans)) => Some(spans.clone()),
            _ => None,
        }
    }

    pub fn set_structured_text(&self, spans: Vec<TextSpan>) {
        self.set_source(TextSource::Structured(spans));
    }

    pub fn source(&self) -> Option<TextSource> {
        self.state.borrow().source.clone()
    }

    /// Replace the content. Setting one representation clears the other two;
    /// setting the current value again is a no-op.
    pub fn set_source(&self, source: TextSource) {
        {
            let mut state = self.state.borrow_mut();
            if state.source.as_ref() == Some(&source) {
                return;
            }
            state.source = Some(source);
        }
        self.generate_op.trigger();
    }

    // ---- typography ----

    pub fn text_attr(&self) -> TextAttributes {
        self.state.borrow().attr.clone()
    }

    /// Fold an attribute patch over the current attributes
    pub fn set_text_attr(&self, patch: &TextAttributes) {
        self.state.borrow_mut().attr.apply(patch);
        self.generate_op.trigger();
    }

    pub fn line_spacing(&self) -> f32 {
        self.state.borrow().line_spacing
    }

    pub fn set_line_spacing(&self, line_spacing: f32) {
        self.state.borrow_mut().line_spacing = line_spacing;
        self.generate_op.trigger();
    }

    pub fn text_wrapping(&self) -> TextWrapping {
        self.state.borrow().wrapping
    }

    pub fn set_text_wrapping(&self, wrapping: TextWrapping) {
        self.state.borrow_mut().wrapping = wrapping;
        self.generate_op.trigger();
    }

    pub fn text_horizontal_align(&self) -> HorizontalAlign {
        self.state.borrow().horizontal_align
    }

    pub fn set_text_horizontal_align(&self, align: HorizontalAlign) {
        self.state.borrow_mut().horizontal_align = align;
        self.generate_op.trigger();
    }

    pub fn text_vertical_align(&self) -> VerticalAlign {
        self.state.borrow().vertical_align
    }

    pub fn set_text_vertical_align(&self, align: VerticalAlign) {
        self.state.borrow_mut().vertical_align = align;
        self.generate_op.trigger();
    }

    pub fn text_dynamic_styles(&self) -> DynamicTextStyles {
        self.state.borrow().dynamic_styles.clone()
    }

    pub fn set_text_dynamic_styles(&self, styles: DynamicTextStyles) {
        {
            let mut state = self.state.borrow_mut();
            if state.dynamic_styles == styles {
                return;
            }
            state.dynamic_styles = styles;
        }
        self.generate_op.trigger();
    }

    pub fn fx(&self) -> Option<String> {
        self.state.borrow().fx.clone()
    }

    pub fn set_fx(&self, fx: Option<String>) {
        {
            let mut state = self.state.borrow_mut();
            if state.fx == fx {
                return;
            }
            state.fx = fx;
        }
        self.generate_op.trigger();
    }

    // ---- sizing ----

    pub fn auto_scale(&self) -> bool {
        self.vg.auto_scale()
    }

    pub fn set_auto_scale(&self, auto_scale: bool) {
        if self.vg.auto_scale() == auto_scale {
            return;
        }
        self.vg.set_auto_scale(auto_scale);
        if auto_scale {
            self.adapt_op.trigger();
        }
    }

    pub fn set_size_px(&self, width: f32, height: f32) {
        self.vg.base().set_size_px(width, height);
        if self.vg.auto_scale() {
            self.adapt_op.trigger();
        }
    }

    /// The last reported measure, if any (consumers can query this without
    /// waiting for the next size-updated notification)
    pub fn content_measure(&self) -> Option<ContentMeasure> {
        self.state.borrow().last_measure
    }

    pub fn on_size_updated(&self) -> Observable<ContentMeasure> {
        self.state.borrow().on_size_updated.clone()
    }

    /// Completion of the pending regeneration pipeline, if any
    pub fn pending_regeneration(&self) -> Option<Promise<()>> {
        self.generate_op
            .completion()
            .or_else(|| self.adapt_op.completion())
            .or_else(|| self.vg.pending_render())
    }

    pub fn vg(&self) -> &Vg {
        &self.vg
    }

    pub fn on_infotip_open(&self) -> Observable<crate::scene::RegionEvent> {
        self.vg.on_infotip_open()
    }

    pub fn on_infotip_close(&self) -> Observable<crate::scene::RegionEvent> {
        self.vg.on_infotip_close()
    }

    pub fn on_link_activated(&self) -> Observable<crate::scene::RegionEvent> {
        self.vg.on_link_activated()
    }

    // ---- pipeline ----

    fn generate_now(
        state_weak: &Weak<RefCell<TextState>>,
        vg: &Vg,
        adapt_op: &Rc<Debounced>,
    ) -> Promise<()> {
        let Some(state_rc) = state_weak.upgrade() else {
            return Promise::resolved(());
        };
        if vg.base().is_disposed() {
            return Promise::resolved(());
        }

        let base = vg.base();
        let params = {
            let state = state_rc.borrow();
            TextSceneParams {
                area: Viewport::new(0.0, 0.0, base.width_px(), base.height_px()),
                source: state.source.clone(),
                attr: state.attr.clone(),
                clip: false,
                line_spacing: state.line_spacing,
                wrapping: state.wrapping,
                horizontal_align: state.horizontal_align,
                vertical_align: state.vertical_align,
                dynamic_styles: state.dynamic_styles.clone(),
                fx: state.fx.clone(),
            }
        };

        let engine = Rc::clone(&state_rc.borrow().engine);
        let scene = engine.create_text_scene(&params);

        // Content changed, so the interactive regions the old manager
        // indexed are meaningless now
        vg.destroy_region_manager();

        state_rc.borrow_mut().text_scene = Some(Rc::clone(&scene));
        let vector_scene: Rc<dyn VectorScene> = scene;
        vg.adopt_scene(vector_scene);

        // Adapt the viewport first, then rasterize exactly once
        let completion = Promise::pending();
        let done = completion.clone();
        let vg = vg.clone();
        adapt_op.trigger().then(move |result| {
            if let Err(error) = result {
                done.reject(error.clone());
                return;
            }
            vg.request_render().then(move |result| match result {
                Ok(()) => done.resolve(()),
                Err(error) => done.reject(error.clone()),
            });
        });
        completion
    }

    fn adapt_now(
        state_weak: &Weak<RefCell<TextState>>,
        vg: &Vg,
        notify_op: &Rc<Debounced>,
    ) -> Promise<()> {
        let Some(state_rc) = state_weak.upgrade() else {
            return Promise::resolved(());
        };
        let Some(scene) = state_rc.borrow().text_scene.clone() else {
            return Promise::resolved(());
        };

        if vg.auto_scale() {
            let completion = Promise::pending();
            let done = completion.clone();
            let state_weak = state_weak.clone();
            let vg = vg.clone();
            let notify_op = Rc::clone(notify_op);
            let pending_scene = Rc::clone(&scene);
            scene.content_bounding_box().then(move |result| {
                let bbox = match result {
                    Ok(bbox) => *bbox,
                    Err(error) => {
                        done.reject(error.clone());
                        return;
                    }
                };
                // The scene can be gone or replaced by the time the bounding
                // box arrives
                let Some(state_rc) = state_weak.upgrade() else {
                    done.resolve(());
                    return;
                };
                let still_current = state_rc
                    .borrow()
                    .text_scene
                    .as_ref()
                    .map(|current| Rc::ptr_eq(current, &pending_scene))
                    .unwrap_or(false);
                if !still_current || vg.base().is_disposed() {
                    done.resolve(());
                    return;
                }

                let viewport =
                    Self::compute_viewport(&vg, Some(bbox.height));
                Self::apply_viewport(&vg, &notify_op, &pending_scene, viewport);
                done.resolve(());
            });
            completion
        } else {
            let viewport = Self::compute_viewport(vg, None);
            Self::apply_viewport(vg, notify_op, &scene, viewport);
            Promise::resolved(())
        }
    }

    fn compute_viewport(vg: &Vg, natural_height: Option<f32>) -> Viewport {
        let base = vg.base();
        let padding = base.padding();
        let width = (base.width_px() - padding.horizontal()).max(0.0);
        let available_height = base.height_px() - padding.vertical();
        let height = match natural_height {
            Some(natural) => natural.min(available_height).max(0.0),
            None => available_height.max(0.0),
        };
        Viewport::new(0.0, 0.0, width, height)
    }

    fn apply_viewport(
        vg: &Vg,
        notify_op: &Rc<Debounced>,
        scene: &Rc<dyn TextScene>,
        viewport: Viewport,
    ) {
        // Never notify for a viewport that did not actually change
        if scene.viewport().approx_eq(&viewport) {
            return;
        }
        scene.set_viewport(viewport);
        scene.set_text_area(viewport);
        vg.request_render();
        notify_op.trigger();
    }

    fn notify_now(state_weak: &Weak<RefCell<TextState>>) -> Promise<()> {
        let Some(state_rc) = state_weak.upgrade() else {
            return Promise::resolved(());
        };
        let Some(scene) = state_rc.borrow().text_scene.clone() else {
            return Promise::resolved(());
        };

        let viewport = scene.viewport();
        let completion = Promise::pending();
        let done = completion.clone();
        let state_weak = state_weak.clone();
        let height_scene = Rc::clone(&scene);
        scene.content_width().then(move |result| {
            let inner_width = match result {
                Ok(width) => *width,
                Err(error) => {
                    done.reject(error.clone());
                    return;
                }
            };
            let done = done.clone();
            let state_weak = state_weak.clone();
            height_scene.content_height().then(move |result| {
                let inner_height = match result {
                    Ok(height) => *height,
                    Err(error) => {
                        done.reject(error.clone());
                        return;
                    }
                };
                let Some(state_rc) = state_weak.upgrade() else {
                    done.resolve(());
                    return;
                };
                let measure = ContentMeasure {
                    width: viewport.width.ceil(),
                    height: viewport.height.ceil(),
                    inner_width: inner_width.ceil(),
                    inner_height: inner_height.ceil(),
                };
                let observable = {
                    let mut state = state_rc.borrow_mut();
                    state.last_measure = Some(measure);
                    state.on_size_updated.clone()
                };
                observable.notify(&measure);
                done.resolve(());
            });
        });
        completion
    }
}

impl Control for FlowingText {
    fn base(&self) -> &ControlHandle {
        self.vg.base()
    }

    fn type_name(&self) -> &'static str {
        "FlowingText"
    }

    fn pre_measure(&self) {
        // Percentage-based sizing can change the effective pixel size
        // without any setter call; catch it here once per frame
        let base = self.vg.base();
        let (width, height) = (base.width_px(), base.height_px());
        let changed = {
            let mut state = self.state.borrow_mut();
            if state.last_width != Some(width) || state.last_height != Some(height) {
                state.last_width = Some(width);
                state.last_height = Some(height);
                state.text_scene.is_some()
            } else {
                false
            }
        };
        if changed {
            self.adapt_op.trigger();
        }
    }

    fn draw(&self, canvas: &mut dyn Canvas) {
        self.vg.draw(canvas);
    }

    fn dispose(&self) {
        self.vg.dispose();
    }
}
