//! A markup-text push button driving per-state styles onto a
//! [`DecoratedContainer`].

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use gauze_gui::{
    Canvas, Control, ControlHandle, Debounced, DecoratedContainer, DynamicTextStyles, FlowingText,
    HorizontalAlign, Observable, Padding, Promise, Scheduler, Stretch, TextAttributes, TextEngine,
    TextSource, TextSpan, TextWrapping, TimerId, VerticalAlign,
};

const DEFAULT_PRESS_DURATION_MS: f64 = 100.0;

/// Interaction state of the button
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ButtonState {
    Disabled,
    #[default]
    Blur,
    Focus,
    Pressed,
}

/// Per-state visual description. Every field is optional; applying a style
/// only touches what it declares.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ButtonStyle {
    // Container decoration (rectangle kind)
    pub background_color: Option<gauze_gui::Color>,
    pub border_color: Option<gauze_gui::Color>,
    pub border_thickness: Option<f32>,
    pub corner_radius: Option<f32>,
    // Container decoration (image kind)
    pub source: Option<String>,
    pub stretch: Option<Stretch>,
    pub slice: Option<Padding>,
    // Content
    pub text: Option<TextSource>,
    pub text_padding: Option<Padding>,
    pub text_attr: Option<TextAttributes>,
    pub text_line_spacing: Option<f32>,
    pub text_wrapping: Option<TextWrapping>,
    pub text_horizontal_align: Option<HorizontalAlign>,
    pub text_vertical_align: Option<VerticalAlign>,
    pub text_dynamic_styles: Option<DynamicTextStyles>,
    pub text_fx: Option<String>,
    // Press feedback
    pub press_duration_ms: Option<f64>,
    /// Blink the pressed/blur styles this many times during the press
    /// animation (2 or more to take effect)
    pub blinks: Option<u32>,
}

struct ButtonInner {
    state: ButtonState,
    next_state: ButtonState,
    blur_style: Option<ButtonStyle>,
    focus_style: Option<ButtonStyle>,
    pressed_style: Option<ButtonStyle>,
    disabled_style: Option<ButtonStyle>,
    switch_timer: Option<TimerId>,
    blink_timer: Option<TimerId>,
    content: Option<FlowingText>,
    on_pressed: Observable<()>,
    on_pressed_and_released: Observable<()>,
}

/// A simple button with (markup) text used to trigger an action.
///
/// A four-state machine (blur/focus/pressed/disabled) applies the matching
/// style to the underlying container. While pressed or disabled, incoming
/// hover transitions are remembered in `next_state` and restored when the
/// press animation ends or the button is re-enabled. `on_pressed` fires
/// immediately on press, `on_pressed_and_released` after the animation.
pub struct ActionButton {
    container: DecoratedContainer,
    inner: Rc<RefCell<ButtonInner>>,
    create_op: Rc<Debounced>,
}

impl Clone for ActionButton {
    fn clone(&self) -> Self {
        Self {
            container: self.container.clone(),
            inner: Rc::clone(&self.inner),
            create_op: Rc::clone(&self.create_op),
        }
    }
}

impl ActionButton {
    pub fn new(
        name: impl Into<String>,
        scheduler: &Scheduler,
        engine: Rc<dyn TextEngine>,
    ) -> Self {
        let container = DecoratedContainer::new(name, scheduler);
        container.set_turn_visible_on_content_size_ready(true);
        container.set_text_padding(Padding::uniform(10.0));

        let inner = Rc::new(RefCell::new(ButtonInner {
            state: ButtonState::Blur,
            next_state: ButtonState::Blur,
            blur_style: None,
            focus_style: None,
            pressed_style: None,
            disabled_style: None,
            switch_timer: None,
            blink_timer: None,
            content: None,
            on_pressed: Observable::new(),
            on_pressed_and_released: Observable::new(),
        }));

        let create_op = {
            let inner = Rc::downgrade(&inner);
            let container = container.clone();
            Rc::new(Debounced::new(scheduler, move |()| {
                Self::create_content_now(&inner, &container, &engine);
                Promise::resolved(())
            }))
        };
        create_op.trigger();

        let button = Self {
            container,
            inner,
            create_op,
        };
        button.register_events(scheduler);
        button
    }

    fn create_content_now(
        inner: &Weak<RefCell<ButtonInner>>,
        container: &DecoratedContainer,
        engine: &Rc<dyn TextEngine>,
    ) {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        if container.base().is_disposed() || inner.borrow().content.is_some() {
            return;
        }
        let content = container.spawn_flowing_text_content(Rc::clone(engine));
        inner.borrow_mut().content = Some(content);
    }

    fn register_events(&self, scheduler: &Scheduler) {
        let base = self.container.base();
        let scheduler = scheduler.clone();

        for observable in [base.on_pointer_enter(), base.on_pointer_move()] {
            let inner = Rc::downgrade(&self.inner);
            let container = self.container.clone();
            observable.add(move |_| {
                if let Some(inner) = inner.upgrade() {
                    Self::focus_impl(&inner, &container);
                }
            });
        }
        {
            let inner = Rc::downgrade(&self.inner);
            let container = self.container.clone();
            base.on_pointer_out().add(move |_| {
                if let Some(inner) = inner.upgrade() {
                    Self::blur_impl(&inner, &container);
                }
            });
        }
        {
            let inner = Rc::downgrade(&self.inner);
            let container = self.container.clone();
            base.on_pointer_click().add(move |_| {
                if let Some(inner) = inner.upgrade() {
                    Self::press_impl(&inner, &container, &scheduler);
                }
            });
        }
    }

    pub fn state(&self) -> ButtonState {
        self.inner.borrow().state
    }

    pub fn container(&self) -> &DecoratedContainer {
        &self.container
    }

    /// The button's flowing-text content, once the deferred creation ran
    pub fn content(&self) -> Option<FlowingText> {
        self.inner.borrow().content.clone()
    }

    pub fn on_pressed(&self) -> Observable<()> {
        self.inner.borrow().on_pressed.clone()
    }

    pub fn on_pressed_and_released(&self) -> Observable<()> {
        self.inner.borrow().on_pressed_and_released.clone()
    }

    // ---- styles ----

    pub fn blur_style(&self) -> Option<ButtonStyle> {
        self.inner.borrow().blur_style.clone()
    }

    pub fn set_blur_style(&self, style: ButtonStyle) {
        self.inner.borrow_mut().blur_style = Some(style);
        if self.inner.borrow().state == ButtonState::Blur {
            Self::apply_current_style(&self.inner, &self.container);
        }
    }

    pub fn focus_style(&self) -> Option<ButtonStyle> {
        self.inner.borrow().focus_style.clone()
    }

    pub fn set_focus_style(&self, style: ButtonStyle) {
        self.inner.borrow_mut().focus_style = Some(style);
        if self.inner.borrow().state == ButtonState::Focus {
            Self::apply_current_style(&self.inner, &self.container);
        }
    }

    pub fn pressed_style(&self) -> Option<ButtonStyle> {
        self.inner.borrow().pressed_style.clone()
    }

    pub fn set_pressed_style(&self, style: ButtonStyle) {
        self.inner.borrow_mut().pressed_style = Some(style);
        if self.inner.borrow().state == ButtonState::Pressed {
            Self::apply_current_style(&self.inner, &self.container);
        }
    }

    pub fn disabled_style(&self) -> Option<ButtonStyle> {
        self.inner.borrow().disabled_style.clone()
    }

    pub fn set_disabled_style(&self, style: ButtonStyle) {
        self.inner.borrow_mut().disabled_style = Some(style);
        if self.inner.borrow().state == ButtonState::Disabled {
            Self::apply_current_style(&self.inner, &self.container);
        }
    }

    // ---- state machine ----

    pub fn focus(&self) {
        Self::focus_impl(&self.inner, &self.container);
    }

    pub fn blur(&self) {
        Self::blur_impl(&self.inner, &self.container);
    }

    pub fn press(&self, scheduler: &Scheduler) {
        Self::press_impl(&self.inner, &self.container, scheduler);
    }

    /// End the pressed state early (normally timer-driven)
    pub fn release(&self) {
        Self::release_impl(&self.inner, &self.container);
    }

    pub fn disable(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.state == ButtonState::Disabled {
            return;
        }
        inner.next_state = inner.state;
        inner.state = ButtonState::Disabled;
        drop(inner);
        Self::reset_timers(&self.inner, &self.container.base().scheduler());
        Self::apply_current_style(&self.inner, &self.container);
    }

    pub fn enable(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.state != ButtonState::Disabled {
                return;
            }
            inner.state = inner.next_state;
        }
        Self::reset_timers(&self.inner, &self.container.base().scheduler());
        Self::apply_current_style(&self.inner, &self.container);
    }

    fn focus_impl(inner_rc: &Rc<RefCell<ButtonInner>>, container: &DecoratedContainer) {
        {
            let mut inner = inner_rc.borrow_mut();
            if matches!(
                inner.state,
                ButtonState::Disabled | ButtonState::Pressed | ButtonState::Focus
            ) {
                inner.next_state = ButtonState::Focus;
                return;
            }
            inner.state = ButtonState::Focus;
        }
        Self::reset_timers(inner_rc, &container.base().scheduler());
        Self::apply_current_style(inner_rc, container);
    }

    fn blur_impl(inner_rc: &Rc<RefCell<ButtonInner>>, container: &DecoratedContainer) {
        {
            let mut inner = inner_rc.borrow_mut();
            if matches!(
                inner.state,
                ButtonState::Disabled | ButtonState::Pressed | ButtonState::Blur
            ) {
                inner.next_state = ButtonState::Blur;
                return;
            }
            inner.state = ButtonState::Blur;
        }
        Self::reset_timers(inner_rc, &container.base().scheduler());
        Self::apply_current_style(inner_rc, container);
    }

    fn press_impl(
        inner_rc: &Rc<RefCell<ButtonInner>>,
        container: &DecoratedContainer,
        scheduler: &Scheduler,
    ) {
        let (duration, blinks, on_pressed) = {
            let mut inner = inner_rc.borrow_mut();
            if matches!(inner.state, ButtonState::Disabled | ButtonState::Pressed) {
                return;
            }
            inner.next_state = inner.state;
            inner.state = ButtonState::Pressed;
            let duration = inner
                .pressed_style
                .as_ref()
                .and_then(|style| style.press_duration_ms)
                .filter(|duration| *duration > 0.0)
                .unwrap_or(DEFAULT_PRESS_DURATION_MS);
            let blinks = inner
                .pressed_style
                .as_ref()
                .and_then(|style| style.blinks)
                .unwrap_or(0);
            (duration, blinks, inner.on_pressed.clone())
        };

        Self::reset_timers(inner_rc, scheduler);
        Self::apply_current_style(inner_rc, container);

        {
            let inner_weak = Rc::downgrade(inner_rc);
            let container = container.clone();
            let timer = scheduler.set_timeout(duration, move || {
                if let Some(inner) = inner_weak.upgrade() {
                    inner.borrow_mut().switch_timer = None;
                    Self::release_impl(&inner, &container);
                }
            });
            inner_rc.borrow_mut().switch_timer = Some(timer);
        }

        if blinks >= 2 {
            let max_switches = (blinks - 1) * 2;
            let blink_duration = duration / (max_switches + 1) as f64;
            Self::schedule_blink(inner_rc, container, scheduler, 0, max_switches, blink_duration);
        }

        on_pressed.notify(&());
    }

    fn schedule_blink(
        inner_rc: &Rc<RefCell<ButtonInner>>,
        container: &DecoratedContainer,
        scheduler: &Scheduler,
        switch_count: u32,
        max_switches: u32,
        blink_duration: f64,
    ) {
        let inner_weak = Rc::downgrade(inner_rc);
        let container = container.clone();
        let scheduler2 = scheduler.clone();
        let timer = scheduler.set_timeout(blink_duration, move || {
            let Some(inner_rc) = inner_weak.upgrade() else {
                return;
            };
            inner_rc.borrow_mut().blink_timer = None;
            if inner_rc.borrow().state != ButtonState::Pressed {
                return;
            }
            let style = {
                let inner = inner_rc.borrow();
                if switch_count % 2 == 1 {
                    inner.pressed_style.clone()
                } else {
                    inner.blur_style.clone()
                }
            };
            if let Some(style) = style {
                Self::apply_style(&inner_rc, &container, &style);
            }
            let next = switch_count + 1;
            if next < max_switches {
                Self::schedule_blink(
                    &inner_rc,
                    &container,
                    &scheduler2,
                    next,
                    max_switches,
                    blink_duration,
                );
            }
        });
        inner_rc.borrow_mut().blink_timer = Some(timer);
    }

    fn release_impl(inner_rc: &Rc<RefCell<ButtonInner>>, container: &DecoratedContainer) {
        let released = {
            let mut inner = inner_rc.borrow_mut();
            if inner.state != ButtonState::Pressed {
                return;
            }
            inner.state = inner.next_state;
            inner.on_pressed_and_released.clone()
        };
        Self::reset_timers(inner_rc, &container.base().scheduler());
        Self::apply_current_style(inner_rc, container);
        released.notify(&());
    }

    fn reset_timers(inner_rc: &Rc<RefCell<ButtonInner>>, scheduler: &Scheduler) {
        let (switch_timer, blink_timer) = {
            let mut inner = inner_rc.borrow_mut();
            (inner.switch_timer.take(), inner.blink_timer.take())
        };
        if let Some(timer) = switch_timer {
            scheduler.clear_timeout(timer);
        }
        if let Some(timer) = blink_timer {
            scheduler.clear_timeout(timer);
        }
    }

    fn apply_current_style(inner_rc: &Rc<RefCell<ButtonInner>>, container: &DecoratedContainer) {
        let style = {
            let inner = inner_rc.borrow();
            match inner.state {
                ButtonState::Blur => inner.blur_style.clone(),
                ButtonState::Focus => inner.focus_style.clone(),
                ButtonState::Pressed => inner.pressed_style.clone(),
                ButtonState::Disabled => inner.disabled_style.clone(),
            }
        };
        if let Some(style) = style {
            Self::apply_style(inner_rc, container, &style);
        }
    }

    fn apply_style(
        _inner_rc: &Rc<RefCell<ButtonInner>>,
        container: &DecoratedContainer,
        style: &ButtonStyle,
    ) {
        if let Some(color) = style.background_color {
            container.set_background_color(color);
        }
        if let Some(color) = style.border_color {
            container.set_border_color(color);
        }
        if let Some(thickness) = style.border_thickness {
            container.set_border_thickness(thickness);
        }
        if let Some(radius) = style.corner_radius {
            container.set_corner_radius(radius);
        }
        if let Some(source) = &style.source {
            container.set_image_source(source.clone());
        }
        if let Some(stretch) = style.stretch {
            container.set_image_stretch(stretch);
        }
        if let Some(slice) = style.slice {
            container.set_image_slice(Some(slice));
        }
        if let Some(text) = &style.text {
            match text {
                TextSource::Plain(value) => container.set_text(value.clone()),
                TextSource::Markup(value) => container.set_markup_text(value.clone()),
                TextSource::Structured(spans) => container.set_structured_text(spans.clone()),
            }
        }
        if let Some(padding) = style.text_padding {
            container.set_text_padding(padding);
        }
        if let Some(attr) = &style.text_attr {
            container.set_text_attr(attr);
        }
        if let Some(line_spacing) = style.text_line_spacing {
            container.set_text_line_spacing(line_spacing);
        }
        if let Some(wrapping) = style.text_wrapping {
            container.set_text_wrapping(wrapping);
        }
        if let Some(align) = style.text_horizontal_align {
            container.set_text_horizontal_align(align);
        }
        if let Some(align) = style.text_vertical_align {
            container.set_text_vertical_align(align);
        }
        if let Some(styles) = &style.text_dynamic_styles {
            container.set_text_dynamic_styles(styles.clone());
        }
        if style.text_fx.is_some() {
            container.set_text_fx(style.text_fx.clone());
        }
    }

    // ---- content shortcuts ----

    pub fn set_text(&self, text: impl Into<String>) {
        self.container.set_text(text);
    }

    pub fn set_markup_text(&self, text: impl Into<String>) {
        self.container.set_markup_text(text);
    }

    pub fn set_structured_text(&self, spans: Vec<TextSpan>) {
        self.container.set_structured_text(spans);
    }

    pub fn set_text_attr(&self, attr: &TextAttributes) {
        self.container.set_text_attr(attr);
    }
}

impl Control for ActionButton {
    fn base(&self) -> &ControlHandle {
        self.container.base()
    }

    fn type_name(&self) -> &'static str {
        "ActionButton"
    }

    fn pre_measure(&self) {
        self.container.pre_measure();
    }

    fn post_measure(&self) {
        self.container.post_measure();
    }

    fn draw(&self, canvas: &mut dyn Canvas) {
        self.container.draw(canvas);
    }

    fn dispose(&self) {
        Self::reset_timers(&self.inner, &self.container.base().scheduler());
        self.container.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauze_gui::testkit::StubTextEngine;
    use gauze_gui::{Color, Point, PointerEvent};

    fn button(scheduler: &Scheduler) -> (ActionButton, StubTextEngine) {
        let engine = StubTextEngine::default();
        let button = ActionButton::new("ok", scheduler, Rc::new(engine.clone()));
        (button, engine)
    }

    fn styled_button(scheduler: &Scheduler) -> ActionButton {
        let (button, _) = button(scheduler);
        button.set_blur_style(ButtonStyle {
            background_color: Some(Color::srgb(20, 20, 20)),
            ..Default::default()
        });
        button.set_focus_style(ButtonStyle {
            background_color: Some(Color::srgb(60, 60, 60)),
            ..Default::default()
        });
        button.set_pressed_style(ButtonStyle {
            background_color: Some(Color::srgb(120, 120, 120)),
            ..Default::default()
        });
        button
    }

    fn pointer() -> PointerEvent {
        PointerEvent::new(Point::new(1.0, 1.0))
    }

    #[test]
    fn test_content_is_created_on_next_turn_with_default_padding() {
        let scheduler = Scheduler::new();
        let (button, engine) = button(&scheduler);
        button.base().set_size_px(150.0, 40.0);
        assert!(!button.container().has_content());

        scheduler.run_until_idle();
        assert!(button.container().has_content());
        assert_eq!(button.container().text_padding(), Padding::uniform(10.0));
        assert_eq!(engine.created_count(), 0);

        button.set_markup_text("Click Me");
        scheduler.run_until_idle();
        assert_eq!(engine.created_count(), 1);
    }

    #[test]
    fn test_hover_and_press_state_machine() {
        let scheduler = Scheduler::new();
        let button = styled_button(&scheduler);
        scheduler.run_until_idle();

        assert_eq!(button.state(), ButtonState::Blur);
        button.base().on_pointer_enter().notify(&pointer());
        assert_eq!(button.state(), ButtonState::Focus);

        button.base().on_pointer_click().notify(&pointer());
        assert_eq!(button.state(), ButtonState::Pressed);

        // Hover-out during the press is remembered, not applied
        button.base().on_pointer_out().notify(&pointer());
        assert_eq!(button.state(), ButtonState::Pressed);

        // The press timer releases into the remembered state
        scheduler.advance(150.0);
        assert_eq!(button.state(), ButtonState::Blur);
    }

    #[test]
    fn test_pressed_fires_immediately_and_released_after_animation() {
        let scheduler = Scheduler::new();
        let button = styled_button(&scheduler);
        scheduler.run_until_idle();

        let pressed = Rc::new(RefCell::new(0));
        let released = Rc::new(RefCell::new(0));
        {
            let pressed = Rc::clone(&pressed);
            button.on_pressed().add(move |_| *pressed.borrow_mut() += 1);
            let released = Rc::clone(&released);
            button
                .on_pressed_and_released()
                .add(move |_| *released.borrow_mut() += 1);
        }

        button.base().on_pointer_click().notify(&pointer());
        assert_eq!(*pressed.borrow(), 1);
        assert_eq!(*released.borrow(), 0);

        scheduler.advance(100.0);
        assert_eq!(*released.borrow(), 1);

        // A click while pressed is swallowed
        button.base().on_pointer_click().notify(&pointer());
        button.base().on_pointer_click().notify(&pointer());
        scheduler.advance(200.0);
        assert_eq!(*pressed.borrow(), 2);
    }

    #[test]
    fn test_disabled_button_ignores_interaction() {
        let scheduler = Scheduler::new();
        let button = styled_button(&scheduler);
        scheduler.run_until_idle();

        button.base().on_pointer_enter().notify(&pointer());
        button.disable();
        assert_eq!(button.state(), ButtonState::Disabled);

        button.base().on_pointer_click().notify(&pointer());
        assert_eq!(button.state(), ButtonState::Disabled);

        // Re-enabling restores the remembered hover state
        button.enable();
        assert_eq!(button.state(), ButtonState::Focus);
    }

    #[test]
    fn test_style_application_touches_only_declared_fields() {
        let scheduler = Scheduler::new();
        let (button, _) = button(&scheduler);
        scheduler.run_until_idle();

        button.set_blur_style(ButtonStyle {
            background_color: Some(Color::srgb(10, 20, 30)),
            corner_radius: Some(8.0),
            ..Default::default()
        });
        scheduler.run_until_idle();

        let style = button.container().rectangle_style();
        assert_eq!(style.background, Color::srgb(10, 20, 30));
        assert_eq!(style.corner_radius, 8.0);
        // Undeclared fields keep their previous values
        assert_eq!(
            style.border_thickness,
            gauze_gui::RectangleDecoration::default().border_thickness
        );
    }

    #[test]
    fn test_blink_animation_alternates_styles() {
        let scheduler = Scheduler::new();
        let button = styled_button(&scheduler);
        scheduler.run_until_idle();

        button.set_pressed_style(ButtonStyle {
            background_color: Some(Color::srgb(120, 120, 120)),
            press_duration_ms: Some(90.0),
            blinks: Some(2),
            ..Default::default()
        });

        button.base().on_pointer_click().notify(&pointer());
        assert_eq!(
            button.container().rectangle_style().background,
            Color::srgb(120, 120, 120)
        );

        // First blink switch turns the blur style back on
        scheduler.advance(30.0);
        assert_eq!(
            button.container().rectangle_style().background,
            Color::srgb(20, 20, 20)
        );

        // Second switch restores the pressed style, then the press ends
        scheduler.advance(30.0);
        assert_eq!(
            button.container().rectangle_style().background,
            Color::srgb(120, 120, 120)
        );
        scheduler.advance(60.0);
        assert_eq!(button.state(), ButtonState::Blur);
    }
}
