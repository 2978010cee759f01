//! Dialog widget: a decorated text frame that orchestrates infotip tooltips.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use gauze_gui::{
    Canvas, Control, ControlHandle, DecorationKind, DecoratedContainer, FlowingText, Observable,
    Padding, Point, RegionAction, RegionEvent, Scheduler, TextAttributes, TextEngine, TextSpan,
};

use crate::deoverlap::{deoverlap, force_on_screen, OverlapItem};

const TOOLTIP_OFFSET: Point = Point::new(12.0, 16.0);
const TOOLTIP_PADDING: f32 = 8.0;
/// Initial frame size while the text measures itself; auto-scale snaps the
/// frame to the content afterwards
const TOOLTIP_PROBE_SIZE: (f32, f32) = (320.0, 240.0);
const MAX_DEOVERLAP_PASSES: u32 = 16;

struct TooltipEntry {
    frame: DecoratedContainer,
}

struct DialogInner {
    engine: Rc<dyn TextEngine>,
    tooltips: HashMap<u64, TooltipEntry>,
    overlay_size: (f32, f32),
    on_tooltip_open: Observable<u64>,
    on_tooltip_close: Observable<u64>,
}

/// A decorated text dialog with on-demand infotip tooltips.
///
/// The dialog's own flowing text may contain infotip regions; when the
/// pointer enters one, the bubbled open event builds a small auto-scaling
/// tooltip frame near the pointer. Once the tooltip has measured itself it
/// is forced on-screen and de-overlapped against the other live tooltips.
/// Leaving the region disposes the tooltip. All tooltip state lives in a map
/// owned by the dialog and is torn down with it.
pub struct Dialog {
    container: DecoratedContainer,
    content: FlowingText,
    inner: Rc<RefCell<DialogInner>>,
}

impl Clone for Dialog {
    fn clone(&self) -> Self {
        Self {
            container: self.container.clone(),
            content: self.content.clone(),
            inner: Rc::clone(&self.inner),
        }
    }
}

impl Dialog {
    pub fn new(
        name: impl Into<String>,
        scheduler: &Scheduler,
        engine: Rc<dyn TextEngine>,
    ) -> Self {
        let container = DecoratedContainer::new(name, scheduler);
        let content = container.spawn_flowing_text_content(Rc::clone(&engine));

        let inner = Rc::new(RefCell::new(DialogInner {
            engine,
            tooltips: HashMap::new(),
            overlay_size: (1920.0, 1080.0),
            on_tooltip_open: Observable::new(),
            on_tooltip_close: Observable::new(),
        }));

        {
            let inner_weak = Rc::downgrade(&inner);
            let base = container.base().clone();
            container.on_infotip_open().add(move |event| {
                Self::open_tooltip(&inner_weak, &base, event);
            });
        }
        {
            let inner_weak = Rc::downgrade(&inner);
            container.on_infotip_close().add(move |event| {
                Self::close_tooltip(&inner_weak, event.region_id);
            });
        }

        Self {
            container,
            content,
            inner,
        }
    }

    pub fn container(&self) -> &DecoratedContainer {
        &self.container
    }

    pub fn content(&self) -> &FlowingText {
        &self.content
    }

    /// Pixel size of the host overlay, used to keep tooltips on-screen
    pub fn set_overlay_size(&self, width: f32, height: f32) {
        self.inner.borrow_mut().overlay_size = (width, height);
    }

    pub fn tooltip_count(&self) -> usize {
        self.inner.borrow().tooltips.len()
    }

    /// Positions of the live tooltip frames (left, top), keyed by region
    pub fn tooltip_positions(&self) -> HashMap<u64, (f32, f32)> {
        self.inner
            .borrow()
            .tooltips
            .iter()
            .map(|(id, entry)| {
                let base = entry.frame.base();
                (*id, (base.left_px(), base.top_px()))
            })
            .collect()
    }

    /// Fires with the region id once a tooltip frame is placed
    pub fn on_tooltip_open(&self) -> Observable<u64> {
        self.inner.borrow().on_tooltip_open.clone()
    }

    pub fn on_tooltip_close(&self) -> Observable<u64> {
        self.inner.borrow().on_tooltip_close.clone()
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

    pub fn set_text_padding(&self, padding: Padding) {
        self.container.set_text_padding(padding);
    }

    // ---- tooltip orchestration ----

    fn open_tooltip(
        inner_weak: &Weak<RefCell<DialogInner>>,
        dialog_base: &ControlHandle,
        event: &RegionEvent,
    ) {
        let Some(inner_rc) = inner_weak.upgrade() else {
            return;
        };
        if dialog_base.is_disposed() {
            return;
        }
        let markup = match &event.action {
            RegionAction::Infotip(markup) => markup.clone(),
            RegionAction::Link(_) => return,
        };
        if inner_rc.borrow().tooltips.contains_key(&event.region_id) {
            return;
        }

        let scheduler = dialog_base.scheduler();
        let engine = Rc::clone(&inner_rc.borrow().engine);
        let frame = DecoratedContainer::new(
            format!("{}:tooltip:{}", dialog_base.name(), event.region_id),
            &scheduler,
        );
        frame.set_auto_scale_to_content(true);
        frame.set_ideal_size(1.0, 1.0);
        frame.set_turn_visible_on_content_size_ready(true);
        frame.set_decoration_kind(DecorationKind::Rectangle);
        frame.set_text_padding(Padding::uniform(TOOLTIP_PADDING));
        frame
            .base()
            .set_size_px(TOOLTIP_PROBE_SIZE.0, TOOLTIP_PROBE_SIZE.1);
        frame.base().set_position_px(
            event.position.x + TOOLTIP_OFFSET.x,
            event.position.y + TOOLTIP_OFFSET.y,
        );
        frame.spawn_flowing_text_content(engine);
        frame.set_markup_text(markup);

        let ready = frame.auto_scale_ready();
        inner_rc.borrow_mut().tooltips.insert(
            event.region_id,
            TooltipEntry {
                frame: frame.clone(),
            },
        );

        let inner_weak = inner_weak.clone();
        let region_id = event.region_id;
        ready.then(move |result| {
            if result.is_err() {
                return;
            }
            let Some(inner_rc) = inner_weak.upgrade() else {
                return;
            };
            // The tooltip may already be gone by the time it measured
            if !inner_rc.borrow().tooltips.contains_key(&region_id) {
                return;
            }
            Self::reposition_tooltips(&inner_rc);
            let opened = inner_rc.borrow().on_tooltip_open.clone();
            opened.notify(&region_id);
        });
    }

    fn close_tooltip(inner_weak: &Weak<RefCell<DialogInner>>, region_id: u64) {
        let Some(inner_rc) = inner_weak.upgrade() else {
            return;
        };
        let entry = inner_rc.borrow_mut().tooltips.remove(&region_id);
        let Some(entry) = entry else {
            return;
        };
        entry.frame.dispose();
        let closed = inner_rc.borrow().on_tooltip_close.clone();
        closed.notify(&region_id);
    }

    /// Force every live tooltip on-screen and push overlapping ones apart
    fn reposition_tooltips(inner_rc: &Rc<RefCell<DialogInner>>) {
        let (frames, overlay) = {
            let inner = inner_rc.borrow();
            let frames: Vec<DecoratedContainer> = inner
                .tooltips
                .values()
                .map(|entry| entry.frame.clone())
                .collect();
            (frames, inner.overlay_size)
        };

        let mut items: Vec<OverlapItem> = frames
            .iter()
            .map(|frame| OverlapItem::from_control(frame.base()))
            .collect();

        for item in &mut items {
            force_on_screen(item, overlay.0, overlay.1);
        }
        for _ in 0..MAX_DEOVERLAP_PASSES {
            if !deoverlap(&mut items, overlay.0, overlay.1, 10.0, 1.0) {
                break;
            }
        }

        for (frame, item) in frames.iter().zip(&items) {
            item.apply_to(frame.base());
        }
    }
}

impl Control for Dialog {
    fn base(&self) -> &ControlHandle {
        self.container.base()
    }

    fn type_name(&self) -> &'static str {
        "Dialog"
    }

    fn pre_measure(&self) {
        self.container.pre_measure();
        let frames: Vec<DecoratedContainer> = self
            .inner
            .borrow()
            .tooltips
            .values()
            .map(|entry| entry.frame.clone())
            .collect();
        for frame in frames {
            frame.pre_measure();
        }
    }

    fn post_measure(&self) {
        self.container.post_measure();
    }

    fn draw(&self, canvas: &mut dyn Canvas) {
        self.container.draw(canvas);
        let frames: Vec<DecoratedContainer> = self
            .inner
            .borrow()
            .tooltips
            .values()
            .map(|entry| entry.frame.clone())
            .collect();
        for frame in frames {
            if frame.base().is_visible() {
                frame.draw(canvas);
            }
        }
    }

    fn dispose(&self) {
        let tooltips = std::mem::take(&mut self.inner.borrow_mut().tooltips);
        for (_, entry) in tooltips {
            entry.frame.dispose();
        }
        self.container.dispose();
    }
}
