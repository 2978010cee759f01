//! Hand-of-cards layout panel.

use std::cell::RefCell;
use std::f32::consts::PI;
use std::rc::Rc;

use gauze_gui::{Canvas, Control, ControlHandle, Scheduler};

const ROTATION_INCREMENT: f32 = (5.0 / 180.0) * PI;

struct PanelState {
    children: Vec<Box<dyn Control>>,
    vertical: bool,
    spacing: f32,
}

/// Stacks card-like children along one axis.
///
/// Vertical mode is a plain top-to-bottom stack. Horizontal mode lays the
/// children left-to-right and fans their rotations in 5-degree increments
/// centered on zero - the classic hand-of-cards look. The panel adopts the
/// stacked extent (plus its own padding) on the stacking axis after each
/// measure pass.
pub struct HandPanel {
    base: ControlHandle,
    state: Rc<RefCell<PanelState>>,
}

impl Clone for HandPanel {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            state: Rc::clone(&self.state),
        }
    }
}

impl HandPanel {
    pub fn new(name: impl Into<String>, scheduler: &Scheduler) -> Self {
        Self {
            base: ControlHandle::new(name, scheduler),
            state: Rc::new(RefCell::new(PanelState {
                children: Vec::new(),
                vertical: true,
                spacing: 0.0,
            })),
        }
    }

    pub fn is_vertical(&self) -> bool {
        self.state.borrow().vertical
    }

    pub fn set_is_vertical(&self, vertical: bool) {
        {
            let mut state = self.state.borrow_mut();
            if state.vertical == vertical {
                return;
            }
            state.vertical = vertical;
        }
        self.base.mark_dirty();
    }

    pub fn spacing(&self) -> f32 {
        self.state.borrow().spacing
    }

    pub fn set_spacing(&self, spacing: f32) {
        {
            let mut state = self.state.borrow_mut();
            if state.spacing == spacing {
                return;
            }
            state.spacing = spacing;
        }
        self.base.mark_dirty();
    }

    pub fn add_child(&self, child: Box<dyn Control>) {
        child.base().set_has_parent(true);
        self.state.borrow_mut().children.push(child);
        self.base.mark_dirty();
    }

    pub fn remove_child(&self, index: usize) -> Option<Box<dyn Control>> {
        let mut state = self.state.borrow_mut();
        if index >= state.children.len() {
            return None;
        }
        let child = state.children.remove(index);
        child.base().set_has_parent(false);
        drop(state);
        self.base.mark_dirty();
        Some(child)
    }

    pub fn child_count(&self) -> usize {
        self.state.borrow().children.len()
    }

    fn layout(&self) {
        let state = self.state.borrow();
        let child_count = state.children.len();
        let mut stack_width = 0.0_f32;
        let mut stack_height = 0.0_f32;
        let mut moved = false;
        let mut rotation = -ROTATION_INCREMENT * (child_count.saturating_sub(1) as f32) / 2.0;

        for (index, child) in state.children.iter().enumerate() {
            let base = child.base();
            if !base.is_visible() {
                continue;
            }
            let padding = base.padding();
            let spacing = if index < child_count - 1 {
                state.spacing
            } else {
                0.0
            };

            if state.vertical {
                if base.top_px() != stack_height {
                    base.set_position_px(base.left_px(), stack_height);
                    moved = true;
                }
                stack_height += base.height_px() + padding.vertical() + spacing;
            } else {
                if base.left_px() != stack_width {
                    base.set_position_px(stack_width, base.top_px());
                    moved = true;
                }
                stack_width += base.width_px() + padding.horizontal() + spacing;
                base.set_rotation(rotation);
                rotation += ROTATION_INCREMENT;
            }
        }

        let own_padding = self.base.padding();
        stack_width += own_padding.horizontal();
        stack_height += own_padding.vertical();
        let vertical = state.vertical;
        drop(state);

        if vertical {
            if self.base.height_px() != stack_height {
                self.base.set_height_px(stack_height);
                moved = true;
            }
        } else if self.base.width_px() != stack_width {
            self.base.set_width_px(stack_width);
            moved = true;
        }

        // Children or the panel itself moved: the host must lay out again
        if moved {
            self.base.mark_all_dirty();
        }
    }
}

impl Control for HandPanel {
    fn base(&self) -> &ControlHandle {
        &self.base
    }

    fn type_name(&self) -> &'static str {
        "HandPanel"
    }

    fn pre_measure(&self) {
        let state = self.state.borrow();
        for child in &state.children {
            child.pre_measure();
        }
    }

    fn post_measure(&self) {
        self.layout();
        let state = self.state.borrow();
        for child in &state.children {
            child.post_measure();
        }
    }

    fn draw(&self, canvas: &mut dyn Canvas) {
        let state = self.state.borrow();
        for child in &state.children {
            if child.base().is_visible() {
                child.draw(canvas);
            }
        }
    }

    fn dispose(&self) {
        let children = std::mem::take(&mut self.state.borrow_mut().children);
        for child in children {
            child.dispose();
        }
        self.base.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauze_gui::{Padding, RectangleControl};

    fn card(scheduler: &Scheduler, width: f32, height: f32) -> RectangleControl {
        let card = RectangleControl::new("card", scheduler);
        card.base().set_size_px(width, height);
        card
    }

    #[test]
    fn test_horizontal_fan_positions_and_rotations() {
        let scheduler = Scheduler::new();
        let panel = HandPanel::new("hand", &scheduler);
        panel.set_is_vertical(false);
        panel.set_spacing(5.0);

        let cards: Vec<_> = (0..3).map(|_| card(&scheduler, 50.0, 80.0)).collect();
        for c in &cards {
            panel.add_child(Box::new(c.clone()));
        }

        panel.post_measure();

        assert_eq!(cards[0].base().left_px(), 0.0);
        assert_eq!(cards[1].base().left_px(), 55.0);
        assert_eq!(cards[2].base().left_px(), 110.0);

        // 5-degree increments centered on zero
        assert!((cards[0].base().rotation() + ROTATION_INCREMENT).abs() < 1e-6);
        assert!(cards[1].base().rotation().abs() < 1e-6);
        assert!((cards[2].base().rotation() - ROTATION_INCREMENT).abs() < 1e-6);

        // Panel adopts the stacked width and asks the host for a relayout
        assert_eq!(panel.base().width_px(), 160.0);
        assert!(panel.base().take_relayout_request());

        // A second pass with nothing changed settles
        panel.post_measure();
        assert!(!panel.base().take_relayout_request());
    }

    #[test]
    fn test_vertical_stack_skips_rotation() {
        let scheduler = Scheduler::new();
        let panel = HandPanel::new("stack", &scheduler);
        panel.set_spacing(2.0);
        panel.base().set_padding(Padding::new(0.0, 0.0, 3.0, 3.0));

        let cards: Vec<_> = (0..2).map(|_| card(&scheduler, 50.0, 80.0)).collect();
        for c in &cards {
            panel.add_child(Box::new(c.clone()));
        }

        panel.post_measure();

        assert_eq!(cards[0].base().top_px(), 0.0);
        assert_eq!(cards[1].base().top_px(), 82.0);
        assert_eq!(cards[0].base().rotation(), 0.0);
        // Stack extent plus own vertical padding
        assert_eq!(panel.base().height_px(), 168.0);
    }

    #[test]
    fn test_invisible_children_are_skipped() {
        let scheduler = Scheduler::new();
        let panel = HandPanel::new("hand", &scheduler);
        panel.set_is_vertical(false);

        let visible = card(&scheduler, 50.0, 80.0);
        let hidden = card(&scheduler, 50.0, 80.0);
        hidden.base().set_visible(false);
        let trailing = card(&scheduler, 50.0, 80.0);

        panel.add_child(Box::new(visible.clone()));
        panel.add_child(Box::new(hidden.clone()));
        panel.add_child(Box::new(trailing.clone()));
        panel.post_measure();

        assert_eq!(trailing.base().left_px(), 50.0);
        // Hidden child keeps its position untouched
        assert_eq!(hidden.base().left_px(), 0.0);
    }

    #[test]
    fn test_remove_child_returns_ownership() {
        let scheduler = Scheduler::new();
        let panel = HandPanel::new("hand", &scheduler);
        let c = card(&scheduler, 10.0, 10.0);
        panel.add_child(Box::new(c.clone()));

        let removed = panel.remove_child(0).expect("child present");
        assert!(removed.base().ptr_eq(c.base()));
        assert_eq!(panel.child_count(), 0);
        assert!(panel.remove_child(0).is_none());
    }
}
