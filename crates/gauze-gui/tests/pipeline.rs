//! End-to-end exercises of the rasterization pipeline and its invalidation
//! protocol, with the vector library and host canvas stubbed out.

use std::rc::Rc;

use gauze_gui::testkit::{CanvasOp, RecordingCanvas, Settle, StubScene, StubTextEngine};
use gauze_gui::{
    Control, DecoratedContainer, DynamicRegion, FlowingText, Padding, Point, PointerEvent, Rect,
    RegionAction, Scheduler, Stretch, TextSource, VectorScene, Vg, Viewport,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn flowing_text(scheduler: &Scheduler, engine: &StubTextEngine) -> FlowingText {
    FlowingText::new("text", scheduler, Rc::new(engine.clone()))
}

#[test]
fn burst_of_mutations_rasterizes_once_with_last_value() {
    init_logging();
    let scheduler = Scheduler::new();
    let engine = StubTextEngine::default();
    let text = flowing_text(&scheduler, &engine);
    text.set_size_px(200.0, 100.0);

    text.set_markup_text("a");
    text.set_markup_text("b");
    text.set_markup_text("c");
    scheduler.run_until_idle();

    // One regeneration, carrying the last written value
    assert_eq!(engine.created_count(), 1);
    let scene = engine.last_scene().expect("scene was generated");
    assert_eq!(
        scene.params.source,
        Some(TextSource::Markup("c".to_string()))
    );
    // And exactly one rasterization of it
    assert_eq!(scene.render_count(), 1);
    assert!(text.vg().is_rendered());
}

#[test]
fn setting_same_content_again_is_a_no_op() {
    init_logging();
    let scheduler = Scheduler::new();
    let engine = StubTextEngine::default();
    let text = flowing_text(&scheduler, &engine);
    text.set_size_px(200.0, 100.0);

    text.set_text("hello");
    scheduler.run_until_idle();
    assert_eq!(engine.created_count(), 1);

    text.set_text("hello");
    scheduler.run_until_idle();
    assert_eq!(engine.created_count(), 1);
}

#[test]
fn content_representations_are_mutually_exclusive() {
    init_logging();
    let scheduler = Scheduler::new();
    let engine = StubTextEngine::default();
    let text = flowing_text(&scheduler, &engine);

    text.set_text("x");
    text.set_markup_text("y");
    scheduler.run_until_idle();

    assert_eq!(text.text(), None);
    assert_eq!(text.structured_text(), None);
    assert_eq!(text.markup_text(), Some("y".to_string()));
}

#[test]
fn unchanged_viewport_suppresses_size_notifications() {
    init_logging();
    let scheduler = Scheduler::new();
    let engine = StubTextEngine::default();
    let text = flowing_text(&scheduler, &engine);
    text.set_size_px(200.0, 100.0);
    text.set_auto_scale(true);

    let updates = Rc::new(std::cell::RefCell::new(0));
    {
        let updates = Rc::clone(&updates);
        text.on_size_updated().add(move |_| *updates.borrow_mut() += 1);
    }

    text.set_text("hello");
    scheduler.run_until_idle();
    let after_generation = *updates.borrow();
    assert!(after_generation >= 1);

    // Re-adapting with no size or content change computes the same viewport
    // and must not notify again
    text.set_size_px(200.0, 100.0);
    scheduler.run_until_idle();
    text.set_size_px(200.0, 100.0);
    scheduler.run_until_idle();
    assert_eq!(*updates.borrow(), after_generation);
}

#[test]
fn auto_scale_caps_viewport_to_available_height() {
    init_logging();
    let scheduler = Scheduler::new();
    // Natural content is taller than the control
    let engine = StubTextEngine::new(gauze_gui::NaturalSize::new(150.0, 400.0), Settle::Immediate);
    let text = flowing_text(&scheduler, &engine);
    text.set_size_px(200.0, 100.0);
    text.base().set_padding(Padding::new(10.0, 10.0, 5.0, 5.0));
    text.set_auto_scale(true);

    text.set_text("tall");
    scheduler.run_until_idle();

    let scene = engine.last_scene().expect("scene was generated");
    // Width: control minus horizontal padding; height: capped to available
    assert_eq!(scene.viewport(), Viewport::new(0.0, 0.0, 180.0, 90.0));
    assert_eq!(scene.text_area(), Viewport::new(0.0, 0.0, 180.0, 90.0));

    // Shrink-wrap when the content is shorter than the available box
    engine.set_natural_size(gauze_gui::NaturalSize::new(150.0, 30.0));
    text.set_text("short");
    scheduler.run_until_idle();
    let scene = engine.last_scene().expect("regenerated scene");
    assert_eq!(scene.viewport(), Viewport::new(0.0, 0.0, 180.0, 30.0));
}

#[test]
fn stale_rasterization_is_discarded() {
    init_logging();
    let scheduler = Scheduler::new();
    let vg = Vg::new("vg", &scheduler);

    let scene_a = StubScene::new(Viewport::new(0.0, 0.0, 100.0, 50.0)).with_settle(Settle::Manual);
    let scene_b = StubScene::new(Viewport::new(0.0, 0.0, 30.0, 40.0)).with_settle(Settle::Manual);

    vg.set_scene(Some(Rc::new(scene_a.clone())));
    scheduler.run_until_idle();
    assert_eq!(scene_a.render_count(), 1);
    assert!(!vg.is_rendered());

    // Replace the scene while A's rasterization is in flight
    vg.set_scene(Some(Rc::new(scene_b.clone())));

    // A's late completion must not flip state for the current scene
    scene_a.complete_renders();
    assert!(!vg.is_rendered());

    scheduler.run_until_idle();
    assert_eq!(scene_b.render_count(), 1);
    scene_b.complete_renders();
    scheduler.run_until_idle();
    assert!(vg.is_rendered());
    assert_eq!(vg.bitmap_size(), (30, 40));
}

#[test]
fn disposed_control_ignores_late_completion() {
    init_logging();
    let scheduler = Scheduler::new();
    let vg = Vg::new("vg", &scheduler);
    let scene = StubScene::new(Viewport::new(0.0, 0.0, 10.0, 10.0)).with_settle(Settle::Manual);

    vg.set_scene(Some(Rc::new(scene.clone())));
    scheduler.run_until_idle();
    assert_eq!(scene.render_count(), 1);

    vg.dispose();
    // The in-flight callback is a safe no-op after dispose
    scene.complete_renders();
    scheduler.run_until_idle();
    assert!(!vg.is_rendered());
    assert!(vg.base().is_disposed());
}

#[test]
fn clearing_the_scene_resets_rendering_state_synchronously() {
    init_logging();
    let scheduler = Scheduler::new();
    let vg = Vg::new("vg", &scheduler);
    let scene = StubScene::new(Viewport::new(0.0, 0.0, 10.0, 10.0));

    vg.set_scene(Some(Rc::new(scene)));
    scheduler.run_until_idle();
    assert!(vg.is_rendered());

    vg.set_scene(None);
    assert!(!vg.is_rendered());
    assert!(vg.scene().is_none());
}

#[test]
fn rasterization_failure_propagates_to_awaiting_caller() {
    init_logging();
    let scheduler = Scheduler::new();
    let vg = Vg::new("vg", &scheduler);
    let scene =
        StubScene::new(Viewport::new(0.0, 0.0, 10.0, 10.0)).with_render_error("font fetch");

    vg.set_scene(Some(Rc::new(scene)));
    let completion = vg.pending_render().expect("a render is scheduled");
    scheduler.run_until_idle();

    assert!(completion.is_rejected());
    assert!(!vg.is_rendered());
}

#[test]
fn uniform_stretch_letterboxes_the_blit() {
    init_logging();
    let scheduler = Scheduler::new();
    let vg = Vg::new("vg", &scheduler);
    vg.set_stretch(Stretch::Uniform);
    vg.set_scene(Some(Rc::new(StubScene::new(Viewport::new(
        0.0, 0.0, 100.0, 50.0,
    )))));
    scheduler.run_until_idle();
    assert!(vg.is_rendered());

    vg.base()
        .set_measured(Rect::from_min_size([0.0, 0.0], [200.0, 200.0]));
    let mut canvas = RecordingCanvas::new();
    vg.draw(&mut canvas);

    assert_eq!(
        canvas.ops,
        vec![CanvasOp::DrawSurface {
            dst: Rect::from_min_size([0.0, 50.0], [200.0, 100.0]),
            surface_size: (100, 50),
        }]
    );
}

#[test]
fn draw_is_a_no_op_before_rasterization_completes() {
    init_logging();
    let scheduler = Scheduler::new();
    let vg = Vg::new("vg", &scheduler);
    let scene = StubScene::new(Viewport::new(0.0, 0.0, 10.0, 10.0)).with_settle(Settle::Manual);
    vg.set_scene(Some(Rc::new(scene)));
    scheduler.run_until_idle();

    let mut canvas = RecordingCanvas::new();
    vg.draw(&mut canvas);
    assert!(canvas.ops.is_empty());
}

#[test]
fn auto_scale_matches_control_to_bitmap_size() {
    init_logging();
    let scheduler = Scheduler::new();
    let vg = Vg::new("vg", &scheduler);
    vg.set_auto_scale(true);
    vg.set_scene(Some(Rc::new(StubScene::new(Viewport::new(
        0.0, 0.0, 120.5, 80.0,
    )))));
    scheduler.run_until_idle();

    // Dimensions round up to whole pixels
    assert_eq!(vg.bitmap_size(), (121, 80));
    assert_eq!(vg.base().width_px(), 121.0);
    assert_eq!(vg.base().height_px(), 80.0);
}

#[test]
fn interactive_regions_drive_infotip_observables() {
    init_logging();
    let scheduler = Scheduler::new();
    let vg = Vg::new("vg", &scheduler);
    let scene = StubScene::new(Viewport::new(0.0, 0.0, 100.0, 50.0)).with_regions(vec![
        DynamicRegion {
            id: 7,
            bounds: Rect::from_min_size([0.0, 0.0], [50.0, 50.0]),
            action: RegionAction::Infotip("lore".to_string()),
        },
    ]);
    vg.set_scene(Some(Rc::new(scene.clone())));
    scheduler.run_until_idle();
    assert!(vg.is_rendered());

    vg.base()
        .set_measured(Rect::from_min_size([0.0, 0.0], [100.0, 50.0]));

    let opened = Rc::new(std::cell::RefCell::new(Vec::new()));
    let closed = Rc::new(std::cell::RefCell::new(Vec::new()));
    {
        let opened = Rc::clone(&opened);
        vg.on_infotip_open()
            .add(move |event| opened.borrow_mut().push(event.region_id));
        let closed = Rc::clone(&closed);
        vg.on_infotip_close()
            .add(move |event| closed.borrow_mut().push(event.region_id));
    }

    vg.base()
        .on_pointer_move()
        .notify(&PointerEvent::new(Point::new(10.0, 10.0)));
    assert_eq!(*opened.borrow(), vec![7]);
    assert!(closed.borrow().is_empty());

    // Moving off the region closes the annotation
    vg.base()
        .on_pointer_move()
        .notify(&PointerEvent::new(Point::new(90.0, 40.0)));
    assert_eq!(*closed.borrow(), vec![7]);
    assert_eq!(scene.hover_log(), vec![(7, true), (7, false)]);

    // The scene restyling itself marks the control dirty
    let _ = vg.base().take_dirty();
    scene.fire_needs_redraw();
    assert!(vg.base().take_dirty());
}

#[test]
fn container_auto_scales_to_content_inner_size_plus_padding() {
    init_logging();
    let scheduler = Scheduler::new();
    let engine = StubTextEngine::new(gauze_gui::NaturalSize::new(140.0, 60.0), Settle::Immediate);
    let container = DecoratedContainer::new("frame", &scheduler);
    container.base().set_size_px(300.0, 200.0);
    container.set_auto_scale_to_content(true);
    container.set_ideal_size(1.0, 1.0);
    container.set_text_padding(Padding::new(10.0, 10.0, 5.0, 5.0));

    let ready = container.auto_scale_ready();
    assert!(ready.is_pending());

    container.spawn_flowing_text_content(Rc::new(engine));
    container.set_markup_text("hello");
    scheduler.run_until_idle();

    assert_eq!(container.base().width_px(), 160.0);
    assert_eq!(container.base().height_px(), 70.0);
    assert!(ready.is_resolved());
    assert!(container.is_content_size_ready());
}

#[test]
fn degenerate_content_size_is_retried_not_fatal() {
    init_logging();
    let scheduler = Scheduler::new();
    // Fonts not loaded yet: zero natural size
    let engine = StubTextEngine::new(gauze_gui::NaturalSize::new(0.0, 0.0), Settle::Immediate);
    let container = DecoratedContainer::new("frame", &scheduler);
    container.base().set_size_px(300.0, 200.0);
    container.set_auto_scale_to_content(true);
    container.set_ideal_size(1.0, 1.0);

    let text = container.spawn_flowing_text_content(Rc::new(engine.clone()));
    container.set_markup_text("hello");
    scheduler.run_until_idle();

    // Skipped: size still degenerate
    assert_eq!(container.base().width_px(), 300.0);
    assert!(!container.is_content_size_ready());

    // Assets arrive; the next size report succeeds
    engine.set_natural_size(gauze_gui::NaturalSize::new(80.0, 20.0));
    text.set_markup_text("hello again");
    scheduler.run_until_idle();
    assert_eq!(container.base().width_px(), 80.0);
    assert_eq!(container.base().height_px(), 20.0);
    assert!(container.is_content_size_ready());
}

#[test]
fn container_grows_to_fit_oversized_content_padding() {
    init_logging();
    let scheduler = Scheduler::new();
    let engine = StubTextEngine::default();
    let container = DecoratedContainer::new("frame", &scheduler);
    container.base().set_size_px(100.0, 20.0);

    container.spawn_flowing_text_content(Rc::new(engine));
    container.set_text_padding(Padding::new(0.0, 0.0, 15.0, 15.0));
    scheduler.run_until_idle();

    assert!(container.base().height_px() >= 31.0);
    assert_eq!(container.base().width_px(), 100.0);
}

#[test]
fn decoration_sits_below_content_regardless_of_assignment_order() {
    init_logging();
    let scheduler = Scheduler::new();
    let engine = StubTextEngine::default();

    // Content first, then decoration
    let container = DecoratedContainer::new("frame", &scheduler);
    container.spawn_flowing_text_content(Rc::new(engine.clone()));
    container.set_decoration_kind(gauze_gui::DecorationKind::Rectangle);
    scheduler.run_until_idle();

    let decoration_z = container
        .map_decoration(|decoration| decoration.base().z_index())
        .expect("decoration built");
    let content_z = container
        .map_content(|content| content.base().z_index())
        .expect("content installed");
    assert!(decoration_z < content_z);

    // Decoration first, then content
    let container = DecoratedContainer::new("frame2", &scheduler);
    container.set_decoration_kind(gauze_gui::DecorationKind::Rectangle);
    scheduler.run_until_idle();
    container.spawn_flowing_text_content(Rc::new(engine));
    scheduler.run_until_idle();

    let decoration_z = container
        .map_decoration(|decoration| decoration.base().z_index())
        .expect("decoration built");
    let content_z = container
        .map_content(|content| content.base().z_index())
        .expect("content installed");
    assert!(decoration_z < content_z);
}

#[test]
fn replacing_content_hands_ownership_back_and_unsubscribes() {
    init_logging();
    let scheduler = Scheduler::new();
    let engine = StubTextEngine::default();
    let container = DecoratedContainer::new("frame", &scheduler);
    container.base().set_size_px(200.0, 100.0);

    let first = container.spawn_flowing_text_content(Rc::new(engine.clone()));
    let first_size_observers = first.on_size_updated().observer_count();
    assert!(first_size_observers >= 1);

    let second = FlowingText::new("other", &scheduler, Rc::new(engine));
    let previous = container
        .set_content(Box::new(second.clone()))
        .expect("previous content returned");

    // The detached control is alive, unsubscribed, and ours again
    assert!(previous.base().ptr_eq(first.base()));
    assert!(!first.base().is_disposed());
    assert_eq!(first.on_size_updated().observer_count(), 0);
    assert!(container.map_content(|c| c.base().ptr_eq(second.base())) == Some(true));
}

#[test]
fn content_properties_survive_content_recreation() {
    init_logging();
    let scheduler = Scheduler::new();
    let engine = StubTextEngine::default();
    let container = DecoratedContainer::new("frame", &scheduler);
    container.base().set_size_px(200.0, 100.0);

    // Declared before any content exists: buffered
    container.set_markup_text("persistent");
    container.set_text_line_spacing(8.0);
    assert_eq!(container.markup_text(), Some("persistent".to_string()));

    let text = container.spawn_flowing_text_content(Rc::new(engine.clone()));
    scheduler.run_until_idle();
    assert_eq!(text.markup_text(), Some("persistent".to_string()));
    assert_eq!(text.line_spacing(), 8.0);

    // Recreate content: the stored intent is applied again
    let replacement = container.spawn_flowing_text_content(Rc::new(engine));
    scheduler.run_until_idle();
    assert_eq!(replacement.markup_text(), Some("persistent".to_string()));
    assert_eq!(replacement.line_spacing(), 8.0);
}

#[test]
fn infotip_events_bubble_through_the_container() {
    init_logging();
    let scheduler = Scheduler::new();
    let engine = StubTextEngine::default();
    let container = DecoratedContainer::new("frame", &scheduler);
    container.base().set_size_px(200.0, 100.0);
    let text = container.spawn_flowing_text_content(Rc::new(engine));

    let bubbled = Rc::new(std::cell::RefCell::new(Vec::new()));
    {
        let bubbled = Rc::clone(&bubbled);
        container
            .on_infotip_open()
            .add(move |event| bubbled.borrow_mut().push(event.region_id));
    }

    // The content firing its own infotip observable reaches the container
    text.on_infotip_open().notify(&gauze_gui::RegionEvent {
        region_id: 3,
        action: RegionAction::Infotip("tip".to_string()),
        bounds: Rect::from_min_size([0.0, 0.0], [10.0, 10.0]),
        position: Point::new(5.0, 5.0),
    });
    assert_eq!(*bubbled.borrow(), vec![3]);
}
