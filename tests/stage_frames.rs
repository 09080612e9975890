use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use scenery::drawable::ResourceId;
use scenery::prelude::*;
use scenery::renderer::paint_content;
use scenery::renderer::retained::ElementContent;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn sprite(scene: &mut Scene, view: View) -> NodeId {
    let resource = Resource::from_rgba8(4, 4, vec![200; 64]).unwrap();
    scene
        .create_bitmap(view, Drawable::with_resource(resource, None))
        .unwrap()
}

fn bitmap_stage(width: u32, height: u32) -> Stage {
    Stage::new(
        StageConfig::default()
            .backend(BackendType::Bitmap)
            .size(width, height),
    )
    .unwrap()
}

#[test]
fn test_paint_order_follows_child_index() {
    init_logger();
    let mut stage = bitmap_stage(32, 32);
    let ids: Vec<NodeId> = (0..3)
        .map(|_| sprite(stage.scene_mut(), View::new()))
        .collect();
    for &id in &ids {
        stage.add(id).unwrap();
    }
    let (a, b, c) = (ids[0], ids[1], ids[2]);

    stage.render().unwrap();
    let order = stage.renderer().as_bitmap().unwrap().paint_order();
    assert_eq!(order, vec![a, b, c]);

    let root = stage.root();
    stage.scene_mut().set_child_index(root, a, 2).unwrap();
    stage.render().unwrap();
    let order = stage.renderer().as_bitmap().unwrap().paint_order();
    assert_eq!(order, vec![b, c, a]);
}

#[test]
fn test_scaled_sprite_world_transform() {
    init_logger();
    let mut stage = bitmap_stage(800, 600);
    let id = sprite(
        stage.scene_mut(),
        View::new().position(100.0, 100.0).scale(2.0, 2.0),
    );
    stage.add(id).unwrap();

    let stats = stage.render().unwrap();
    assert_eq!(stats.nodes_drawn, 1);
    let draws = stage.renderer().as_bitmap().unwrap().last_draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].node, id);
    assert!(
        draws[0]
            .world
            .approx_eq(&Matrix::new(2.0, 0.0, 0.0, 2.0, 100.0, 100.0), 1e-6)
    );

    // Scaled 4x4 sprite covers (100,100)..(108,108)
    let frame = stage.surface().frame().unwrap();
    let inside = frame.pixel(104, 104).unwrap();
    let outside = frame.pixel(110, 104).unwrap();
    assert!(inside.alpha() > 0);
    assert_eq!(outside.alpha(), 0);
}

#[test]
fn test_hidden_and_transparent_subtrees_skipped() {
    let mut stage = bitmap_stage(16, 16);
    let scene = stage.scene_mut();
    let hidden = scene.create_container(View::new().visible(false)).unwrap();
    let faded = scene.create_container(View::new().alpha(0.0)).unwrap();
    let a = sprite(scene, View::new());
    let b = sprite(scene, View::new());
    let shown = sprite(scene, View::new());
    scene.add_child(hidden, a).unwrap();
    scene.add_child(faded, b).unwrap();
    for id in [hidden, faded, shown] {
        stage.add(id).unwrap();
    }

    stage.render().unwrap();
    let order = stage.renderer().as_bitmap().unwrap().paint_order();
    assert_eq!(order, vec![shown]);
}

#[test]
fn test_retained_skips_redundant_writes() {
    init_logger();
    let mut stage = Stage::new(StageConfig::default().backend(BackendType::Retained)).unwrap();
    let id = sprite(stage.scene_mut(), View::new().position(5.0, 5.0));
    stage.add(id).unwrap();

    let first = stage.render().unwrap();
    assert_eq!(first.elements_created, 2);

    let second = stage.render().unwrap();
    assert_eq!(second.element_writes, 0);
    assert_eq!(second.elements_created, 0);

    stage.scene_mut().view_mut(id).unwrap().set_x(6.0).unwrap();
    let third = stage.render().unwrap();
    assert_eq!(third.element_writes, 1);

    let element = stage.renderer().as_retained().unwrap().elements().get(id).unwrap();
    assert_eq!(element.style().transform.tx, 6.0);
}

#[test]
fn test_release_recovers_without_scene_loss() {
    init_logger();
    let mut stage = bitmap_stage(16, 16);
    let id = sprite(stage.scene_mut(), View::new());
    stage.add(id).unwrap();
    stage.render().unwrap();

    stage.renderer_mut().release();
    assert!(!stage.renderer().is_ready());
    let stats = stage.render().unwrap();
    assert_eq!(stats.nodes_drawn, 1);
    assert_eq!(stage.backend(), BackendKind::Bitmap);
    assert_eq!(stage.scene().children(stage.root()), &[id]);
}

#[test]
fn test_ticker_drives_stage() {
    init_logger();
    let stage = Rc::new(RefCell::new(bitmap_stage(16, 16)));
    let moved = {
        let mut s = stage.borrow_mut();
        let id = sprite(s.scene_mut(), View::new());
        s.add(id).unwrap();
        s.scene_mut()
            .on_update(id, |ctx, delta| {
                let x = ctx.view().map_or(0.0, |v| v.x());
                let _ = ctx.view_mut().and_then(|mut v| {
                    v.set_x(x + delta.as_millis() as f32)?;
                    Ok(())
                });
            })
            .unwrap();
        id
    };

    let mut ticker = Ticker::new(TickerConfig::default().max_delta(Duration::from_millis(100)));
    let target = stage.clone();
    ticker.add_listener(move |delta| {
        target.borrow_mut().tick(delta).unwrap();
    });

    let t0 = Instant::now();
    ticker.start_at(t0);
    ticker.on_frame(t0 + Duration::from_millis(5000));
    ticker.on_frame(t0 + Duration::from_millis(5016));

    let stage = stage.borrow();
    assert_eq!(stage.scene().view(moved).unwrap().x(), 116.0);
}

struct DeltaRecorder {
    updates: Rc<RefCell<Vec<Duration>>>,
    renders: Rc<RefCell<Vec<Duration>>>,
}

impl Behavior for DeltaRecorder {
    fn update(&mut self, _: &mut UpdateContext<'_>, delta: Duration) {
        self.updates.borrow_mut().push(delta);
    }

    fn render(
        &self,
        view: &View,
        content: &Content,
        painter: &mut dyn Painter,
        delta: Duration,
    ) -> Result<(), DrawError> {
        self.renders.borrow_mut().push(delta);
        paint_content(view, content, painter)
    }
}

#[test]
fn test_render_hook_sees_update_delta() {
    init_logger();
    let mut stage = bitmap_stage(16, 16);
    let id = sprite(stage.scene_mut(), View::new());
    stage.add(id).unwrap();

    let updates = Rc::new(RefCell::new(Vec::new()));
    let renders = Rc::new(RefCell::new(Vec::new()));
    stage
        .scene_mut()
        .set_behavior(
            id,
            DeltaRecorder {
                updates: updates.clone(),
                renders: renders.clone(),
            },
        )
        .unwrap();

    let first = stage.tick(Duration::from_millis(33)).unwrap();
    stage.tick(Duration::from_millis(16)).unwrap();

    assert_eq!(first.nodes_drawn, 1);
    let expected = vec![Duration::from_millis(33), Duration::from_millis(16)];
    assert_eq!(*updates.borrow(), expected);
    assert_eq!(*renders.borrow(), expected);
    assert_eq!(stage.scene().frame_delta(), Duration::from_millis(16));
}

fn raster_resource(stage: &Stage, id: NodeId) -> ResourceId {
    let content = stage.scene().shape(id).unwrap();
    assert!(!content.is_stale());
    content.cache().resource().unwrap().id()
}

#[test]
fn test_changed_shape_rerasterized_for_retained() {
    init_logger();
    let mut stage = Stage::new(
        StageConfig::default()
            .backend(BackendType::Retained)
            .size(32, 32),
    )
    .unwrap();
    let id = stage
        .scene_mut()
        .create_shape(View::new(), Shape::rect(5.0, 5.0).fill(Color::WHITE))
        .unwrap();
    stage.add(id).unwrap();

    stage.render().unwrap();
    let before = raster_resource(&stage, id);
    assert_eq!(stage.raster_cache().rasterized(), 1);

    // Same shape again: nothing to redo
    let idle = stage.render().unwrap();
    assert_eq!(idle.element_writes, 0);
    assert_eq!(stage.raster_cache().rasterized(), 1);

    stage
        .scene_mut()
        .set_shape(id, Shape::rect(8.0, 8.0).fill(Color::rgb(1.0, 0.0, 0.0)))
        .unwrap();
    let changed = stage.render().unwrap();
    let after = raster_resource(&stage, id);

    assert_eq!(stage.raster_cache().rasterized(), 2);
    assert_ne!(before, after);
    assert!(changed.element_writes >= 1);
    assert_eq!(stage.scene().shape(id).unwrap().cache().rect().width, 8.0);

    let element = stage.renderer().as_retained().unwrap().elements().get(id).unwrap();
    assert!(matches!(
        element.style().content.as_slice(),
        [ElementContent::Raster { resource, .. }] if *resource == after
    ));
}
