//! Recovery paths that need to inspect what the stage logs. Kept apart from
//! the other stage tests since a process has a single global logger.

use std::sync::Mutex;

use log::{Level, LevelFilter, Log, Metadata, Record};
use scenery::prelude::*;
use scenery::renderer::AnyRenderer;

static RECORDS: Mutex<Vec<(Level, String)>> = Mutex::new(Vec::new());

struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Warn
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            RECORDS
                .lock()
                .unwrap()
                .push((record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;

fn init_capture() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Warn);
    }
}

fn warnings() -> Vec<String> {
    RECORDS
        .lock()
        .unwrap()
        .iter()
        .filter(|(level, _)| *level == Level::Warn)
        .map(|(_, message)| message.clone())
        .collect()
}

#[test]
fn test_failed_reinit_falls_back_to_next_backend() {
    init_capture();
    // No wgpu backends: the GPU context can never be created again
    let config = StageConfig::default()
        .backend(BackendType::Bitmap)
        .size(16, 16)
        .renderer(
            RendererConfig::default().gpu(GpuConfig::default().backends(wgpu::Backends::empty())),
        );
    let mut stage = Stage::new(config).unwrap();

    let resource = Resource::from_rgba8(4, 4, vec![200; 64]).unwrap();
    let sprite = stage
        .scene_mut()
        .create_bitmap(View::new(), Drawable::with_resource(resource, None))
        .unwrap();
    stage.add(sprite).unwrap();
    let shape = stage
        .scene_mut()
        .create_shape(View::new(), Shape::rect(3.0, 3.0).fill(Color::WHITE))
        .unwrap();
    stage.add(shape).unwrap();

    // Stand in for a GPU renderer whose device went away
    *stage.renderer_mut() = AnyRenderer::new(BackendKind::Gpu);
    assert_eq!(stage.backend(), BackendKind::Gpu);

    let stats = stage.render().unwrap();
    assert_eq!(stage.backend(), BackendKind::Bitmap);
    assert_eq!(stats.nodes_drawn, 2);
    assert!(!stage.scene().shape(shape).unwrap().is_stale());

    let frame = stage.surface().frame().unwrap();
    assert!(frame.pixel(3, 3).unwrap().alpha() > 0);
    assert_eq!(frame.pixel(10, 10).unwrap().alpha(), 0);

    let logged = warnings();
    assert!(logged.iter().any(|m| m.contains("context lost")));
    assert!(logged.iter().any(|m| m.contains("could not be restored")));

    // The fallback keeps drawing on later frames
    let next = stage.render().unwrap();
    assert_eq!(next.nodes_drawn, 2);
    assert_eq!(stage.backend(), BackendKind::Bitmap);
}
