//! Renders a few frames of a small scene with the bitmap backend and writes
//! the last one to `headless.png`.
//!
//! ```bash
//! RUST_LOG=debug cargo run --example headless
//! ```

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use calloop::EventLoop;
use scenery::prelude::*;

const FRAMES: u32 = 30;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = StageConfig::default()
        .backend(BackendType::Bitmap)
        .size(320, 240)
        .renderer(RendererConfig::default().background(Color::from_hex(0x1a1a26)));
    let stage = Rc::new(RefCell::new(Stage::new(config)?));

    {
        let mut stage = stage.borrow_mut();
        let scene = stage.scene_mut();

        let group = scene.create_container(View::new().position(160.0, 120.0).named("spinner"))?;
        for i in 0..4 {
            let color = [
                Color::rgb(0.9, 0.3, 0.3),
                Color::rgb(0.3, 0.9, 0.4),
                Color::rgb(0.3, 0.5, 0.9),
                Color::rgb(0.9, 0.8, 0.2),
            ][i];
            let angle = i as f32 * 90.0;
            let (sin, cos) = angle.to_radians().sin_cos();
            let petal = scene.create_shape(
                View::new()
                    .position(cos * 50.0, sin * 50.0)
                    .pivot(15.0, 15.0)
                    .alpha(0.85),
                Shape::ellipse(30.0, 30.0)
                    .fill(color)
                    .stroke(Color::WHITE, 2.0),
            )?;
            scene.add_child(group, petal)?;
        }
        scene.on_update(group, |ctx, delta| {
            let rotation = ctx.view().map_or(0.0, |v| v.rotation_degrees());
            let step = 90.0 * delta.as_secs_f32();
            if let Ok(mut view) = ctx.view_mut() {
                let _ = view.set_rotation(rotation + step);
            }
        })?;

        let checker: Vec<u8> = (0..16 * 16)
            .flat_map(|i| {
                let on = ((i % 16) / 4 + (i / 16) / 4) % 2 == 0;
                if on { [255, 255, 255, 255] } else { [40, 40, 40, 255] }
            })
            .collect();
        let tile = Resource::from_rgba8(16, 16, checker)?;
        let badge = scene.create_bitmap(
            View::new().position(8.0, 8.0).scale(2.0, 2.0),
            Drawable::with_resource(tile, None),
        )?;

        stage.add(group)?;
        stage.add(badge)?;
    }

    let mut event_loop: EventLoop<'_, ()> = EventLoop::try_new()?;
    let ticker = Rc::new(RefCell::new(Ticker::new(TickerConfig::default().fps(60))));
    {
        let mut t = ticker.borrow_mut();
        let stop = t.stop_handle();
        let target = stage.clone();
        let mut frames = 0;
        t.add_listener(move |delta| {
            match target.borrow_mut().tick(delta) {
                Ok(stats) => log::debug!("frame {}: {:?}", frames, stats),
                Err(err) => log::error!("frame {} failed: {}", frames, err),
            }
            frames += 1;
            if frames == FRAMES {
                stop.stop();
            }
        });
        t.start();
    }

    insert_ticker(&event_loop.handle(), ticker.clone())?;
    while ticker.borrow().is_running() {
        event_loop.dispatch(Some(Duration::from_millis(100)), &mut ())?;
    }

    let stage = stage.borrow();
    log::info!(
        "rendered {} frames at {:.1} fps, last frame {:?}",
        ticker.borrow().frames(),
        ticker.borrow().measured_fps(),
        stage.last_stats()
    );
    match stage.surface().to_image() {
        Some(image) => {
            image.save("headless.png")?;
            log::info!("wrote headless.png");
        }
        None => log::warn!("no frame to save"),
    }
    Ok(())
}
