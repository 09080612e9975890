use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use wgpu::{Device, Instance, Queue};

use super::super::{BackendKind, GpuConfig};
use crate::error::BackendError;

/// Format of the offscreen render target.
pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Headless device and queue.
pub struct GpuContext {
    pub instance: Instance,
    pub device: Arc<Device>,
    pub queue: Arc<Queue>,
    lost: Arc<AtomicBool>,
}

impl GpuContext {
    pub fn new(config: &GpuConfig) -> Result<Self, BackendError> {
        if config.backends.is_empty() {
            return Err(unavailable("no wgpu backends enabled".to_string()));
        }
        let instance = Instance::new(&wgpu::InstanceDescriptor {
            backends: config.backends,
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: config.power_preference,
            compatible_surface: None,
            force_fallback_adapter: config.force_fallback_adapter,
        }))
        .map_err(|e| unavailable(format!("no adapter: {e}")))?;

        log::info!("Using GPU adapter: {:?}", adapter.get_info().name);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Scenery Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
            memory_hints: wgpu::MemoryHints::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| unavailable(format!("device request failed: {e}")))?;

        let lost = Arc::new(AtomicBool::new(false));
        let flag = lost.clone();
        device.set_device_lost_callback(move |reason, message| {
            log::warn!("GPU device lost ({:?}): {}", reason, message);
            flag.store(true, Ordering::Release);
        });

        Ok(Self {
            instance,
            device: Arc::new(device),
            queue: Arc::new(queue),
            lost,
        })
    }

    /// Whether the device-lost callback has fired.
    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }
}

fn unavailable(reason: String) -> BackendError {
    BackendError::Unavailable {
        kind: BackendKind::Gpu,
        reason,
    }
}

/// Offscreen color target the sprite pass renders into.
pub struct RenderTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl RenderTarget {
    /// `None` for a zero-sized surface.
    pub fn new(device: &Device, width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Scenery Render Target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Some(Self {
            texture,
            view,
            width,
            height,
        })
    }
}
