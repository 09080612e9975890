//! wgpu backend.
//!
//! Renders headless into an offscreen target sized to the surface. Every
//! drawable becomes a textured quad; shapes are drawn from the stage's
//! raster cache. Textures are cached per resource and re-uploaded when the
//! drawable is dirty.

pub mod batch;
pub mod buffer;
pub mod context;
pub mod pipeline;

use std::collections::HashMap;

use self::batch::{SpriteQuad, SpriteVertex, build_batches};
use self::buffer::GrowableBuffer;
use self::context::{GpuContext, RenderTarget, TARGET_FORMAT};
use self::pipeline::SpritePipeline;
use super::{
    BackendKind, Capabilities, FrameStats, GpuConfig, Painter, Renderer, RendererConfig,
    collect_items, draw_node, report_draw_error,
};
use crate::drawable::{Drawable, Resource, ResourceId};
use crate::error::{BackendError, DrawError};
use crate::geometry::Color;
use crate::matrix::Matrix;
use crate::scene::{NodeId, Scene, ShapeContent};
use crate::surface::Surface;

/// Textures kept before least recently used ones are evicted.
const MAX_CACHED_TEXTURES: usize = 256;

struct CachedTexture {
    // Kept alive for the bind group
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    last_used_frame: u64,
}

struct GpuState {
    context: GpuContext,
    pipeline: SpritePipeline,
    target: Option<RenderTarget>,
    vertices: GrowableBuffer<SpriteVertex>,
    indices: GrowableBuffer<u32>,
}

pub struct GpuRenderer {
    state: Option<GpuState>,
    gpu: GpuConfig,
    background: Color,
    textures: HashMap<ResourceId, CachedTexture>,
    current_frame: u64,
}

impl GpuRenderer {
    pub fn new() -> Self {
        Self {
            state: None,
            gpu: GpuConfig::default(),
            background: Color::TRANSPARENT,
            textures: HashMap::new(),
            current_frame: 0,
        }
    }

    /// The offscreen texture of the last frame.
    pub fn target_texture(&self) -> Option<&wgpu::Texture> {
        self.state
            .as_ref()
            .and_then(|s| s.target.as_ref())
            .map(|t| &t.texture)
    }

    /// Vertex and index buffer capacities, in elements.
    pub fn buffer_capacity(&self) -> Option<(usize, usize)> {
        self.state
            .as_ref()
            .map(|s| (s.vertices.capacity(), s.indices.capacity()))
    }

    pub fn cached_textures(&self) -> usize {
        self.textures.len()
    }

    /// Evict the least recently used entries until under half the limit.
    fn evict_oldest(&mut self) {
        let target_size = MAX_CACHED_TEXTURES / 2;
        while self.textures.len() > target_size {
            let oldest = self
                .textures
                .iter()
                .min_by_key(|(_, v)| v.last_used_frame)
                .map(|(k, _)| *k);
            match oldest {
                Some(key) => {
                    self.textures.remove(&key);
                }
                None => break,
            }
        }
    }
}

impl Default for GpuRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn upload_texture(
    context: &GpuContext,
    pipeline: &SpritePipeline,
    resource: &Resource,
    frame: u64,
) -> CachedTexture {
    let (width, height) = (resource.width(), resource.height());
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = context.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Sprite Texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    // Pixmap data is already premultiplied RGBA
    context.queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        resource.pixmap().data(),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = context.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Sprite Bind Group"),
        layout: &pipeline.bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&pipeline.sampler),
            },
        ],
    });

    CachedTexture {
        _texture: texture,
        bind_group,
        last_used_frame: frame,
    }
}

struct GpuPainter<'a> {
    context: &'a GpuContext,
    pipeline: &'a SpritePipeline,
    textures: &'a mut HashMap<ResourceId, CachedTexture>,
    quads: &'a mut Vec<SpriteQuad>,
    world: Matrix,
    alpha: f32,
    frame: u64,
    uploads: u32,
    ops: u32,
}

impl GpuPainter<'_> {
    fn push_quad(&mut self, drawable: &Drawable, width: f32, height: f32) -> Result<(), DrawError> {
        let Some(resource) = drawable.resource() else {
            return Ok(());
        };
        let src = drawable.rect();
        if src.is_empty() || width <= 0.0 || height <= 0.0 {
            return Ok(());
        }
        if !drawable.rect_in_bounds() {
            return Err(DrawError::SourceOutOfBounds);
        }
        let max = self.context.max_texture_dimension();
        if resource.width() > max || resource.height() > max {
            return Err(DrawError::ResourceTooLarge {
                width: resource.width(),
                height: resource.height(),
                max,
            });
        }

        let dirty = drawable.take_dirty();
        let cached = self.textures.contains_key(&resource.id());
        if dirty || !cached {
            let texture = upload_texture(self.context, self.pipeline, resource, self.frame);
            self.textures.insert(resource.id(), texture);
            self.uploads += 1;
        }
        if let Some(entry) = self.textures.get_mut(&resource.id()) {
            entry.last_used_frame = self.frame;
        }

        let (ox, oy) = drawable.offset();
        let corners = [
            self.world.transform_point(ox, oy),
            self.world.transform_point(ox + width, oy),
            self.world.transform_point(ox, oy + height),
            self.world.transform_point(ox + width, oy + height),
        ];
        let (rw, rh) = (resource.width() as f32, resource.height() as f32);
        self.quads.push(SpriteQuad {
            resource: resource.id(),
            corners,
            uv: [src.x / rw, src.y / rh, src.right() / rw, src.bottom() / rh],
            alpha: self.alpha,
        });
        self.ops += 1;
        Ok(())
    }
}

impl Painter for GpuPainter<'_> {
    fn kind(&self) -> BackendKind {
        BackendKind::Gpu
    }

    fn draw_drawable(
        &mut self,
        drawable: &Drawable,
        width: f32,
        height: f32,
    ) -> Result<(), DrawError> {
        self.push_quad(drawable, width, height)
    }

    fn draw_shape(&mut self, shape: &ShapeContent) -> Result<(), DrawError> {
        let cache = shape.cache();
        let rect = cache.rect();
        self.push_quad(cache, rect.width, rect.height)
    }
}

impl Renderer for GpuRenderer {
    fn kind(&self) -> BackendKind {
        BackendKind::Gpu
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::IMMEDIATE | Capabilities::BATCHING
    }

    fn init(&mut self, surface: &Surface, config: &RendererConfig) -> Result<(), BackendError> {
        self.release();
        self.gpu = config.gpu;
        self.background = config.background;

        let context = GpuContext::new(&self.gpu)?;
        let pipeline = SpritePipeline::new(&context.device, TARGET_FORMAT);
        let target = RenderTarget::new(&context.device, surface.width(), surface.height());
        let vertices = GrowableBuffer::new(
            &context.device,
            "Sprite Vertex Buffer",
            wgpu::BufferUsages::VERTEX,
        );
        let indices = GrowableBuffer::new(
            &context.device,
            "Sprite Index Buffer",
            wgpu::BufferUsages::INDEX,
        );
        self.state = Some(GpuState {
            context,
            pipeline,
            target,
            vertices,
            indices,
        });
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.state.as_ref().is_some_and(|s| !s.context.is_lost())
    }

    fn resize(&mut self, width: u32, height: u32) {
        if let Some(state) = &mut self.state {
            state.target = RenderTarget::new(&state.context.device, width, height);
            log::debug!("GPU render target resized to {}x{}", width, height);
        }
    }

    fn render(
        &mut self,
        scene: &Scene,
        root: NodeId,
        surface: &mut Surface,
    ) -> Result<FrameStats, BackendError> {
        if !self.is_ready() {
            // Textures belong to the lost device
            self.state = None;
            self.textures.clear();
            return Err(BackendError::ContextLost(BackendKind::Gpu));
        }
        let Some(state) = self.state.as_mut() else {
            return Err(BackendError::ContextLost(BackendKind::Gpu));
        };

        self.current_frame += 1;
        let mut stats = FrameStats::default();
        let Some(target) = &state.target else {
            return Ok(stats);
        };

        let mut quads = Vec::new();
        for item in collect_items(scene, root, &mut stats) {
            let mut painter = GpuPainter {
                context: &state.context,
                pipeline: &state.pipeline,
                textures: &mut self.textures,
                quads: &mut quads,
                world: item.world,
                alpha: item.alpha,
                frame: self.current_frame,
                uploads: 0,
                ops: 0,
            };
            let result = draw_node(scene, item.node, &mut painter);
            let (uploads, ops) = (painter.uploads, painter.ops);

            stats.texture_uploads += uploads;
            if let Err(err) = result {
                report_draw_error(item.node, BackendKind::Gpu, &err, &mut stats);
            }
            if ops > 0 {
                stats.nodes_drawn += 1;
            }
        }

        let list = build_batches(&quads, surface.width() as f32, surface.height() as f32);
        let device = &state.context.device;
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Scenery Render Encoder"),
        });

        let has_quads = !list.vertices.is_empty();
        if has_quads {
            let queue = &state.context.queue;
            state.vertices.write(device, queue, &list.vertices);
            state.indices.write(device, queue, &list.indices);
        }

        {
            let clear = self.background;
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scenery Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: (clear.r * clear.a) as f64,
                            g: (clear.g * clear.a) as f64,
                            b: (clear.b * clear.a) as f64,
                            a: clear.a as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if has_quads {
                render_pass.set_pipeline(&state.pipeline.pipeline);
                render_pass.set_vertex_buffer(0, state.vertices.buffer().slice(..));
                render_pass.set_index_buffer(
                    state.indices.buffer().slice(..),
                    wgpu::IndexFormat::Uint32,
                );

                for batch in &list.batches {
                    let Some(texture) = self.textures.get(&batch.resource) else {
                        continue;
                    };
                    render_pass.set_bind_group(0, &texture.bind_group, &[]);
                    render_pass.draw_indexed(batch.indices.clone(), 0, 0..1);
                    stats.draw_calls += 1;
                }
            }
        }

        state.context.queue.submit(std::iter::once(encoder.finish()));
        stats.batches = list.batches.len() as u32;

        if self.textures.len() > MAX_CACHED_TEXTURES {
            self.evict_oldest();
        }

        log::trace!("gpu frame: {:?}", stats);
        Ok(stats)
    }

    fn release(&mut self) {
        self.textures.clear();
        self.state = None;
    }
}
