//! A 2D scene graph.
//!
//! Views live in a [`scene::Scene`] arena owned by a [`stage::Stage`]. Each
//! frame the stage updates the tree through per-node behaviors and draws it
//! with one of three backends: an immediate bitmap rasterizer, a batched
//! wgpu renderer, or a retained element tree that only rewrites what
//! changed. A [`ticker::Ticker`] supplies a capped, shared frame delta.

pub mod drawable;
pub mod error;
pub mod geometry;
pub mod matrix;
pub mod platform;
pub mod raster_cache;
pub mod render_stats;
pub mod renderer;
pub mod scene;
pub mod shape;
pub mod stage;
pub mod surface;
pub mod ticker;

pub mod prelude {
    pub use crate::drawable::{Drawable, Resource};
    pub use crate::error::{BackendError, DrawError, ResourceError, SceneError};
    pub use crate::geometry::{Color, Rect};
    pub use crate::matrix::Matrix;
    pub use crate::platform::insert_ticker;
    pub use crate::renderer::{
        BackendKind, BackendType, Capabilities, FrameStats, GpuConfig, Painter, Renderer,
        RendererConfig,
    };
    pub use crate::scene::{Behavior, Content, NodeId, NodeKind, Scene, UpdateContext, View};
    pub use crate::shape::{Shape, Stroke};
    pub use crate::stage::{Stage, StageConfig};
    pub use crate::surface::Surface;
    pub use crate::ticker::{ListenerId, StopHandle, Ticker, TickerConfig, TickerState};
}
