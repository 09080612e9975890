use thiserror::Error;

use crate::renderer::BackendKind;
use crate::scene::NodeId;

/// Errors raised by scene graph operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SceneError {
    /// Inserting `child` under `parent` would create a cycle, or `parent`
    /// cannot hold children at all.
    #[error("invalid hierarchy: cannot add {child:?} to {parent:?} ({reason})")]
    InvalidHierarchy {
        parent: NodeId,
        child: NodeId,
        reason: &'static str,
    },

    /// The id refers to a node that was disposed (or never existed).
    #[error("node {0:?} is not part of this scene")]
    StaleNode(NodeId),

    /// The node is not a direct child of the given container.
    #[error("{child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },

    /// A child index was outside the container's sequence.
    #[error("child index {index} out of range for {len} children")]
    IndexOutOfRange { index: usize, len: usize },

    /// A NaN or infinite value was passed to a property setter.
    #[error("non-finite value {value} for `{field}`")]
    NonFinite { field: &'static str, value: f32 },

    /// Stage roots live as long as their stage.
    #[error("node {0:?} is a stage root and cannot be disposed")]
    StageRoot(NodeId),

    /// The matrix has no inverse.
    #[error("degenerate matrix (determinant {determinant})")]
    DegenerateMatrix { determinant: f32 },
}

/// Errors raised by rendering backends.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    /// The backend cannot run on this host.
    #[error("{kind} backend unavailable: {reason}")]
    Unavailable { kind: BackendKind, reason: String },

    /// The backend context is gone and `init` must run again.
    #[error("{0} backend context lost")]
    ContextLost(BackendKind),

    /// Every backend in the fallback chain failed.
    #[error("no rendering backend could be initialized")]
    NoBackend,
}

/// Failure to draw a single node. The frame continues without it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DrawError {
    #[error("resource {width}x{height} exceeds the maximum texture size {max}")]
    ResourceTooLarge { width: u32, height: u32, max: u32 },

    #[error("source rectangle lies outside the resource")]
    SourceOutOfBounds,

    #[error("{0}")]
    Custom(String),
}

/// Failure to build a [`Resource`](crate::drawable::Resource).
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("invalid resource size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("failed to parse svg: {0}")]
    Svg(String),
}
