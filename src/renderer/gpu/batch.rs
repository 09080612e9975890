//! Sprite batching.
//!
//! Quads are collected in paint order; consecutive quads that sample the
//! same resource share one draw call. Reordering across resources would
//! break paint order, so only adjacent runs are merged.

use std::ops::Range;

use wgpu::{VertexAttribute, VertexBufferLayout, VertexFormat, VertexStepMode};

use crate::drawable::ResourceId;

/// Vertex with pre-computed NDC position, UV coordinates and alpha.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SpriteVertex {
    /// Position in NDC (pre-computed on CPU)
    pub position: [f32; 2],
    /// Texture coordinates
    pub uv: [f32; 2],
    /// Effective alpha of the node
    pub alpha: f32,
}

impl SpriteVertex {
    pub fn desc() -> VertexBufferLayout<'static> {
        VertexBufferLayout {
            array_stride: std::mem::size_of::<SpriteVertex>() as u64,
            step_mode: VertexStepMode::Vertex,
            attributes: &[
                // position (NDC)
                VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: VertexFormat::Float32x2,
                },
                // uv
                VertexAttribute {
                    offset: 8,
                    shader_location: 1,
                    format: VertexFormat::Float32x2,
                },
                // alpha
                VertexAttribute {
                    offset: 16,
                    shader_location: 2,
                    format: VertexFormat::Float32,
                },
            ],
        }
    }
}

/// Convert screen coordinates to NDC (Normalized Device Coordinates).
#[inline]
pub fn to_ndc(x: f32, y: f32, screen_width: f32, screen_height: f32) -> [f32; 2] {
    [
        (x / screen_width) * 2.0 - 1.0,
        1.0 - (y / screen_height) * 2.0,
    ]
}

/// One textured quad in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteQuad {
    pub resource: ResourceId,
    /// Top-left, top-right, bottom-left, bottom-right.
    pub corners: [(f32, f32); 4],
    /// Normalized source rect: u0, v0, u1, v1.
    pub uv: [f32; 4],
    pub alpha: f32,
}

/// A run of quads drawn with one texture binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub resource: ResourceId,
    pub indices: Range<u32>,
}

#[derive(Debug, Default)]
pub struct BatchList {
    pub vertices: Vec<SpriteVertex>,
    pub indices: Vec<u32>,
    pub batches: Vec<Batch>,
}

const QUAD_INDICES: [u32; 6] = [0, 1, 2, 1, 3, 2];

pub fn build_batches(quads: &[SpriteQuad], screen_width: f32, screen_height: f32) -> BatchList {
    let mut list = BatchList {
        vertices: Vec::with_capacity(quads.len() * 4),
        indices: Vec::with_capacity(quads.len() * 6),
        batches: Vec::new(),
    };

    for quad in quads {
        let base = list.vertices.len() as u32;
        let [u0, v0, u1, v1] = quad.uv;
        let uvs = [[u0, v0], [u1, v0], [u0, v1], [u1, v1]];
        for (&(x, y), uv) in quad.corners.iter().zip(uvs) {
            list.vertices.push(SpriteVertex {
                position: to_ndc(x, y, screen_width, screen_height),
                uv,
                alpha: quad.alpha,
            });
        }

        let start = list.indices.len() as u32;
        list.indices.extend(QUAD_INDICES.iter().map(|i| base + i));
        let end = list.indices.len() as u32;

        match list.batches.last_mut() {
            Some(batch) if batch.resource == quad.resource => batch.indices.end = end,
            _ => list.batches.push(Batch {
                resource: quad.resource,
                indices: start..end,
            }),
        }
    }

    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawable::Resource;

    fn quad(resource: ResourceId) -> SpriteQuad {
        SpriteQuad {
            resource,
            corners: [(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (10.0, 10.0)],
            uv: [0.0, 0.0, 1.0, 1.0],
            alpha: 1.0,
        }
    }

    fn resource_id() -> ResourceId {
        Resource::from_rgba8(1, 1, vec![0, 0, 0, 255]).unwrap().id()
    }

    #[test]
    fn test_adjacent_quads_share_batch() {
        let a = resource_id();
        let list = build_batches(&[quad(a), quad(a), quad(a)], 10.0, 10.0);
        assert_eq!(list.batches, vec![Batch { resource: a, indices: 0..18 }]);
        assert_eq!(list.vertices.len(), 12);
    }

    #[test]
    fn test_interleaved_resources_keep_paint_order() {
        let a = resource_id();
        let b = resource_id();
        let list = build_batches(&[quad(a), quad(b), quad(a)], 10.0, 10.0);
        let resources: Vec<_> = list.batches.iter().map(|b| b.resource).collect();
        assert_eq!(resources, vec![a, b, a]);
        assert_eq!(list.batches[2].indices, 12..18);
    }

    #[test]
    fn test_indices_offset_per_quad() {
        let a = resource_id();
        let list = build_batches(&[quad(a), quad(a)], 10.0, 10.0);
        assert_eq!(&list.indices[6..], &[4, 5, 6, 5, 7, 6]);
    }

    #[test]
    fn test_corners_map_to_ndc() {
        let a = resource_id();
        let list = build_batches(&[quad(a)], 10.0, 10.0);
        assert_eq!(list.vertices[0].position, [-1.0, 1.0]);
        assert_eq!(list.vertices[3].position, [1.0, -1.0]);
        assert_eq!(list.vertices[3].uv, [1.0, 1.0]);
    }

    #[test]
    fn test_empty_input() {
        let list = build_batches(&[], 10.0, 10.0);
        assert!(list.batches.is_empty());
        assert!(list.indices.is_empty());
    }
}
