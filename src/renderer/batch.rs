//! Batch state shared by every 2D scene a renderer draws.

use std::rc::Rc;

use bytemuck::{Pod, Zeroable};
use cgmath::{One, Vector2, Vector4};

use crate::{
    graphics::{AttributeType, GraphicsBackend, VertexLayout},
    math::{Mat4, Vec2, Vec3, Vec4},
    renderer::slots::TextureSlots,
};

pub const QUADS_PER_BATCH: usize = 25_000;
pub const VERTICES_PER_BATCH: usize = QUADS_PER_BATCH * 4;
pub const INDICES_PER_BATCH: usize = QUADS_PER_BATCH * 6;

pub const VERTICES_PER_QUAD: usize = 4;
pub const INDICES_PER_QUAD: usize = 6;

/// Two counter-clockwise triangles over the corners of one quad.
pub const QUAD_INDEX_PATTERN: [u32; INDICES_PER_QUAD] = [0, 1, 2, 2, 3, 0];

/// One corner of a submitted quad as it is laid out in the vertex buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct QuadVertex2D {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub color: [f32; 4],
    pub tex_index: f32,
    /// Opaque tag for pick-buffer readback, `-1` for none.
    pub entity_id: f32,
}

impl QuadVertex2D {
    pub fn layout() -> VertexLayout {
        VertexLayout::new(&[
            ("a_position", 3, AttributeType::Float32),
            ("a_tex_coords", 2, AttributeType::Float32),
            ("a_color", 4, AttributeType::Float32),
            ("a_tex_index", 1, AttributeType::Float32),
            ("a_entity_id", 1, AttributeType::Float32),
        ])
    }
}

/// Indices for `quad_count` quads laid out back to back.
pub fn quad_indices(quad_count: usize) -> Vec<u32> {
    (0..quad_count)
        .flat_map(|quad| {
            let base = (quad * VERTICES_PER_QUAD) as u32;
            QUAD_INDEX_PATTERN.map(|offset| base + offset)
        })
        .collect()
}

/// Unit quad centred on the origin, bottom-left first, counter-clockwise.
pub(crate) fn unit_quad_positions() -> [Vec4; 4] {
    [
        Vector4::new(-0.5, -0.5, 0.0, 1.0),
        Vector4::new(0.5, -0.5, 0.0, 1.0),
        Vector4::new(0.5, 0.5, 0.0, 1.0),
        Vector4::new(-0.5, 0.5, 0.0, 1.0),
    ]
}

pub(crate) fn unit_quad_tex_coords() -> [Vec2; 4] {
    [
        Vector2::new(0.0, 0.0),
        Vector2::new(1.0, 0.0),
        Vector2::new(1.0, 1.0),
        Vector2::new(0.0, 1.0),
    ]
}

/// Counters and buffers of the scene and batch in progress.
///
/// Allocated once with the renderer. Between scenes only the counters are
/// reset; the staging vertices are overwritten in place.
pub struct RenderData2D<B: GraphicsBackend> {
    pub(crate) scene_started: bool,
    pub(crate) scene_vertex_count: usize,
    pub(crate) scene_index_count: usize,
    pub(crate) scene_batch_count: usize,
    pub(crate) batch_vertex_count: usize,
    pub(crate) batch_index_count: usize,

    pub(crate) camera_product: Mat4,

    pub(crate) quad_shader: Option<Rc<B::Shader>>,
    pub(crate) frame_buffer: Option<Rc<B::FrameBuffer>>,
    pub(crate) vertex_array: B::VertexArray,
    pub(crate) vertices: Vec<QuadVertex2D>,
    pub(crate) slots: TextureSlots<B::Texture>,

    pub(crate) quad_positions: [Vec4; 4],
    pub(crate) quad_tex_coords: [Vec2; 4],
}

impl<B: GraphicsBackend> RenderData2D<B> {
    pub(crate) fn new(vertex_array: B::VertexArray, blank_texture: Rc<B::Texture>) -> Self {
        Self {
            scene_started: false,
            scene_vertex_count: 0,
            scene_index_count: 0,
            scene_batch_count: 0,
            batch_vertex_count: 0,
            batch_index_count: 0,
            camera_product: Mat4::one(),
            quad_shader: None,
            frame_buffer: None,
            vertex_array,
            vertices: vec![QuadVertex2D::zeroed(); VERTICES_PER_BATCH],
            slots: TextureSlots::new(blank_texture),
            quad_positions: unit_quad_positions(),
            quad_tex_coords: unit_quad_tex_coords(),
        }
    }

    pub(crate) fn reset_scene(&mut self) {
        self.scene_vertex_count = 0;
        self.scene_index_count = 0;
        self.scene_batch_count = 0;
        self.reset_batch();
    }

    pub(crate) fn reset_batch(&mut self) {
        self.batch_vertex_count = 0;
        self.batch_index_count = 0;
        self.slots.reset();
    }

    /// True once any per-batch capacity is reached.
    pub(crate) fn batch_is_full(&self) -> bool {
        self.batch_vertex_count >= VERTICES_PER_BATCH
            || self.batch_index_count >= INDICES_PER_BATCH
            || self.slots.is_full()
    }

    /// Writes the four corners of one quad at the batch cursor and advances
    /// the batch and scene counters. The caller guarantees room for a quad.
    pub(crate) fn push_quad(
        &mut self,
        corners: &[Vec3; 4],
        color: Vec4,
        tex_index: f32,
        entity_id: f32,
    ) {
        let base = self.batch_vertex_count;
        for (i, corner) in corners.iter().enumerate() {
            self.vertices[base + i] = QuadVertex2D {
                position: (*corner).into(),
                tex_coords: self.quad_tex_coords[i].into(),
                color: color.into(),
                tex_index,
                entity_id,
            };
        }

        self.batch_vertex_count += VERTICES_PER_QUAD;
        self.batch_index_count += INDICES_PER_QUAD;
        self.scene_vertex_count += VERTICES_PER_QUAD;
        self.scene_index_count += INDICES_PER_QUAD;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacities_follow_quads_per_batch() {
        assert_eq!(VERTICES_PER_BATCH, 100_000);
        assert_eq!(INDICES_PER_BATCH, 150_000);
    }

    #[test]
    fn layout_matches_vertex_struct() {
        let layout = QuadVertex2D::layout();
        assert_eq!(layout.stride() as usize, std::mem::size_of::<QuadVertex2D>());
        let offsets: Vec<u64> = layout.attributes().iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 20, 36, 40]);
    }

    #[test]
    fn indices_repeat_the_pattern_per_quad() {
        let indices = quad_indices(3);
        assert_eq!(indices.len(), 18);
        assert_eq!(&indices[..6], &[0, 1, 2, 2, 3, 0]);
        assert_eq!(&indices[6..12], &[4, 5, 6, 6, 7, 4]);
        assert_eq!(&indices[12..], &[8, 9, 10, 10, 11, 8]);
    }

    #[test]
    fn full_index_buffer_addresses_every_batch_vertex() {
        let indices = quad_indices(QUADS_PER_BATCH);
        assert_eq!(indices.len(), INDICES_PER_BATCH);
        assert_eq!(indices.iter().max().copied(), Some(VERTICES_PER_BATCH as u32 - 1));
    }

    #[test]
    fn unit_quad_is_counter_clockwise() {
        let p = unit_quad_positions();
        // Signed area of the polygon is positive for CCW winding.
        let area: f32 = (0..4)
            .map(|i| {
                let (a, b) = (p[i], p[(i + 1) % 4]);
                a.x * b.y - b.x * a.y
            })
            .sum();
        assert!(area > 0.0);
    }
}
