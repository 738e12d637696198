//! Graphics collaborator contracts consumed by the renderer.
//!
//! The renderer never talks to a GPU API directly. Everything it needs is
//! expressed by the traits in this module and provided by a backend:
//!
//! - [`Shader`] receives named uniforms; setters report whether the uniform exists
//! - [`Texture`] is bound by slot, identity is the `Rc` it is shared through
//! - [`VertexArray`] owns vertex storage (re-uploaded by byte range) and the
//!   shared index buffer
//! - [`FrameBuffer`] is a render target with an entity-id attachment for picking
//! - [`GraphicsBackend`] creates resources and issues indexed draws
//!
//! Two backends ship with the crate: [`crate::gpu::WgpuBackend`] for real GPUs
//! and [`recording::RecordingBackend`], a CPU backend that records draws.

pub mod layout;
pub mod recording;
pub mod specification;

use std::rc::Rc;

use crate::math::{Mat4, Vec4};

pub use layout::{AttributeType, VertexAttribute, VertexLayout};
pub use specification::{
    AttachmentFormat, FilterMode, FrameBufferSpecification, TextureSpecification, WrapMode,
};

/// A compiled and linked shader program.
///
/// Setters return `false` when the program has no uniform with that name; this
/// is not an error, the caller decides whether the uniform matters.
pub trait Shader {
    fn is_valid(&self) -> bool;
    fn set_integer(&self, name: &str, value: i32) -> bool;
    fn set_float(&self, name: &str, value: f32) -> bool;
    fn set_vector4(&self, name: &str, value: &Vec4) -> bool;
    fn set_matrix4(&self, name: &str, value: &Mat4) -> bool;
}

pub trait Texture {
    fn size(&self) -> (u32, u32);
    fn is_valid(&self) -> bool;
}

pub trait FrameBuffer {
    fn size(&self) -> (u32, u32);

    /// Resizes every attachment. Returns `false` (and does nothing) for a zero
    /// dimension or an unchanged size.
    fn set_size(&self, width: u32, height: u32) -> bool;

    /// Clears color attachments to `color` and the entity attachment to `-1`.
    fn clear(&self, color: &Vec4) -> anyhow::Result<()>;

    /// Reads the entity id written at pixel `(x, y)`.
    fn read_entity_id(&self, x: u32, y: u32) -> anyhow::Result<i32>;
}

pub trait VertexArray {
    /// Writes `bytes` into the vertex buffer starting at `byte_offset`.
    fn upload(&mut self, byte_offset: u64, bytes: &[u8]) -> anyhow::Result<()>;
    fn vertex_byte_capacity(&self) -> u64;
    fn index_count(&self) -> usize;
}

/// Everything one indexed draw needs.
///
/// `textures[i]` is bound to texture unit `i`; only the occupied prefix of the
/// slot table is passed.
pub struct DrawCall<'a, B: GraphicsBackend + ?Sized> {
    pub shader: &'a B::Shader,
    pub textures: &'a [Option<Rc<B::Texture>>],
    pub target: Option<&'a B::FrameBuffer>,
    pub vertex_array: &'a B::VertexArray,
    pub vertex_count: usize,
    pub index_count: usize,
}

/// Resource factory and draw-command issuer for one graphics API.
pub trait GraphicsBackend {
    type Shader: Shader;
    type Texture: Texture;
    type FrameBuffer: FrameBuffer;
    type VertexArray: VertexArray;

    /// Creates a texture from tightly packed pixels matching `spec`.
    fn create_texture(
        &mut self,
        label: &str,
        spec: &TextureSpecification,
        pixels: &[u8],
    ) -> anyhow::Result<Self::Texture>;

    /// Creates a vertex array able to hold `vertex_capacity` vertices of
    /// `layout`, with an immutable index buffer holding `indices`.
    fn create_vertex_array(
        &mut self,
        layout: &VertexLayout,
        vertex_capacity: usize,
        indices: &[u32],
    ) -> anyhow::Result<Self::VertexArray>;

    fn draw_indexed(&mut self, call: DrawCall<'_, Self>) -> anyhow::Result<()>;
}
