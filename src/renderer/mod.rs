//! Batched 2D quad renderer.
//!
//! A scene is drawn as `begin_scene_2d` → `submit_quad_2d`* → `end_scene_2d`.
//! Submissions are accumulated into one staging buffer and flushed as a single
//! indexed draw per batch. A batch ends early when it runs out of vertex
//! space, index space or texture slots; the scene then continues in a fresh
//! batch, so capacity limits are invisible to callers except for the extra
//! draw call.
//!
//! Quads are drawn in submission order. The renderer never sorts.
//!
//! # Key types
//!
//! - [`Renderer`] owns the backend and the batch state
//! - [`QuadSpec`] carries the per-quad color, texture and entity id
//! - [`batch::QuadVertex2D`] is the vertex format written to the GPU

pub mod batch;
pub mod slots;

use std::rc::Rc;

use cgmath::{One, Vector3};

use crate::{
    error::{RenderError, Result},
    graphics::{DrawCall, GraphicsBackend, Shader, TextureSpecification, VertexArray},
    math::{self, Mat4, Vec2, Vec3, Vec4, color},
};

pub use batch::{
    INDICES_PER_BATCH, QUADS_PER_BATCH, QuadVertex2D, RenderData2D, VERTICES_PER_BATCH,
};
pub use slots::{BLANK_SLOT, TEXTURE_SLOT_COUNT, TextureSlots};

/// Uniform receiving the camera product (projection × inverse view).
pub const VIEW_PROJECTION_UNIFORM: &str = "u_view_projection";

/// Sampler array uniform; element `i` is pointed at texture unit `i`.
pub const TEXTURES_UNIFORM: &str = "u_textures";

/// Appearance of one submitted quad.
pub struct QuadSpec<T> {
    pub color: Vec4,
    /// `None` draws a flat-colored quad using the blank texture.
    pub texture: Option<Rc<T>>,
    /// Opaque tag written to every vertex for pick-buffer readback.
    pub entity_id: i32,
}

impl<T> Default for QuadSpec<T> {
    fn default() -> Self {
        Self {
            color: color::WHITE,
            texture: None,
            entity_id: -1,
        }
    }
}

impl<T> Clone for QuadSpec<T> {
    fn clone(&self) -> Self {
        Self {
            color: self.color,
            texture: self.texture.clone(),
            entity_id: self.entity_id,
        }
    }
}

impl<T> QuadSpec<T> {
    pub fn colored(color: Vec4) -> Self {
        Self {
            color,
            ..Default::default()
        }
    }

    pub fn textured(texture: Rc<T>) -> Self {
        Self {
            texture: Some(texture),
            ..Default::default()
        }
    }

    pub fn with_color(mut self, color: Vec4) -> Self {
        self.color = color;
        self
    }

    pub fn with_texture(mut self, texture: Rc<T>) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn with_entity_id(mut self, entity_id: i32) -> Self {
        self.entity_id = entity_id;
        self
    }
}

/// Shorthand for the quad spec of a backend's texture type.
pub type QuadSpecFor<B> = QuadSpec<<B as GraphicsBackend>::Texture>;

pub struct Renderer<B: GraphicsBackend> {
    backend: B,
    data: RenderData2D<B>,
}

impl<B: GraphicsBackend> Renderer<B> {
    /// Allocates the blank texture, the staging vertices and the GPU vertex
    /// and index buffers. Nothing is reallocated afterwards.
    pub fn new(mut backend: B) -> Result<Self> {
        let blank = backend.create_texture("blank", &TextureSpecification::default(), &[255; 4])?;
        let indices = batch::quad_indices(QUADS_PER_BATCH);
        let vertex_array =
            backend.create_vertex_array(&QuadVertex2D::layout(), VERTICES_PER_BATCH, &indices)?;

        log::info!(
            "2D renderer ready: {QUADS_PER_BATCH} quads per batch, {TEXTURE_SLOT_COUNT} texture slots"
        );
        Ok(Self {
            backend,
            data: RenderData2D::new(vertex_array, Rc::new(blank)),
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Redirects subsequent draws to `frame_buffer` (`None` for the backend's
    /// default target). Geometry already queued in a running scene is flushed
    /// to the previous target first.
    pub fn use_frame_buffer_2d(&mut self, frame_buffer: Option<Rc<B::FrameBuffer>>) -> Result<()> {
        if self.data.scene_started {
            self.flush_scene_2d(true)?;
        }
        log::debug!(
            "2D render target switched to {}",
            if frame_buffer.is_some() { "frame buffer" } else { "default target" }
        );
        self.data.frame_buffer = frame_buffer;
        Ok(())
    }

    /// Assigns the shader quads are drawn with.
    ///
    /// Fails with [`RenderError::InvalidShader`] if the program did not build.
    /// A running scene is flushed with the old shader and continues with the
    /// new one, which receives the current camera product.
    pub fn use_quad_shader_2d(&mut self, shader: Rc<B::Shader>) -> Result<()> {
        if !shader.is_valid() {
            return Err(RenderError::InvalidShader);
        }
        if self.data.scene_started {
            self.flush_scene_2d(true)?;
        }

        let unbound = (0..TEXTURE_SLOT_COUNT)
            .filter(|&slot| !shader.set_integer(&format!("{TEXTURES_UNIFORM}[{slot}]"), slot as i32))
            .count();
        if unbound > 0 {
            log::debug!("quad shader has no {TEXTURES_UNIFORM} entries for {unbound} slots, slots bind positionally");
        }

        if self.data.scene_started {
            upload_camera(&*shader, &self.data.camera_product);
        }
        self.data.quad_shader = Some(shader);
        Ok(())
    }

    /// Starts a scene seen through `projection × view⁻¹`.
    pub fn begin_scene_2d_with(&mut self, projection: &Mat4, view: &Mat4) -> Result<()> {
        self.ensure_can_begin()?;
        let inverse_view = math::inverse(view).ok_or(RenderError::SingularView)?;
        self.begin_scene_2d(&(projection * inverse_view))
    }

    /// Starts a scene with a precomputed camera product.
    pub fn begin_scene_2d(&mut self, camera_product: &Mat4) -> Result<()> {
        self.ensure_can_begin()?;
        let shader = self
            .data
            .quad_shader
            .clone()
            .ok_or(RenderError::NoQuadShader)?;

        self.data.reset_scene();
        self.data.camera_product = *camera_product;
        upload_camera(&*shader, camera_product);
        self.data.scene_started = true;
        Ok(())
    }

    /// Queues one unit quad transformed by `transform`.
    ///
    /// Flushes early afterwards if the batch ran out of any capacity.
    pub fn submit_quad_2d(&mut self, transform: &Mat4, spec: &QuadSpec<B::Texture>) -> Result<()> {
        if !self.data.scene_started {
            return Err(RenderError::SceneNotStarted);
        }

        let mut corners = [Vector3::new(0.0, 0.0, 0.0); 4];
        for (corner, template) in corners.iter_mut().zip(self.data.quad_positions) {
            *corner = math::dehomogenize(transform * template).ok_or(RenderError::DegenerateVertex)?;
        }

        let tex_index = match self.data.slots.slot(spec.texture.as_ref()) {
            Some(index) => index,
            None => {
                // Only reachable if a previous submission left the table full.
                self.flush_scene_2d(true)?;
                self.data.slots.slot(spec.texture.as_ref()).unwrap_or(BLANK_SLOT)
            }
        };

        self.data
            .push_quad(&corners, spec.color, tex_index as f32, spec.entity_id as f32);

        if self.data.batch_is_full() {
            self.flush_scene_2d(true)?;
        }
        Ok(())
    }

    /// Queues a quad from position, size and rotation about +Z in degrees.
    pub fn submit_quad_2d_at(
        &mut self,
        position: Vec3,
        size: Vec2,
        rotation_degrees: f32,
        spec: &QuadSpec<B::Texture>,
    ) -> Result<()> {
        let transform = math::translate(&Mat4::one(), position)
            * math::rotate(&Mat4::one(), math::radians(rotation_degrees), math::UNIT_Z)
            * math::scale(&Mat4::one(), Vector3::new(size.x, size.y, 1.0));
        self.submit_quad_2d(&transform, spec)
    }

    /// Draws what is left of the batch and closes the scene. The scene
    /// counters stay readable until the next `begin_scene_2d`.
    pub fn end_scene_2d(&mut self) -> Result<()> {
        if !self.data.scene_started {
            return Err(RenderError::SceneNotStarted);
        }
        let flushed = self.flush_scene_2d(false);
        self.data.scene_started = false;
        flushed
    }

    /// Uploads the queued vertices and issues one indexed draw for them.
    ///
    /// With `early` the batch counters and texture slots are reset so the
    /// scene continues in a fresh batch. The scene batch count is incremented
    /// either way. A failed upload or draw drops the batch; the reset still
    /// happens so later submissions find room.
    pub fn flush_scene_2d(&mut self, early: bool) -> Result<()> {
        if !self.data.scene_started {
            return Err(RenderError::SceneNotStarted);
        }

        let drawn = self.draw_batch();
        self.data.scene_batch_count += 1;
        if early {
            self.data.reset_batch();
        }
        drawn
    }

    fn draw_batch(&mut self) -> Result<()> {
        let vertex_count = self.data.batch_vertex_count;
        if vertex_count == 0 {
            return Ok(());
        }
        let bytes: &[u8] = bytemuck::cast_slice(&self.data.vertices[..vertex_count]);
        self.data.vertex_array.upload(0, bytes)?;

        let shader = self
            .data
            .quad_shader
            .as_deref()
            .ok_or(RenderError::NoQuadShader)?;
        self.backend.draw_indexed(DrawCall {
            shader,
            textures: self.data.slots.occupied(),
            target: self.data.frame_buffer.as_deref(),
            vertex_array: &self.data.vertex_array,
            vertex_count,
            index_count: self.data.batch_index_count,
        })?;
        log::debug!(
            "flushed 2D batch {}: {} vertices, {} indices, {} textures",
            self.data.scene_batch_count,
            vertex_count,
            self.data.batch_index_count,
            self.data.slots.count(),
        );
        Ok(())
    }

    pub fn vertex_count_2d(&self) -> usize {
        self.data.scene_vertex_count
    }

    pub fn index_count_2d(&self) -> usize {
        self.data.scene_index_count
    }

    pub fn batch_count_2d(&self) -> usize {
        self.data.scene_batch_count
    }

    /// Occupied texture slots in the current batch, the blank slot included.
    pub fn texture_count_2d(&self) -> usize {
        self.data.slots.count()
    }

    pub fn is_scene_started(&self) -> bool {
        self.data.scene_started
    }

    pub fn camera_product(&self) -> &Mat4 {
        &self.data.camera_product
    }

    pub fn quad_shader(&self) -> Option<&Rc<B::Shader>> {
        self.data.quad_shader.as_ref()
    }

    pub fn frame_buffer(&self) -> Option<&Rc<B::FrameBuffer>> {
        self.data.frame_buffer.as_ref()
    }

    pub fn blank_texture(&self) -> &Rc<B::Texture> {
        self.data
            .slots
            .get(BLANK_SLOT)
            .unwrap_or_else(|| unreachable!("slot 0 always holds the blank texture"))
    }

    fn ensure_can_begin(&self) -> Result<()> {
        if self.data.scene_started {
            return Err(RenderError::SceneAlreadyStarted);
        }
        if self.data.quad_shader.is_none() {
            return Err(RenderError::NoQuadShader);
        }
        Ok(())
    }
}

fn upload_camera<S: Shader + ?Sized>(shader: &S, camera_product: &Mat4) {
    if !shader.set_matrix4(VIEW_PROJECTION_UNIFORM, camera_product) {
        log::warn!("quad shader has no {VIEW_PROJECTION_UNIFORM} uniform, camera is ignored");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::recording::{RecordingBackend, RecordingShader, RecordingTexture};

    fn renderer() -> Renderer<RecordingBackend> {
        let mut renderer = Renderer::new(RecordingBackend::default()).unwrap();
        renderer
            .use_quad_shader_2d(Rc::new(RecordingShader::quad("quad")))
            .unwrap();
        renderer
    }

    #[test]
    fn identity_quad_emits_canonical_corners() {
        let mut renderer = renderer();
        renderer.begin_scene_2d(&Mat4::one()).unwrap();
        renderer.submit_quad_2d(&Mat4::one(), &QuadSpec::default()).unwrap();
        renderer.end_scene_2d().unwrap();

        let draws = renderer.backend().draws();
        assert_eq!(draws.len(), 1);
        let positions: Vec<[f32; 3]> = draws[0].vertices.iter().map(|v| v.position).collect();
        assert_eq!(
            positions,
            vec![
                [-0.5, -0.5, 0.0],
                [0.5, -0.5, 0.0],
                [0.5, 0.5, 0.0],
                [-0.5, 0.5, 0.0]
            ]
        );
        assert_eq!(draws[0].indices, vec![0, 1, 2, 2, 3, 0]);
        assert!(draws[0].vertices.iter().all(|v| v.entity_id == -1.0));
        assert!(draws[0].vertices.iter().all(|v| v.color == [1.0; 4]));
        assert!(draws[0].vertices.iter().all(|v| v.tex_index == 0.0));
    }

    #[test]
    fn placed_quad_is_scaled_rotated_and_translated() {
        let mut renderer = renderer();
        renderer.begin_scene_2d(&Mat4::one()).unwrap();
        renderer
            .submit_quad_2d_at(
                Vector3::new(3.0, 4.0, 0.0),
                cgmath::Vector2::new(2.0, 1.0),
                90.0,
                &QuadSpec::default(),
            )
            .unwrap();
        renderer.end_scene_2d().unwrap();

        let first = renderer.backend().draws()[0].vertices[0].position;
        // (-0.5, -0.5) scaled to (-1, -0.5), rotated to (0.5, -1), moved to (3.5, 3).
        assert!((first[0] - 3.5).abs() < 1e-5);
        assert!((first[1] - 3.0).abs() < 1e-5);
    }

    #[test]
    fn zero_scale_is_accepted() {
        let mut renderer = renderer();
        renderer.begin_scene_2d(&Mat4::one()).unwrap();
        let flat = math::scale(&Mat4::one(), Vector3::new(0.0, 0.0, 1.0));
        renderer.submit_quad_2d(&flat, &QuadSpec::default()).unwrap();
        assert_eq!(renderer.vertex_count_2d(), 4);
    }

    #[test]
    fn zero_w_is_rejected_without_queuing() {
        let mut renderer = renderer();
        renderer.begin_scene_2d(&Mat4::one()).unwrap();
        let mut collapse = Mat4::one();
        collapse[3][3] = 0.0;
        let err = renderer.submit_quad_2d(&collapse, &QuadSpec::default());
        assert!(matches!(err, Err(RenderError::DegenerateVertex)));
        assert_eq!(renderer.vertex_count_2d(), 0);
        assert_eq!(renderer.texture_count_2d(), 1);
    }

    #[test]
    fn two_matrix_begin_inverts_the_view() {
        let mut renderer = renderer();
        let view = math::translate(&Mat4::one(), Vector3::new(5.0, 0.0, 0.0));
        renderer.begin_scene_2d_with(&Mat4::one(), &view).unwrap();
        let moved = renderer.camera_product() * math::point(5.0, 0.0, 0.0);
        assert!((moved.x).abs() < 1e-5);
    }

    #[test]
    fn singular_view_is_rejected() {
        let mut renderer = renderer();
        let view = math::scale(&Mat4::one(), Vector3::new(0.0, 1.0, 1.0));
        let err = renderer.begin_scene_2d_with(&Mat4::one(), &view);
        assert!(matches!(err, Err(RenderError::SingularView)));
        assert!(!renderer.is_scene_started());
    }

    #[test]
    fn begin_uploads_camera_product() {
        let mut renderer = renderer();
        let camera = math::orthographic(10.0, 1.0, -1.0, 1.0);
        renderer.begin_scene_2d(&camera).unwrap();
        let shader = renderer.quad_shader().unwrap();
        assert_eq!(shader.matrix4(VIEW_PROJECTION_UNIFORM), Some(camera));
    }

    #[test]
    fn invalid_shader_is_rejected() {
        let mut renderer = Renderer::new(RecordingBackend::default()).unwrap();
        let err = renderer.use_quad_shader_2d(Rc::new(RecordingShader::invalid("broken")));
        assert!(matches!(err, Err(RenderError::InvalidShader)));
        assert!(renderer.quad_shader().is_none());
    }

    #[test]
    fn quad_shader_receives_texture_slot_indices() {
        let renderer = renderer();
        let shader = renderer.quad_shader().unwrap();
        for slot in 0..TEXTURE_SLOT_COUNT {
            assert_eq!(
                shader.integer(&format!("{TEXTURES_UNIFORM}[{slot}]")),
                Some(slot as i32)
            );
        }
    }

    #[test]
    fn shader_swap_mid_scene_flushes_and_reuploads_camera() {
        let mut renderer = renderer();
        let camera = math::orthographic(4.0, 2.0, -1.0, 1.0);
        renderer.begin_scene_2d(&camera).unwrap();
        renderer.submit_quad_2d(&Mat4::one(), &QuadSpec::default()).unwrap();

        let second = Rc::new(RecordingShader::quad("second"));
        renderer.use_quad_shader_2d(Rc::clone(&second)).unwrap();
        assert_eq!(renderer.backend().draws().len(), 1);
        assert_eq!(renderer.backend().draws()[0].shader, "quad");
        assert_eq!(second.matrix4(VIEW_PROJECTION_UNIFORM), Some(camera));

        renderer.submit_quad_2d(&Mat4::one(), &QuadSpec::default()).unwrap();
        renderer.end_scene_2d().unwrap();
        assert_eq!(renderer.backend().draws()[1].shader, "second");
        assert_eq!(renderer.batch_count_2d(), 2);
        assert_eq!(renderer.vertex_count_2d(), 8);
    }

    #[test]
    fn textures_are_passed_in_slot_order() {
        let mut renderer = renderer();
        let a = Rc::new(RecordingTexture::new("a", 8, 8));
        let b = Rc::new(RecordingTexture::new("b", 8, 8));
        renderer.begin_scene_2d(&Mat4::one()).unwrap();
        for texture in [&b, &a, &b] {
            renderer
                .submit_quad_2d(&Mat4::one(), &QuadSpec::textured(Rc::clone(texture)))
                .unwrap();
        }
        renderer.end_scene_2d().unwrap();

        let draw = &renderer.backend().draws()[0];
        assert_eq!(draw.textures, vec!["blank", "b", "a"]);
        let tex_indices: Vec<f32> = draw.vertices.iter().step_by(4).map(|v| v.tex_index).collect();
        assert_eq!(tex_indices, vec![1.0, 2.0, 1.0]);
    }
}
