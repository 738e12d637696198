use std::rc::Rc;

use anyhow::bail;
use cgmath::One;
use dg_engine::{
    QuadComponent, QuadSpec, RenderError, Renderer, Scene,
    graphics::{
        DrawCall, GraphicsBackend, TextureSpecification, VertexLayout,
        recording::{
            RecordingBackend, RecordingFrameBuffer, RecordingShader, RecordingTexture,
            RecordingVertexArray,
        },
    },
    math::Mat4,
    renderer::{QUADS_PER_BATCH, TEXTURE_SLOT_COUNT},
};

use crate::common::test_utils::{init_logger, texture};

mod common;

/// Recording backend whose draws fail until `accept_draws` is set.
#[derive(Default)]
struct FlakyBackend {
    inner: RecordingBackend,
    accept_draws: bool,
}

impl GraphicsBackend for FlakyBackend {
    type Shader = RecordingShader;
    type Texture = RecordingTexture;
    type FrameBuffer = RecordingFrameBuffer;
    type VertexArray = RecordingVertexArray;

    fn create_texture(
        &mut self,
        label: &str,
        spec: &TextureSpecification,
        pixels: &[u8],
    ) -> anyhow::Result<Self::Texture> {
        self.inner.create_texture(label, spec, pixels)
    }

    fn create_vertex_array(
        &mut self,
        layout: &VertexLayout,
        vertex_capacity: usize,
        indices: &[u32],
    ) -> anyhow::Result<Self::VertexArray> {
        self.inner.create_vertex_array(layout, vertex_capacity, indices)
    }

    fn draw_indexed(&mut self, call: DrawCall<'_, Self>) -> anyhow::Result<()> {
        if !self.accept_draws {
            bail!("no default target");
        }
        self.inner.draw_indexed(DrawCall {
            shader: call.shader,
            textures: call.textures,
            target: call.target,
            vertex_array: call.vertex_array,
            vertex_count: call.vertex_count,
            index_count: call.index_count,
        })
    }
}

fn flaky_renderer() -> Renderer<FlakyBackend> {
    init_logger();
    let mut renderer = Renderer::new(FlakyBackend::default()).unwrap();
    renderer
        .use_quad_shader_2d(Rc::new(RecordingShader::quad("quad")))
        .unwrap();
    renderer
}

#[test]
fn failed_draw_of_a_full_batch_is_reported_and_the_batch_is_dropped() {
    let mut renderer = flaky_renderer();
    renderer.begin_scene_2d(&Mat4::one()).unwrap();
    for _ in 0..QUADS_PER_BATCH - 1 {
        renderer.submit_quad_2d(&Mat4::one(), &QuadSpec::default()).unwrap();
    }
    let err = renderer.submit_quad_2d(&Mat4::one(), &QuadSpec::default());
    assert!(matches!(err, Err(RenderError::Backend(_))));
    assert!(renderer.is_scene_started());
    assert_eq!(renderer.batch_count_2d(), 1);

    // The next batch starts empty instead of writing past the staging buffer.
    renderer.backend_mut().accept_draws = true;
    renderer.submit_quad_2d(&Mat4::one(), &QuadSpec::default()).unwrap();
    renderer.end_scene_2d().unwrap();

    let draws = renderer.backend().inner.draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].quad_count(), 1);
    assert_eq!(renderer.vertex_count_2d(), (QUADS_PER_BATCH + 1) * 4);
    assert_eq!(renderer.batch_count_2d(), 2);
}

#[test]
fn failed_slot_overflow_flush_still_frees_the_slots() {
    let mut renderer = flaky_renderer();
    let textures: Vec<_> = (0..TEXTURE_SLOT_COUNT)
        .map(|i| texture(&format!("t{i}")))
        .collect();

    renderer.begin_scene_2d(&Mat4::one()).unwrap();
    for texture in &textures[..TEXTURE_SLOT_COUNT - 2] {
        renderer
            .submit_quad_2d(&Mat4::one(), &QuadSpec::textured(Rc::clone(texture)))
            .unwrap();
    }
    let err = renderer.submit_quad_2d(
        &Mat4::one(),
        &QuadSpec::textured(Rc::clone(&textures[TEXTURE_SLOT_COUNT - 2])),
    );
    assert!(matches!(err, Err(RenderError::Backend(_))));
    assert_eq!(renderer.texture_count_2d(), 1);

    renderer.backend_mut().accept_draws = true;
    let last = &textures[TEXTURE_SLOT_COUNT - 1];
    renderer
        .submit_quad_2d(&Mat4::one(), &QuadSpec::textured(Rc::clone(last)))
        .unwrap();
    renderer.end_scene_2d().unwrap();

    let draw = &renderer.backend().inner.draws()[0];
    assert_eq!(draw.textures, vec!["blank", "t15"]);
    assert_eq!(draw.vertices[0].tex_index, 1.0);
}

#[test]
fn failed_final_flush_still_ends_the_scene() {
    let mut renderer = flaky_renderer();
    renderer.begin_scene_2d(&Mat4::one()).unwrap();
    renderer.submit_quad_2d(&Mat4::one(), &QuadSpec::default()).unwrap();

    let err = renderer.end_scene_2d();
    assert!(matches!(err, Err(RenderError::Backend(_))));
    assert!(!renderer.is_scene_started());

    renderer.backend_mut().accept_draws = true;
    renderer.begin_scene_2d(&Mat4::one()).unwrap();
    renderer.submit_quad_2d(&Mat4::one(), &QuadSpec::default()).unwrap();
    renderer.end_scene_2d().unwrap();
    assert_eq!(renderer.backend().inner.draws().len(), 1);
    assert_eq!(renderer.vertex_count_2d(), 4);
}

#[test]
fn scene_reports_the_submission_error_when_closing_also_fails() {
    let mut renderer = flaky_renderer();
    let mut scene: Scene<RecordingTexture> = Scene::new();
    let fine = scene.create_entity("fine");
    scene.add_quad(fine, QuadComponent::default());
    let broken = scene.create_entity("broken");
    scene.add_quad(broken, QuadComponent::default());
    scene.transform_mut(broken).unwrap().transform[3][3] = 0.0;

    // The queued quad cannot be drawn either; the first error wins.
    let err = scene.update(&mut renderer);
    assert!(matches!(err, Err(RenderError::DegenerateVertex)));
    assert!(!renderer.is_scene_started());

    renderer.backend_mut().accept_draws = true;
    scene.remove_quad(broken);
    scene.update(&mut renderer).unwrap();
    assert_eq!(renderer.backend().inner.draws().len(), 1);
}
