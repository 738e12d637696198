use std::rc::Rc;

use cgmath::{One, Vector2, Vector3};
use dg_engine::{
    QuadSpec, RenderError, Renderer,
    graphics::recording::{RecordingBackend, RecordingShader},
    math::{Mat4, color},
    renderer::{INDICES_PER_BATCH, QUADS_PER_BATCH, TEXTURE_SLOT_COUNT, VERTICES_PER_BATCH},
};

use crate::common::test_utils::{init_logger, recording_renderer as renderer, texture};

mod common;

fn submit_plain(renderer: &mut Renderer<RecordingBackend>, count: usize) {
    for _ in 0..count {
        renderer
            .submit_quad_2d(&Mat4::one(), &QuadSpec::default())
            .unwrap();
    }
}

#[test]
fn three_quads_two_sharing_a_texture_make_one_batch() {
    let mut renderer = renderer();
    let shared = texture("shared");

    renderer.begin_scene_2d(&Mat4::one()).unwrap();
    renderer
        .submit_quad_2d_at(
            Vector3::new(0.0, 0.0, 0.0),
            Vector2::new(1.0, 1.0),
            0.0,
            &QuadSpec::colored(color::RED),
        )
        .unwrap();
    renderer
        .submit_quad_2d_at(
            Vector3::new(1.0, 0.0, 0.0),
            Vector2::new(1.0, 1.0),
            0.0,
            &QuadSpec::textured(Rc::clone(&shared)),
        )
        .unwrap();
    renderer
        .submit_quad_2d_at(
            Vector3::new(2.0, 0.0, 0.0),
            Vector2::new(1.0, 1.0),
            45.0,
            &QuadSpec::textured(Rc::clone(&shared)).with_color(color::GREEN),
        )
        .unwrap();
    renderer.end_scene_2d().unwrap();

    assert_eq!(renderer.vertex_count_2d(), 12);
    assert_eq!(renderer.index_count_2d(), 18);
    assert_eq!(renderer.batch_count_2d(), 1);
    assert_eq!(renderer.texture_count_2d(), 2);

    let draws = renderer.backend().draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].textures, vec!["blank", "shared"]);
    assert_eq!(draws[0].indices.len(), 18);
    assert_eq!(&draws[0].indices[12..], &[8, 9, 10, 10, 11, 8]);
}

#[test]
fn counters_stay_readable_until_the_next_scene() {
    let mut renderer = renderer();
    renderer.begin_scene_2d(&Mat4::one()).unwrap();
    submit_plain(&mut renderer, 5);
    renderer.end_scene_2d().unwrap();
    assert_eq!(renderer.vertex_count_2d(), 20);

    renderer.begin_scene_2d(&Mat4::one()).unwrap();
    assert_eq!(renderer.vertex_count_2d(), 0);
    assert_eq!(renderer.index_count_2d(), 0);
    assert_eq!(renderer.batch_count_2d(), 0);
    assert_eq!(renderer.texture_count_2d(), 1);
}

#[test]
fn scene_larger_than_a_batch_is_split_into_full_batches() {
    let mut renderer = renderer();
    let quads = 2 * QUADS_PER_BATCH + 1;

    renderer.begin_scene_2d(&Mat4::one()).unwrap();
    submit_plain(&mut renderer, quads);
    renderer.end_scene_2d().unwrap();

    let draws = renderer.backend().draws();
    assert_eq!(draws.len(), quads.div_ceil(QUADS_PER_BATCH));
    assert!(draws.iter().all(|draw| draw.vertices.len() <= VERTICES_PER_BATCH));
    assert!(draws.iter().all(|draw| draw.indices.len() <= INDICES_PER_BATCH));
    assert_eq!(draws[0].vertices.len(), VERTICES_PER_BATCH);
    assert_eq!(draws[1].vertices.len(), VERTICES_PER_BATCH);
    assert_eq!(draws[2].vertices.len(), 4);

    assert_eq!(renderer.vertex_count_2d(), quads * 4);
    assert_eq!(renderer.index_count_2d(), quads * 6);
    assert_eq!(renderer.batch_count_2d(), 3);
}

#[test]
fn exactly_one_full_batch_is_drawn_once() {
    let mut renderer = renderer();
    renderer.begin_scene_2d(&Mat4::one()).unwrap();
    submit_plain(&mut renderer, QUADS_PER_BATCH);
    // The batch flushed itself when it filled up.
    assert_eq!(renderer.backend().draws().len(), 1);
    renderer.end_scene_2d().unwrap();

    assert_eq!(renderer.backend().draws().len(), 1);
    // The empty terminal flush still counts as a batch.
    assert_eq!(renderer.batch_count_2d(), 2);
}

#[test]
fn repeated_texture_occupies_one_slot() {
    let mut renderer = renderer();
    let grass = texture("grass");

    renderer.begin_scene_2d(&Mat4::one()).unwrap();
    for _ in 0..50 {
        renderer
            .submit_quad_2d(&Mat4::one(), &QuadSpec::textured(Rc::clone(&grass)))
            .unwrap();
    }
    assert_eq!(renderer.texture_count_2d(), 2);
    renderer.end_scene_2d().unwrap();

    let draw = &renderer.backend().draws()[0];
    assert_eq!(draw.textures, vec!["blank", "grass"]);
    assert!(draw.vertices.iter().all(|v| v.tex_index == 1.0));
}

#[test]
fn running_out_of_texture_slots_starts_a_new_batch() {
    let mut renderer = renderer();
    let textures: Vec<_> = (0..TEXTURE_SLOT_COUNT)
        .map(|i| texture(&format!("t{i}")))
        .collect();

    renderer.begin_scene_2d(&Mat4::one()).unwrap();
    for texture in &textures[..TEXTURE_SLOT_COUNT - 1] {
        renderer
            .submit_quad_2d(&Mat4::one(), &QuadSpec::textured(Rc::clone(texture)))
            .unwrap();
    }
    // The quad that took the last slot is drawn with its batch.
    let draws = renderer.backend().draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].textures.len(), TEXTURE_SLOT_COUNT);
    assert_eq!(draws[0].quad_count(), TEXTURE_SLOT_COUNT - 1);
    assert_eq!(renderer.texture_count_2d(), 1);

    let last = &textures[TEXTURE_SLOT_COUNT - 1];
    renderer
        .submit_quad_2d(&Mat4::one(), &QuadSpec::textured(Rc::clone(last)))
        .unwrap();
    renderer.submit_quad_2d(&Mat4::one(), &QuadSpec::default()).unwrap();
    renderer.end_scene_2d().unwrap();

    let second = &renderer.backend().draws()[1];
    assert_eq!(second.textures, vec!["blank", "t15"]);
    assert_eq!(second.vertices[0].tex_index, 1.0);
    assert_eq!(second.vertices[4].tex_index, 0.0);
    assert_eq!(renderer.batch_count_2d(), 2);
}

#[test]
fn submitting_outside_a_scene_is_rejected() {
    let mut renderer = renderer();
    let err = renderer.submit_quad_2d(&Mat4::one(), &QuadSpec::default());
    assert!(matches!(err, Err(RenderError::SceneNotStarted)));
    assert!(matches!(renderer.end_scene_2d(), Err(RenderError::SceneNotStarted)));
    assert!(matches!(renderer.flush_scene_2d(true), Err(RenderError::SceneNotStarted)));
    assert_eq!(renderer.vertex_count_2d(), 0);
    assert!(renderer.backend().draws().is_empty());
}

#[test]
fn beginning_twice_keeps_the_running_scene() {
    let mut renderer = renderer();
    renderer.begin_scene_2d(&Mat4::one()).unwrap();
    submit_plain(&mut renderer, 2);

    let err = renderer.begin_scene_2d(&Mat4::one());
    assert!(matches!(err, Err(RenderError::SceneAlreadyStarted)));
    assert!(renderer.is_scene_started());
    assert_eq!(renderer.vertex_count_2d(), 8);

    renderer.end_scene_2d().unwrap();
    assert_eq!(renderer.backend().draws()[0].quad_count(), 2);
}

#[test]
fn beginning_without_a_shader_is_rejected() {
    init_logger();
    let mut renderer = Renderer::new(RecordingBackend::default()).unwrap();
    let err = renderer.begin_scene_2d(&Mat4::one());
    assert!(matches!(err, Err(RenderError::NoQuadShader)));
    assert!(!renderer.is_scene_started());
}

#[test]
fn invalid_shader_mid_scene_changes_nothing() {
    let mut renderer = renderer();
    renderer.begin_scene_2d(&Mat4::one()).unwrap();
    submit_plain(&mut renderer, 1);

    let err = renderer.use_quad_shader_2d(Rc::new(RecordingShader::invalid("broken")));
    assert!(matches!(err, Err(RenderError::InvalidShader)));
    assert!(renderer.backend().draws().is_empty());
    assert_eq!(renderer.vertex_count_2d(), 4);
    assert_eq!(renderer.quad_shader().unwrap().label(), "quad");
}

#[test]
fn shader_without_texture_uniforms_is_still_usable() {
    let mut renderer = renderer();
    let bare = Rc::new(RecordingShader::with_uniforms(
        "bare",
        ["u_view_projection".to_owned()],
    ));
    renderer.use_quad_shader_2d(bare).unwrap();
    renderer.begin_scene_2d(&Mat4::one()).unwrap();
    submit_plain(&mut renderer, 1);
    renderer.end_scene_2d().unwrap();
    assert_eq!(renderer.backend().draws()[0].shader, "bare");
}

#[test]
fn empty_scene_issues_no_draw() {
    let mut renderer = renderer();
    renderer.begin_scene_2d(&Mat4::one()).unwrap();
    renderer.end_scene_2d().unwrap();
    assert!(renderer.backend().draws().is_empty());
    assert_eq!(renderer.batch_count_2d(), 1);
}

#[test]
fn remainder_of_a_scene_lands_in_a_final_batch() {
    let mut renderer = renderer();
    renderer.begin_scene_2d(&Mat4::one()).unwrap();
    submit_plain(&mut renderer, QUADS_PER_BATCH + 10);
    renderer.end_scene_2d().unwrap();
    assert_eq!(renderer.backend().draws().len(), 2);
    assert_eq!(renderer.backend().draws()[1].quad_count(), 10);
}
