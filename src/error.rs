//! Renderer errors.
//!
//! Protocol violations (wrong call order, unusable shader) are caller bugs and
//! are reported at the call that detects them without touching renderer state.
//! Backend failures are wrapped as [`RenderError::Backend`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("a 2D scene is already in progress, end it before beginning another")]
    SceneAlreadyStarted,
    #[error("no 2D scene is in progress, call begin_scene_2d first")]
    SceneNotStarted,
    #[error("no quad shader assigned, call use_quad_shader_2d before beginning a scene")]
    NoQuadShader,
    #[error("quad shader is not valid (failed to compile or link)")]
    InvalidShader,
    #[error("view matrix is singular and cannot be inverted")]
    SingularView,
    #[error("transformed quad corner has w == 0 and cannot be projected")]
    DegenerateVertex,
    #[error("graphics backend failure: {0}")]
    Backend(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RenderError>;
