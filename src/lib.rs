//! dg-engine
//!
//! A small game-engine framework built around a batched 2D quad renderer.
//! Quads submitted during a scene are accumulated into large vertex batches
//! and drawn with as few indexed draw calls as the batch capacity and texture
//! slots allow. The renderer is written against collaborator traits so the
//! same batching logic drives a wgpu device or a CPU recording backend.
//!
//! High-level modules
//! - `math`: cgmath aliases, transform and projection helpers, colors
//! - `graphics`: collaborator traits (shader, texture, frame buffer, vertex array, backend)
//! - `renderer`: the batched 2D renderer and its batch state
//! - `camera`: orthographic and perspective cameras
//! - `scene`: a minimal entity/component scene drawn through the renderer
//! - `gpu`: the wgpu backend
//! - `error`: the renderer error type
//!

pub mod camera;
pub mod error;
pub mod gpu;
pub mod graphics;
pub mod math;
pub mod renderer;
pub mod scene;

// Re-exports commonly used types for convenience in downstream code.
pub use camera::{Camera, CameraFrustum, ProjectionType};
pub use error::{RenderError, Result};
pub use renderer::{QuadSpec, QuadSpecFor, QuadVertex2D, Renderer};
pub use scene::{Entity, QuadComponent, Scene, TagComponent, TransformComponent};
