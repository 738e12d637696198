#![allow(dead_code)]

use std::rc::Rc;

use dg_engine::{
    Renderer,
    graphics::{
        FrameBufferSpecification,
        recording::{RecordingBackend, RecordingFrameBuffer, RecordingShader, RecordingTexture},
    },
};

pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Recording renderer with the quad shader already assigned.
pub(crate) fn recording_renderer() -> Renderer<RecordingBackend> {
    init_logger();
    let mut renderer = Renderer::new(RecordingBackend::default()).unwrap();
    renderer
        .use_quad_shader_2d(Rc::new(RecordingShader::quad("quad")))
        .unwrap();
    renderer
}

pub(crate) fn recording_target(
    renderer: &mut Renderer<RecordingBackend>,
    label: &str,
    width: u32,
    height: u32,
) -> Rc<RecordingFrameBuffer> {
    let spec = FrameBufferSpecification {
        width,
        height,
        ..Default::default()
    };
    Rc::new(renderer.backend_mut().create_frame_buffer(label, &spec))
}

pub(crate) fn texture(label: &str) -> Rc<RecordingTexture> {
    Rc::new(RecordingTexture::new(label, 4, 4))
}

#[cfg(feature = "integration-tests")]
pub(crate) mod gpu {
    use std::rc::Rc;

    use dg_engine::{
        Renderer,
        gpu::{Context, ContextSettings, WgpuBackend, WgpuFrameBuffer},
        graphics::FrameBufferSpecification,
    };

    /// Headless wgpu renderer drawing into a fresh frame buffer of the given size.
    pub(crate) fn gpu_renderer(
        width: u32,
        height: u32,
    ) -> anyhow::Result<(Renderer<WgpuBackend>, Rc<WgpuFrameBuffer>)> {
        super::init_logger();
        let ctx = Context::headless_blocking(&ContextSettings::default())?;
        let backend = WgpuBackend::new(ctx);
        let spec = FrameBufferSpecification {
            width,
            height,
            ..Default::default()
        };
        let frame_buffer = Rc::new(backend.create_frame_buffer("golden", &spec)?);
        let shader = Rc::new(backend.create_quad_shader(&spec));

        let mut renderer = Renderer::new(backend)?;
        renderer.use_quad_shader_2d(shader)?;
        renderer.use_frame_buffer_2d(Some(Rc::clone(&frame_buffer)))?;
        Ok((renderer, frame_buffer))
    }
}
