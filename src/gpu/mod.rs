//! wgpu implementation of the graphics collaborators.
//!
//! [`WgpuBackend`] renders into [`WgpuFrameBuffer`]s only; there is no
//! implicit window target. Every draw is recorded into its own render pass
//! that loads the existing target contents and is submitted immediately, so
//! batches land on the target in flush order.

pub mod context;
pub mod frame_buffer;
pub mod shader;
pub mod texture;
pub mod vertex_array;

use std::{iter, rc::Rc};

use anyhow::{Context as _, bail};

pub use context::{Context, ContextSettings};
pub use frame_buffer::WgpuFrameBuffer;
pub use shader::{ShaderDescriptor, UniformKind, WgpuShader};
pub use texture::WgpuTexture;
pub use vertex_array::WgpuVertexArray;

use crate::graphics::{
    DrawCall, FrameBufferSpecification, GraphicsBackend, TextureSpecification, VertexLayout,
};

pub struct WgpuBackend {
    ctx: Rc<Context>,
}

impl WgpuBackend {
    pub fn new(ctx: Context) -> Self {
        Self { ctx: Rc::new(ctx) }
    }

    pub fn context(&self) -> &Rc<Context> {
        &self.ctx
    }

    pub fn create_frame_buffer(
        &self,
        label: &str,
        spec: &FrameBufferSpecification,
    ) -> anyhow::Result<WgpuFrameBuffer> {
        WgpuFrameBuffer::new(Rc::clone(&self.ctx), label, spec)
    }

    /// The built-in quad shader, targeting frame buffers laid out like `spec`.
    pub fn create_quad_shader(&self, spec: &FrameBufferSpecification) -> WgpuShader {
        WgpuShader::quad(Rc::clone(&self.ctx), &spec.attachments)
    }

    pub fn create_shader(&self, desc: &ShaderDescriptor<'_>) -> WgpuShader {
        WgpuShader::new(Rc::clone(&self.ctx), desc)
    }

    /// Decodes an image file and uploads it with the sampling modes of `spec`.
    pub fn load_texture(
        &self,
        label: &str,
        bytes: &[u8],
        spec: &TextureSpecification,
    ) -> anyhow::Result<WgpuTexture> {
        WgpuTexture::from_bytes(&self.ctx, label, bytes, spec)
    }
}

impl GraphicsBackend for WgpuBackend {
    type Shader = WgpuShader;
    type Texture = WgpuTexture;
    type FrameBuffer = WgpuFrameBuffer;
    type VertexArray = WgpuVertexArray;

    fn create_texture(
        &mut self,
        label: &str,
        spec: &TextureSpecification,
        pixels: &[u8],
    ) -> anyhow::Result<Self::Texture> {
        WgpuTexture::from_pixels(&self.ctx, label, spec, pixels)
    }

    fn create_vertex_array(
        &mut self,
        layout: &VertexLayout,
        vertex_capacity: usize,
        indices: &[u32],
    ) -> anyhow::Result<Self::VertexArray> {
        Ok(WgpuVertexArray::new(
            Rc::clone(&self.ctx),
            layout,
            vertex_capacity,
            indices,
        ))
    }

    fn draw_indexed(&mut self, call: DrawCall<'_, Self>) -> anyhow::Result<()> {
        let target = call
            .target
            .context("no frame buffer assigned, the wgpu backend has no default target")?;
        let shader = call.shader;
        let vertex_array = call.vertex_array;

        if shader.vertex_stride != vertex_array.stride {
            bail!(
                "shader {} expects {} byte vertices, the vertex array holds {} byte vertices",
                shader.label(),
                shader.vertex_stride,
                vertex_array.stride
            );
        }
        let target_formats = target.color_formats();
        if shader.color_formats != target_formats {
            bail!(
                "shader {} renders to {:?}, frame buffer {} has {:?}",
                shader.label(),
                shader.color_formats,
                target.label(),
                target_formats
            );
        }

        let textures: Vec<&WgpuTexture> = call.textures.iter().flatten().map(Rc::as_ref).collect();
        let texture_bind_group = shader.texture_bind_group(&textures)?;
        let index_count = u32::try_from(call.index_count)?;
        let vertex_bytes = call.vertex_count as u64 * vertex_array.stride;

        let attachments = target.attachments();
        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = attachments
            .colors
            .iter()
            .map(|attachment| {
                Some(wgpu::RenderPassColorAttachment {
                    view: &attachment.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect();

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Quad Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Quad Pass"),
                color_attachments: &color_attachments,
                depth_stencil_attachment: attachments.depth.as_ref().map(|depth| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view: &depth.view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_pipeline(&shader.pipeline);
            render_pass.set_bind_group(0, &shader.uniform_bind_group, &[]);
            render_pass.set_bind_group(1, &texture_bind_group, &[]);
            render_pass.set_vertex_buffer(0, vertex_array.vertex_buffer.slice(..vertex_bytes));
            render_pass.set_index_buffer(vertex_array.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..index_count, 0, 0..1);
        }
        self.ctx.queue.submit(iter::once(encoder.finish()));
        Ok(())
    }
}
