use std::rc::Rc;

use anyhow::bail;
use wgpu::util::DeviceExt;

use crate::{
    gpu::context::Context,
    graphics::{VertexArray, VertexLayout},
};

/// A rewritable vertex buffer and the immutable index buffer drawn from it.
pub struct WgpuVertexArray {
    ctx: Rc<Context>,
    pub(crate) vertex_buffer: wgpu::Buffer,
    pub(crate) index_buffer: wgpu::Buffer,
    pub(crate) stride: u64,
    index_count: usize,
}

impl WgpuVertexArray {
    pub fn new(
        ctx: Rc<Context>,
        layout: &VertexLayout,
        vertex_capacity: usize,
        indices: &[u32],
    ) -> Self {
        let vertex_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Vertex Buffer"),
            size: layout.stride() * vertex_capacity as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let index_buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Index Buffer"),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        Self {
            ctx,
            vertex_buffer,
            index_buffer,
            stride: layout.stride(),
            index_count: indices.len(),
        }
    }
}

impl VertexArray for WgpuVertexArray {
    fn upload(&mut self, byte_offset: u64, bytes: &[u8]) -> anyhow::Result<()> {
        let end = byte_offset + bytes.len() as u64;
        if end > self.vertex_byte_capacity() {
            bail!(
                "upload of {} bytes at offset {byte_offset} overruns the {} byte vertex buffer",
                bytes.len(),
                self.vertex_byte_capacity()
            );
        }
        self.ctx
            .queue
            .write_buffer(&self.vertex_buffer, byte_offset, bytes);
        Ok(())
    }

    fn vertex_byte_capacity(&self) -> u64 {
        self.vertex_buffer.size()
    }

    fn index_count(&self) -> usize {
        self.index_count
    }
}
