//! Offscreen render targets and pick-buffer readback.

use std::{cell::RefCell, iter, rc::Rc};

use anyhow::{Context as _, bail};

use crate::{
    gpu::context::Context,
    graphics::{AttachmentFormat, FrameBuffer, FrameBufferSpecification},
    math::Vec4,
};

/// Largest width or height a frame buffer accepts.
pub const MAX_FRAME_BUFFER_SIZE: u32 = 8192;

pub(crate) fn texture_format(format: AttachmentFormat) -> wgpu::TextureFormat {
    match format {
        AttachmentFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        AttachmentFormat::R32Int => wgpu::TextureFormat::R32Sint,
        AttachmentFormat::Depth24Stencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
    }
}

pub(crate) struct Attachment {
    pub(crate) format: AttachmentFormat,
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
}

/// Color attachments in declaration order plus an optional depth attachment.
pub(crate) struct Attachments {
    pub(crate) colors: Vec<Attachment>,
    pub(crate) depth: Option<Attachment>,
}

pub struct WgpuFrameBuffer {
    label: String,
    ctx: Rc<Context>,
    spec: RefCell<FrameBufferSpecification>,
    attachments: RefCell<Attachments>,
}

impl WgpuFrameBuffer {
    pub fn new(ctx: Rc<Context>, label: &str, spec: &FrameBufferSpecification) -> anyhow::Result<Self> {
        validate_size(spec.width, spec.height)?;
        if spec.attachments.iter().filter(|format| format.is_depth()).count() > 1 {
            bail!("frame buffer {label} declares more than one depth attachment");
        }
        let attachments = create_attachments(&ctx.device, label, spec);
        log::debug!(
            "created frame buffer {label} ({}x{}, {:?})",
            spec.width,
            spec.height,
            spec.attachments
        );
        Ok(Self {
            label: label.to_owned(),
            ctx,
            spec: RefCell::new(spec.clone()),
            attachments: RefCell::new(attachments),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn specification(&self) -> FrameBufferSpecification {
        self.spec.borrow().clone()
    }

    pub(crate) fn attachments(&self) -> std::cell::Ref<'_, Attachments> {
        self.attachments.borrow()
    }

    pub(crate) fn color_formats(&self) -> Vec<AttachmentFormat> {
        self.attachments
            .borrow()
            .colors
            .iter()
            .map(|attachment| attachment.format)
            .collect()
    }

    /// Reads the first RGBA8 attachment back into an image.
    pub fn read_pixels(&self) -> anyhow::Result<image::RgbaImage> {
        let (width, height) = self.size();
        let attachments = self.attachments.borrow();
        let attachment = attachments
            .colors
            .iter()
            .find(|attachment| attachment.format == AttachmentFormat::Rgba8)
            .with_context(|| format!("frame buffer {} has no RGBA8 attachment", self.label))?;

        let unpadded_bytes_per_row = 4 * width;
        let bytes_per_row = unpadded_bytes_per_row.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let data = self.copy_to_cpu(
            &attachment.texture,
            wgpu::Origin3d::ZERO,
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            bytes_per_row,
        )?;

        let pixels: Vec<u8> = data
            .chunks(bytes_per_row as usize)
            .flat_map(|row| &row[..unpadded_bytes_per_row as usize])
            .copied()
            .collect();
        image::RgbaImage::from_raw(width, height, pixels)
            .context("pixel readback returned a short buffer")
    }

    /// Copies a region of `texture` into a mappable buffer and waits for it.
    fn copy_to_cpu(
        &self,
        texture: &wgpu::Texture,
        origin: wgpu::Origin3d,
        extent: wgpu::Extent3d,
        bytes_per_row: u32,
    ) -> anyhow::Result<Vec<u8>> {
        let output_buffer = self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback buffer"),
            size: u64::from(bytes_per_row) * u64::from(extent.height),
            // this tells wgpu that we want to read this buffer from the cpu
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture,
                mip_level: 0,
                origin,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &output_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(extent.height),
                },
            },
            extent,
        );
        self.ctx.queue.submit(iter::once(encoder.finish()));

        futures::executor::block_on(read_buffer(&self.ctx, &output_buffer))
    }
}

impl FrameBuffer for WgpuFrameBuffer {
    fn size(&self) -> (u32, u32) {
        let spec = self.spec.borrow();
        (spec.width, spec.height)
    }

    fn set_size(&self, width: u32, height: u32) -> bool {
        if self.size() == (width, height) {
            return false;
        }
        if let Err(err) = validate_size(width, height) {
            log::warn!("frame buffer {} not resized: {err}", self.label);
            return false;
        }
        let mut spec = self.spec.borrow_mut();
        spec.width = width;
        spec.height = height;
        *self.attachments.borrow_mut() = create_attachments(&self.ctx.device, &self.label, &spec);
        log::debug!("resized frame buffer {} to {width}x{height}", self.label);
        true
    }

    fn clear(&self, color: &Vec4) -> anyhow::Result<()> {
        let attachments = self.attachments.borrow();
        let clear_color = wgpu::Color {
            r: f64::from(color.x),
            g: f64::from(color.y),
            b: f64::from(color.z),
            a: f64::from(color.w),
        };
        // The entity attachment is cleared to "no entity".
        let no_entity = wgpu::Color {
            r: -1.0,
            g: 0.0,
            b: 0.0,
            a: 0.0,
        };
        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = attachments
            .colors
            .iter()
            .map(|attachment| {
                Some(wgpu::RenderPassColorAttachment {
                    view: &attachment.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(match attachment.format {
                            AttachmentFormat::R32Int => no_entity,
                            _ => clear_color,
                        }),
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
                label: Some("Clear Encoder"),
            });
        {
            let _render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Clear Pass"),
                color_attachments: &color_attachments,
                depth_stencil_attachment: attachments.depth.as_ref().map(|depth| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view: &depth.view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(0),
                            store: wgpu::StoreOp::Store,
                        }),
                    }
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
        }
        self.ctx.queue.submit(iter::once(encoder.finish()));
        Ok(())
    }

    fn read_entity_id(&self, x: u32, y: u32) -> anyhow::Result<i32> {
        let (width, height) = self.size();
        if x >= width || y >= height {
            bail!(
                "pixel ({x}, {y}) is outside the {width}x{height} frame buffer {}",
                self.label
            );
        }
        let attachments = self.attachments.borrow();
        let attachment = attachments
            .colors
            .iter()
            .find(|attachment| attachment.format == AttachmentFormat::R32Int)
            .with_context(|| format!("frame buffer {} has no entity attachment", self.label))?;

        let data = self.copy_to_cpu(
            &attachment.texture,
            wgpu::Origin3d { x, y, z: 0 },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            wgpu::COPY_BYTES_PER_ROW_ALIGNMENT,
        )?;
        let texel: [u8; 4] = data
            .get(..4)
            .and_then(|bytes| bytes.try_into().ok())
            .context("entity readback returned a short buffer")?;
        Ok(i32::from_le_bytes(texel))
    }
}

fn validate_size(width: u32, height: u32) -> anyhow::Result<()> {
    if width == 0 || height == 0 {
        bail!("frame buffer size {width}x{height} is empty");
    }
    if width > MAX_FRAME_BUFFER_SIZE || height > MAX_FRAME_BUFFER_SIZE {
        bail!("frame buffer size {width}x{height} exceeds {MAX_FRAME_BUFFER_SIZE}");
    }
    Ok(())
}

fn create_attachments(
    device: &wgpu::Device,
    label: &str,
    spec: &FrameBufferSpecification,
) -> Attachments {
    let size = wgpu::Extent3d {
        width: spec.width,
        height: spec.height,
        depth_or_array_layers: 1,
    };
    let create = |format: AttachmentFormat| {
        let usage = if format.is_depth() {
            wgpu::TextureUsages::RENDER_ATTACHMENT
        } else {
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format(format),
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Attachment {
            format,
            texture,
            view,
        }
    };
    Attachments {
        colors: spec.color_attachments().map(&create).collect(),
        depth: spec.depth_attachment().map(&create),
    }
}

async fn read_buffer(ctx: &Context, buffer: &wgpu::Buffer) -> anyhow::Result<Vec<u8>> {
    // NOTE: the mapping has to be requested and the device polled before
    // awaiting, otherwise the future never resolves.
    let buffer_slice = buffer.slice(..);
    let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    ctx.wait_idle()?;
    rx.receive()
        .await
        .context("buffer mapping was cancelled")??;

    let data = buffer_slice.get_mapped_range().to_vec();
    buffer.unmap();
    Ok(data)
}
