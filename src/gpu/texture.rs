//! Sampled textures bound to quad texture slots.

use std::borrow::Cow;

use anyhow::bail;
use image::GenericImageView;

use crate::{
    gpu::context::Context,
    graphics::{FilterMode, Texture, TextureSpecification, WrapMode},
};

/// A GPU texture with the view and sampler its slot binds.
#[derive(Debug)]
pub struct WgpuTexture {
    #[allow(unused)]
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    width: u32,
    height: u32,
}

impl WgpuTexture {
    /// Same encoding as the frame buffer color attachment, so texels are
    /// written out unchanged.
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

    /// Uploads tightly packed 8-bit pixels with 1 to 4 channels described by
    /// `spec`.
    pub fn from_pixels(
        ctx: &Context,
        label: &str,
        spec: &TextureSpecification,
        pixels: &[u8],
    ) -> anyhow::Result<Self> {
        if spec.width == 0 || spec.height == 0 {
            bail!("texture {label} has an empty size {}x{}", spec.width, spec.height);
        }
        if pixels.len() != spec.byte_len() {
            bail!(
                "texture {label} expects {} bytes of pixels, got {}",
                spec.byte_len(),
                pixels.len()
            );
        }
        let Some(rgba) = expand_to_rgba(spec.channels, pixels) else {
            bail!("texture {label} has unsupported channel count {}", spec.channels);
        };

        let size = wgpu::Extent3d {
            width: spec.width,
            height: spec.height,
            depth_or_array_layers: 1,
        };
        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        ctx.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            &rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * spec.width),
                rows_per_image: Some(spec.height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = create_sampler(ctx, label, spec);
        log::debug!("created texture {label} ({}x{})", spec.width, spec.height);

        Ok(Self {
            texture,
            view,
            sampler,
            width: spec.width,
            height: spec.height,
        })
    }

    /// Decodes image file contents (PNG, JPEG, BMP) and uploads them.
    ///
    /// The size and channel count of `spec` are replaced by the image's own;
    /// wrap and filter modes are kept.
    pub fn from_bytes(
        ctx: &Context,
        label: &str,
        bytes: &[u8],
        spec: &TextureSpecification,
    ) -> anyhow::Result<Self> {
        let img = image::load_from_memory(bytes)?;
        let (width, height) = img.dimensions();
        let spec = TextureSpecification {
            width,
            height,
            channels: 4,
            ..spec.clone()
        };
        Self::from_pixels(ctx, label, &spec, &img.to_rgba8())
    }
}

impl Texture for WgpuTexture {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Widens packed pixels to RGBA8. Missing color channels read as zero and a
/// missing alpha as opaque, the way single and dual channel textures sample.
fn expand_to_rgba(channels: u32, pixels: &[u8]) -> Option<Cow<'_, [u8]>> {
    let widen = |texel: &[u8]| {
        let mut rgba = [0, 0, 0, 255];
        rgba[..texel.len()].copy_from_slice(texel);
        rgba
    };
    match channels {
        4 => Some(Cow::Borrowed(pixels)),
        1..=3 => Some(Cow::Owned(
            pixels
                .chunks_exact(channels as usize)
                .flat_map(widen)
                .collect(),
        )),
        _ => None,
    }
}

fn address_mode(wrap: WrapMode) -> wgpu::AddressMode {
    match wrap {
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
    }
}

fn filter_mode(filter: FilterMode) -> wgpu::FilterMode {
    match filter {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

fn create_sampler(ctx: &Context, label: &str, spec: &TextureSpecification) -> wgpu::Sampler {
    let address = address_mode(spec.wrap);
    ctx.device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: address,
        address_mode_v: address,
        address_mode_w: address,
        mag_filter: filter_mode(spec.magnify),
        min_filter: filter_mode(spec.minify),
        ..Default::default()
    })
}
