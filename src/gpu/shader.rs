//! WGSL shader programs and their render pipelines.
//!
//! A [`WgpuShader`] owns one render pipeline plus a uniform buffer at
//! `@group(0) @binding(0)`. Named uniforms map onto fields of that buffer,
//! laid out with the WGSL uniform alignment rules. Textures are bound through
//! `@group(1)`: slot `i` uses binding `2i` for its texture and `2i + 1` for
//! its sampler.

use std::{collections::HashMap, rc::Rc};

use anyhow::bail;

use crate::{
    gpu::{context::Context, frame_buffer, texture::WgpuTexture},
    graphics::{AttachmentFormat, AttributeType, Shader, VertexAttribute, VertexLayout},
    math::{Mat4, Vec4},
    renderer::{QuadVertex2D, TEXTURE_SLOT_COUNT, VIEW_PROJECTION_UNIFORM},
};

const QUAD_SHADER_SOURCE: &str = include_str!("quad.wgsl");

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformKind {
    Integer,
    Float,
    Vector4,
    Matrix4,
}

impl UniformKind {
    fn size(self) -> u64 {
        match self {
            UniformKind::Integer | UniformKind::Float => 4,
            UniformKind::Vector4 => 16,
            UniformKind::Matrix4 => 64,
        }
    }

    fn align(self) -> u64 {
        match self {
            UniformKind::Integer | UniformKind::Float => 4,
            UniformKind::Vector4 | UniformKind::Matrix4 => 16,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct UniformSlot {
    offset: u64,
    kind: UniformKind,
}

/// Everything needed to build a shader program.
pub struct ShaderDescriptor<'a> {
    pub label: &'a str,
    /// WGSL with `vs_main` and `fs_main` entry points.
    pub source: &'a str,
    pub vertex_layout: &'a VertexLayout,
    /// Members of the uniform struct, in declaration order.
    pub uniforms: &'a [(&'a str, UniformKind)],
    /// Attachments of the frame buffers the shader renders into.
    pub attachments: &'a [AttachmentFormat],
}

pub struct WgpuShader {
    label: String,
    valid: bool,
    ctx: Rc<Context>,
    uniforms: HashMap<String, UniformSlot>,
    uniform_buffer: wgpu::Buffer,
    pub(crate) uniform_bind_group: wgpu::BindGroup,
    pub(crate) texture_layout: wgpu::BindGroupLayout,
    pub(crate) pipeline: wgpu::RenderPipeline,
    pub(crate) color_formats: Vec<AttachmentFormat>,
    pub(crate) vertex_stride: u64,
}

impl WgpuShader {
    /// The built-in quad program for the default frame buffer attachments.
    pub fn quad(ctx: Rc<Context>, attachments: &[AttachmentFormat]) -> Self {
        Self::new(
            ctx,
            &ShaderDescriptor {
                label: "quad shader",
                source: QUAD_SHADER_SOURCE,
                vertex_layout: &QuadVertex2D::layout(),
                uniforms: &[(VIEW_PROJECTION_UNIFORM, UniformKind::Matrix4)],
                attachments,
            },
        )
    }

    /// Compiles `desc.source` and builds its pipeline.
    ///
    /// Compilation and validation errors do not fail construction; they are
    /// logged and leave the shader invalid, see [`Shader::is_valid`].
    pub fn new(ctx: Rc<Context>, desc: &ShaderDescriptor<'_>) -> Self {
        let device = &ctx.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let (uniforms, uniform_size) = layout_uniforms(desc.uniforms);
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(desc.label),
            size: uniform_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform_bind_group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });
        let texture_layout = texture_slots_layout(device);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(desc.label),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let (attributes, mut valid) = match vertex_attributes(desc.vertex_layout) {
            Ok(attributes) => (attributes, true),
            Err(err) => {
                log::error!("shader {}: {err}", desc.label);
                (Vec::new(), false)
            }
        };
        let vertex_buffer = wgpu::VertexBufferLayout {
            array_stride: desc.vertex_layout.stride(),
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &attributes,
        };

        let color_formats: Vec<AttachmentFormat> = desc
            .attachments
            .iter()
            .copied()
            .filter(|format| !format.is_depth())
            .collect();
        let targets: Vec<Option<wgpu::ColorTargetState>> = color_formats
            .iter()
            .map(|&format| Some(color_target(format)))
            .collect();
        let depth_format = desc
            .attachments
            .iter()
            .copied()
            .find(|format| format.is_depth())
            .map(frame_buffer::texture_format);

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(desc.label),
            source: wgpu::ShaderSource::Wgsl(desc.source.into()),
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            cache: None,
            label: Some(desc.label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                buffers: &[vertex_buffer],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                targets: &targets,
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // Negative scales flip quads; both faces are drawn.
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: depth_format.map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: true,
                // Equal depth keeps submission order.
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        if let Some(err) = futures::executor::block_on(device.pop_error_scope()) {
            log::error!("shader {} failed to build: {err}", desc.label);
            valid = false;
        } else if valid {
            log::debug!("built shader {}", desc.label);
        }

        Self {
            label: desc.label.to_owned(),
            valid,
            ctx,
            uniforms,
            uniform_buffer,
            uniform_bind_group,
            texture_layout,
            pipeline,
            color_formats,
            vertex_stride: desc.vertex_layout.stride(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Bind group for the textures of one draw. Slots past the end of
    /// `textures` repeat the first texture.
    pub(crate) fn texture_bind_group(&self, textures: &[&WgpuTexture]) -> anyhow::Result<wgpu::BindGroup> {
        let Some(&first) = textures.first() else {
            bail!("a draw needs at least the blank texture");
        };
        let bound: Vec<&WgpuTexture> = (0..TEXTURE_SLOT_COUNT)
            .map(|slot| textures.get(slot).copied().unwrap_or(first))
            .collect();
        let entries: Vec<wgpu::BindGroupEntry> = bound
            .iter()
            .enumerate()
            .flat_map(|(slot, texture)| {
                [
                    wgpu::BindGroupEntry {
                        binding: 2 * slot as u32,
                        resource: wgpu::BindingResource::TextureView(&texture.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2 * slot as u32 + 1,
                        resource: wgpu::BindingResource::Sampler(&texture.sampler),
                    },
                ]
            })
            .collect();
        Ok(self.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("texture_slots_bind_group"),
            layout: &self.texture_layout,
            entries: &entries,
        }))
    }

    fn write(&self, name: &str, kind: UniformKind, bytes: &[u8]) -> bool {
        let Some(slot) = self.uniforms.get(name) else {
            return false;
        };
        if slot.kind != kind {
            log::warn!(
                "shader {}: uniform {name} is {:?}, not {kind:?}",
                self.label,
                slot.kind
            );
            return false;
        }
        self.ctx
            .queue
            .write_buffer(&self.uniform_buffer, slot.offset, bytes);
        true
    }
}

impl Shader for WgpuShader {
    fn is_valid(&self) -> bool {
        self.valid
    }

    fn set_integer(&self, name: &str, value: i32) -> bool {
        self.write(name, UniformKind::Integer, bytemuck::bytes_of(&value))
    }

    fn set_float(&self, name: &str, value: f32) -> bool {
        self.write(name, UniformKind::Float, bytemuck::bytes_of(&value))
    }

    fn set_vector4(&self, name: &str, value: &Vec4) -> bool {
        let value: [f32; 4] = (*value).into();
        self.write(name, UniformKind::Vector4, bytemuck::cast_slice(&value))
    }

    fn set_matrix4(&self, name: &str, value: &Mat4) -> bool {
        let value: [[f32; 4]; 4] = (*value).into();
        self.write(name, UniformKind::Matrix4, bytemuck::cast_slice(&value))
    }
}

/// Offsets of each uniform and the padded size of the whole struct.
fn layout_uniforms(uniforms: &[(&str, UniformKind)]) -> (HashMap<String, UniformSlot>, u64) {
    let mut offset = 0u64;
    let slots = uniforms
        .iter()
        .map(|&(name, kind)| {
            offset = offset.next_multiple_of(kind.align());
            let slot = UniformSlot { offset, kind };
            offset += kind.size();
            (name.to_owned(), slot)
        })
        .collect();
    (slots, offset.next_multiple_of(16).max(16))
}

fn vertex_format(attribute: &VertexAttribute) -> anyhow::Result<wgpu::VertexFormat> {
    use wgpu::VertexFormat as F;
    Ok(match (attribute.ty, attribute.count) {
        (AttributeType::Float32, 1) => F::Float32,
        (AttributeType::Float32, 2) => F::Float32x2,
        (AttributeType::Float32, 3) => F::Float32x3,
        (AttributeType::Float32, 4) => F::Float32x4,
        (AttributeType::Int32, 1) => F::Sint32,
        (AttributeType::Int32, 2) => F::Sint32x2,
        (AttributeType::Int32, 3) => F::Sint32x3,
        (AttributeType::Int32, 4) => F::Sint32x4,
        (AttributeType::Uint32, 1) => F::Uint32,
        (AttributeType::Uint32, 2) => F::Uint32x2,
        (AttributeType::Uint32, 3) => F::Uint32x3,
        (AttributeType::Uint32, 4) => F::Uint32x4,
        (ty, count) => bail!(
            "vertex attribute {} has unsupported shape {count} x {ty:?}",
            attribute.name
        ),
    })
}

fn vertex_attributes(layout: &VertexLayout) -> anyhow::Result<Vec<wgpu::VertexAttribute>> {
    layout
        .attributes()
        .iter()
        .enumerate()
        .map(|(location, attribute)| {
            Ok(wgpu::VertexAttribute {
                offset: attribute.offset,
                shader_location: location as u32,
                format: vertex_format(attribute)?,
            })
        })
        .collect()
}

fn color_target(format: AttachmentFormat) -> wgpu::ColorTargetState {
    let blend = match format {
        AttachmentFormat::Rgba8 => Some(wgpu::BlendState::ALPHA_BLENDING),
        // Integer targets cannot blend.
        _ => None,
    };
    wgpu::ColorTargetState {
        format: frame_buffer::texture_format(format),
        blend,
        write_mask: wgpu::ColorWrites::ALL,
    }
}

fn texture_slots_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let entries: Vec<wgpu::BindGroupLayoutEntry> = (0..TEXTURE_SLOT_COUNT as u32)
        .flat_map(|slot| {
            [
                wgpu::BindGroupLayoutEntry {
                    binding: 2 * slot,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2 * slot + 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ]
        })
        .collect();
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("texture_slots_bind_group_layout"),
        entries: &entries,
    })
}
