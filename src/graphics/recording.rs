//! CPU backend that records draws instead of rasterizing them.
//!
//! Every indexed draw is captured as a [`RecordedDraw`] holding the decoded
//! vertices, the index range, the bound texture labels and the shader and
//! target it went to. Frame buffers keep an entity-id grid on the CPU; a draw
//! into one writes each quad's id over the pixels of its screen-space bounding
//! box, which is exact for axis-aligned quads.
//!
//! Used by the unit and integration tests and by the `quad_stats` binary.

use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, HashSet},
};

use anyhow::{Context, bail};
use cgmath::{One, Vector4};

use crate::{
    gpu::frame_buffer::MAX_FRAME_BUFFER_SIZE,
    graphics::{
        DrawCall, FrameBuffer, FrameBufferSpecification, GraphicsBackend, Shader, Texture,
        TextureSpecification, VertexArray, VertexLayout,
    },
    math::{self, Mat4, Vec4},
    renderer::{QuadVertex2D, TEXTURE_SLOT_COUNT, TEXTURES_UNIFORM, VIEW_PROJECTION_UNIFORM},
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Integer(i32),
    Float(f32),
    Vector4(Vec4),
    Matrix4(Mat4),
}

/// A shader that stores the uniforms it is given.
#[derive(Debug)]
pub struct RecordingShader {
    label: String,
    valid: bool,
    declared: HashSet<String>,
    values: RefCell<HashMap<String, UniformValue>>,
}

impl RecordingShader {
    pub fn with_uniforms(label: &str, uniforms: impl IntoIterator<Item = String>) -> Self {
        Self {
            label: label.to_owned(),
            valid: true,
            declared: uniforms.into_iter().collect(),
            values: RefCell::new(HashMap::new()),
        }
    }

    /// A shader declaring the camera uniform and one sampler per texture slot.
    pub fn quad(label: &str) -> Self {
        let samplers = (0..TEXTURE_SLOT_COUNT).map(|slot| format!("{TEXTURES_UNIFORM}[{slot}]"));
        Self::with_uniforms(
            label,
            std::iter::once(VIEW_PROJECTION_UNIFORM.to_owned()).chain(samplers),
        )
    }

    /// A shader that failed to build.
    pub fn invalid(label: &str) -> Self {
        Self {
            valid: false,
            ..Self::with_uniforms(label, std::iter::empty())
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.values.borrow().get(name).copied()
    }

    pub fn integer(&self, name: &str) -> Option<i32> {
        match self.uniform(name)? {
            UniformValue::Integer(value) => Some(value),
            _ => None,
        }
    }

    pub fn float(&self, name: &str) -> Option<f32> {
        match self.uniform(name)? {
            UniformValue::Float(value) => Some(value),
            _ => None,
        }
    }

    pub fn vector4(&self, name: &str) -> Option<Vec4> {
        match self.uniform(name)? {
            UniformValue::Vector4(value) => Some(value),
            _ => None,
        }
    }

    pub fn matrix4(&self, name: &str) -> Option<Mat4> {
        match self.uniform(name)? {
            UniformValue::Matrix4(value) => Some(value),
            _ => None,
        }
    }

    fn set(&self, name: &str, value: UniformValue) -> bool {
        if !self.declared.contains(name) {
            return false;
        }
        self.values.borrow_mut().insert(name.to_owned(), value);
        true
    }
}

impl Shader for RecordingShader {
    fn is_valid(&self) -> bool {
        self.valid
    }

    fn set_integer(&self, name: &str, value: i32) -> bool {
        self.set(name, UniformValue::Integer(value))
    }

    fn set_float(&self, name: &str, value: f32) -> bool {
        self.set(name, UniformValue::Float(value))
    }

    fn set_vector4(&self, name: &str, value: &Vec4) -> bool {
        self.set(name, UniformValue::Vector4(*value))
    }

    fn set_matrix4(&self, name: &str, value: &Mat4) -> bool {
        self.set(name, UniformValue::Matrix4(*value))
    }
}

#[derive(Debug)]
pub struct RecordingTexture {
    label: String,
    width: u32,
    height: u32,
}

impl RecordingTexture {
    pub fn new(label: &str, width: u32, height: u32) -> Self {
        Self {
            label: label.to_owned(),
            width,
            height,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Texture for RecordingTexture {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Render target with a CPU entity-id attachment.
#[derive(Debug)]
pub struct RecordingFrameBuffer {
    label: String,
    size: Cell<(u32, u32)>,
    clear_color: Cell<Vec4>,
    entity_ids: RefCell<Vec<i32>>,
}

impl RecordingFrameBuffer {
    /// Sizes outside `1..=MAX_FRAME_BUFFER_SIZE` are clamped into it.
    pub fn new(label: &str, spec: &FrameBufferSpecification) -> Self {
        let width = spec.width.clamp(1, MAX_FRAME_BUFFER_SIZE);
        let height = spec.height.clamp(1, MAX_FRAME_BUFFER_SIZE);
        if (width, height) != (spec.width, spec.height) {
            log::warn!(
                "frame buffer {label} size {}x{} clamped to {width}x{height}",
                spec.width,
                spec.height
            );
        }
        Self {
            label: label.to_owned(),
            size: Cell::new((width, height)),
            clear_color: Cell::new(Vec4::new(0.0, 0.0, 0.0, 0.0)),
            entity_ids: RefCell::new(vec![-1; width as usize * height as usize]),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn clear_color(&self) -> Vec4 {
        self.clear_color.get()
    }

    /// Writes `entity_id` over every pixel whose centre lies inside the
    /// normalized-device-coordinate rectangle `min..max`.
    fn fill_ndc_rect(&self, min: [f32; 2], max: [f32; 2], entity_id: i32) {
        let (width, height) = self.size.get();
        let (w, h) = (width as f32, height as f32);
        // Pixel centres sit at half-integer offsets; row 0 is the top.
        let columns = pixel_span((min[0] + 1.0) * w / 2.0, (max[0] + 1.0) * w / 2.0, width);
        let rows = pixel_span((1.0 - max[1]) * h / 2.0, (1.0 - min[1]) * h / 2.0, height);
        let (Some(columns), Some(rows)) = (columns, rows) else {
            return;
        };
        let mut ids = self.entity_ids.borrow_mut();
        for y in rows {
            let row = y as usize * width as usize;
            ids[row + columns.start as usize..row + columns.end as usize].fill(entity_id);
        }
    }
}

/// Pixels whose centres lie in `from..=to`, measured in pixels.
fn pixel_span(from: f32, to: f32, limit: u32) -> Option<std::ops::Range<u32>> {
    let start = (from - 0.5).ceil().max(0.0);
    let end = ((to - 0.5).floor() + 1.0).min(limit as f32);
    (start < end).then(|| start as u32..end as u32)
}

impl FrameBuffer for RecordingFrameBuffer {
    fn size(&self) -> (u32, u32) {
        self.size.get()
    }

    fn set_size(&self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 || self.size.get() == (width, height) {
            return false;
        }
        if width > MAX_FRAME_BUFFER_SIZE || height > MAX_FRAME_BUFFER_SIZE {
            log::warn!(
                "frame buffer {} not resized: {width}x{height} exceeds {MAX_FRAME_BUFFER_SIZE}",
                self.label
            );
            return false;
        }
        self.size.set((width, height));
        *self.entity_ids.borrow_mut() = vec![-1; width as usize * height as usize];
        true
    }

    fn clear(&self, color: &Vec4) -> anyhow::Result<()> {
        self.clear_color.set(*color);
        self.entity_ids.borrow_mut().fill(-1);
        Ok(())
    }

    fn read_entity_id(&self, x: u32, y: u32) -> anyhow::Result<i32> {
        let (width, height) = self.size.get();
        if x >= width || y >= height {
            bail!("pixel ({x}, {y}) is outside the {width}x{height} frame buffer");
        }
        Ok(self.entity_ids.borrow()[y as usize * width as usize + x as usize])
    }
}

#[derive(Debug)]
pub struct RecordingVertexArray {
    stride: u64,
    vertex_bytes: Vec<u8>,
    indices: Vec<u32>,
    uploads: usize,
}

impl RecordingVertexArray {
    /// Number of `upload` calls received so far.
    pub fn upload_count(&self) -> usize {
        self.uploads
    }
}

impl VertexArray for RecordingVertexArray {
    fn upload(&mut self, byte_offset: u64, bytes: &[u8]) -> anyhow::Result<()> {
        let start = byte_offset as usize;
        let end = start + bytes.len();
        if end > self.vertex_bytes.len() {
            bail!(
                "upload of {} bytes at offset {byte_offset} overruns the {} byte vertex buffer",
                bytes.len(),
                self.vertex_bytes.len()
            );
        }
        self.vertex_bytes[start..end].copy_from_slice(bytes);
        self.uploads += 1;
        Ok(())
    }

    fn vertex_byte_capacity(&self) -> u64 {
        self.vertex_bytes.len() as u64
    }

    fn index_count(&self) -> usize {
        self.indices.len()
    }
}

/// One captured indexed draw.
#[derive(Clone, Debug)]
pub struct RecordedDraw {
    pub shader: String,
    /// Bound texture labels in texture-unit order.
    pub textures: Vec<String>,
    /// Frame buffer label, `None` for the default target.
    pub target: Option<String>,
    pub vertices: Vec<QuadVertex2D>,
    pub indices: Vec<u32>,
    pub camera_product: Option<Mat4>,
}

impl RecordedDraw {
    pub fn quad_count(&self) -> usize {
        self.vertices.len() / 4
    }
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    draws: Vec<RecordedDraw>,
    textures_created: usize,
}

impl RecordingBackend {
    pub fn draws(&self) -> &[RecordedDraw] {
        &self.draws
    }

    pub fn take_draws(&mut self) -> Vec<RecordedDraw> {
        std::mem::take(&mut self.draws)
    }

    pub fn textures_created(&self) -> usize {
        self.textures_created
    }

    pub fn create_frame_buffer(
        &mut self,
        label: &str,
        spec: &FrameBufferSpecification,
    ) -> RecordingFrameBuffer {
        RecordingFrameBuffer::new(label, spec)
    }
}

impl GraphicsBackend for RecordingBackend {
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
        if pixels.len() != spec.byte_len() {
            bail!(
                "texture {label} expects {} bytes of pixels, got {}",
                spec.byte_len(),
                pixels.len()
            );
        }
        self.textures_created += 1;
        Ok(RecordingTexture::new(label, spec.width, spec.height))
    }

    fn create_vertex_array(
        &mut self,
        layout: &VertexLayout,
        vertex_capacity: usize,
        indices: &[u32],
    ) -> anyhow::Result<Self::VertexArray> {
        Ok(RecordingVertexArray {
            stride: layout.stride(),
            vertex_bytes: vec![0; layout.stride() as usize * vertex_capacity],
            indices: indices.to_vec(),
            uploads: 0,
        })
    }

    fn draw_indexed(&mut self, call: DrawCall<'_, Self>) -> anyhow::Result<()> {
        let vertex_array = call.vertex_array;
        if vertex_array.stride as usize != std::mem::size_of::<QuadVertex2D>() {
            bail!("recording backend only decodes quad vertices");
        }
        let byte_len = call.vertex_count * vertex_array.stride as usize;
        let bytes = vertex_array
            .vertex_bytes
            .get(..byte_len)
            .context("draw reads past the vertex buffer")?;
        let vertices: Vec<QuadVertex2D> = bytemuck::pod_collect_to_vec(bytes);
        let indices = vertex_array
            .indices
            .get(..call.index_count)
            .context("draw reads past the index buffer")?
            .to_vec();

        let camera_product = call.shader.matrix4(VIEW_PROJECTION_UNIFORM);
        if let Some(target) = call.target {
            let camera = camera_product.unwrap_or_else(Mat4::one);
            for quad in vertices.chunks_exact(4) {
                rasterize_entity_id(target, &camera, quad);
            }
        }

        self.draws.push(RecordedDraw {
            shader: call.shader.label.clone(),
            textures: call
                .textures
                .iter()
                .map(|t| t.as_ref().map_or_else(String::new, |t| t.label.clone()))
                .collect(),
            target: call.target.map(|t| t.label.clone()),
            vertices,
            indices,
            camera_product,
        });
        Ok(())
    }
}

fn rasterize_entity_id(target: &RecordingFrameBuffer, camera: &Mat4, quad: &[QuadVertex2D]) {
    let mut min = [f32::INFINITY; 2];
    let mut max = [f32::NEG_INFINITY; 2];
    for vertex in quad {
        let [x, y, z] = vertex.position;
        let Some(ndc) = math::dehomogenize(camera * Vector4::new(x, y, z, 1.0)) else {
            return;
        };
        min = [min[0].min(ndc.x), min[1].min(ndc.y)];
        max = [max[0].max(ndc.x), max[1].max(ndc.y)];
    }
    target.fill_ndc_rect(min, max, quad[0].entity_id as i32);
}
