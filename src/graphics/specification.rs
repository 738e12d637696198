//! Creation parameters for textures and frame buffers.

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WrapMode {
    #[default]
    Repeat,
    MirroredRepeat,
    ClampToEdge,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FilterMode {
    #[default]
    Nearest,
    Linear,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureSpecification {
    pub width: u32,
    pub height: u32,
    /// Color channels per pixel in the source data, 1 (R8) to 4 (RGBA8).
    /// Fewer than 4 are widened to RGBA8 with an opaque alpha.
    pub channels: u32,
    pub wrap: WrapMode,
    pub magnify: FilterMode,
    pub minify: FilterMode,
}

impl Default for TextureSpecification {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            channels: 4,
            wrap: WrapMode::default(),
            magnify: FilterMode::default(),
            minify: FilterMode::default(),
        }
    }
}

impl TextureSpecification {
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Bytes a tightly packed pixel buffer for this specification must hold.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachmentFormat {
    Rgba8,
    /// Signed integer attachment the quad shader writes entity ids into.
    R32Int,
    Depth24Stencil8,
}

impl AttachmentFormat {
    pub fn is_depth(self) -> bool {
        matches!(self, AttachmentFormat::Depth24Stencil8)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameBufferSpecification {
    pub width: u32,
    pub height: u32,
    pub attachments: Vec<AttachmentFormat>,
}

impl Default for FrameBufferSpecification {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            attachments: vec![
                AttachmentFormat::Rgba8,
                AttachmentFormat::R32Int,
                AttachmentFormat::Depth24Stencil8,
            ],
        }
    }
}

impl FrameBufferSpecification {
    pub fn color_attachments(&self) -> impl Iterator<Item = AttachmentFormat> + '_ {
        self.attachments.iter().copied().filter(|a| !a.is_depth())
    }

    pub fn depth_attachment(&self) -> Option<AttachmentFormat> {
        self.attachments.iter().copied().find(|a| a.is_depth())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_frame_buffer_splits_color_and_depth() {
        let spec = FrameBufferSpecification::default();
        let colors: Vec<_> = spec.color_attachments().collect();
        assert_eq!(colors, vec![AttachmentFormat::Rgba8, AttachmentFormat::R32Int]);
        assert_eq!(spec.depth_attachment(), Some(AttachmentFormat::Depth24Stencil8));
    }

    #[test]
    fn texture_byte_len_counts_channels() {
        let spec = TextureSpecification::with_size(4, 2);
        assert_eq!(spec.byte_len(), 32);
        assert_eq!(TextureSpecification::default().byte_len(), 4);
    }
}
