//! Declarative vertex layouts.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeType {
    Float32,
    Int32,
    Uint32,
}

impl AttributeType {
    pub fn byte_size(self) -> u64 {
        match self {
            AttributeType::Float32 | AttributeType::Int32 | AttributeType::Uint32 => 4,
        }
    }
}

/// One named vertex attribute with `count` elements of `ty`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub name: &'static str,
    pub count: u32,
    pub ty: AttributeType,
    pub offset: u64,
}

impl VertexAttribute {
    pub fn byte_size(&self) -> u64 {
        self.ty.byte_size() * u64::from(self.count)
    }
}

/// Attributes in declaration order, tightly packed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VertexLayout {
    attributes: Vec<VertexAttribute>,
    stride: u64,
}

impl VertexLayout {
    pub fn new(attributes: &[(&'static str, u32, AttributeType)]) -> Self {
        let mut offset = 0;
        let attributes = attributes
            .iter()
            .map(|&(name, count, ty)| {
                let attribute = VertexAttribute {
                    name,
                    count,
                    ty,
                    offset,
                };
                offset += attribute.byte_size();
                attribute
            })
            .collect();
        Self {
            attributes,
            stride: offset,
        }
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_follow_declaration_order() {
        let layout = VertexLayout::new(&[
            ("a_position", 3, AttributeType::Float32),
            ("a_id", 1, AttributeType::Int32),
            ("a_uv", 2, AttributeType::Float32),
        ]);
        let offsets: Vec<u64> = layout.attributes().iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 16]);
        assert_eq!(layout.stride(), 24);
    }

    #[test]
    fn empty_layout_has_zero_stride() {
        let layout = VertexLayout::new(&[]);
        assert!(layout.attributes().is_empty());
        assert_eq!(layout.stride(), 0);
    }
}
