//! CPU-side mesh description and layout validation.
//!
//! Everything here runs before a single GPU buffer is allocated: a mesh that
//! reaches the uploader is guaranteed to have whole vertices, whole
//! triangles, and indices that stay inside the vertex buffer. A mismatched
//! stride or offset would otherwise render garbage without any driver error.

use crate::error::LayoutError;

const FLOAT_SIZE: u64 = std::mem::size_of::<f32>() as u64;

/// One shader input fed from the interleaved vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Shader input location.
    pub slot: u32,
    /// Number of `f32` components (1-4).
    pub components: u32,
    /// Byte offset of the first component inside a vertex.
    pub offset: u64,
}

impl VertexAttribute {
    pub const fn new(slot: u32, components: u32, offset: u64) -> Self {
        Self {
            slot,
            components,
            offset,
        }
    }

    /// First byte past this attribute.
    fn end(&self) -> Result<u64, LayoutError> {
        self.offset
            .checked_add(u64::from(self.components) * FLOAT_SIZE)
            .ok_or(LayoutError::OffsetOverflow {
                slot: self.slot,
                offset: self.offset,
            })
    }

    fn format(&self) -> wgpu::VertexFormat {
        match self.components {
            1 => wgpu::VertexFormat::Float32,
            2 => wgpu::VertexFormat::Float32x2,
            3 => wgpu::VertexFormat::Float32x3,
            _ => wgpu::VertexFormat::Float32x4,
        }
    }
}

/// Validated attribute list plus the byte stride between vertices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    attributes: Vec<VertexAttribute>,
    stride: u64,
}

impl VertexLayout {
    /// Builds a tightly packed layout whose stride is the attribute extent.
    pub fn packed(attributes: Vec<VertexAttribute>) -> Result<Self, LayoutError> {
        let extent = attributes
            .iter()
            .try_fold(0u64, |extent, attribute| -> Result<u64, LayoutError> {
                Ok(extent.max(attribute.end()?))
            })?;
        Self::with_stride(attributes, extent)
    }

    /// Builds a layout with an explicit stride, which may include padding.
    pub fn with_stride(attributes: Vec<VertexAttribute>, stride: u64) -> Result<Self, LayoutError> {
        if attributes.is_empty() {
            return Err(LayoutError::NoAttributes);
        }

        for (index, attribute) in attributes.iter().enumerate() {
            if !(1..=4).contains(&attribute.components) {
                return Err(LayoutError::ComponentCount {
                    slot: attribute.slot,
                    components: attribute.components,
                });
            }
            if attribute.offset % FLOAT_SIZE != 0 {
                return Err(LayoutError::MisalignedOffset {
                    slot: attribute.slot,
                    offset: attribute.offset,
                });
            }
            if attributes[..index]
                .iter()
                .any(|other| other.slot == attribute.slot)
            {
                return Err(LayoutError::DuplicateSlot {
                    slot: attribute.slot,
                });
            }
        }

        let mut by_offset: Vec<&VertexAttribute> = attributes.iter().collect();
        by_offset.sort_by_key(|attribute| attribute.offset);
        for pair in by_offset.windows(2) {
            if pair[1].offset < pair[0].end()? {
                return Err(LayoutError::OverlappingAttributes {
                    first: pair[0].slot,
                    second: pair[1].slot,
                });
            }
        }

        let extent = match by_offset.last() {
            Some(attribute) => attribute.end()?,
            None => 0,
        };
        if stride < extent {
            return Err(LayoutError::StrideTooSmall { stride, extent });
        }
        if stride % FLOAT_SIZE != 0 {
            return Err(LayoutError::MisalignedStride { stride });
        }

        Ok(Self { attributes, stride })
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn floats_per_vertex(&self) -> usize {
        (self.stride / FLOAT_SIZE) as usize
    }

    /// Component count fed to `slot`, if the layout provides it.
    pub fn components_at(&self, slot: u32) -> Option<u32> {
        self.attributes
            .iter()
            .find(|attribute| attribute.slot == slot)
            .map(|attribute| attribute.components)
    }

    pub(crate) fn wgpu_attributes(&self) -> Vec<wgpu::VertexAttribute> {
        self.attributes
            .iter()
            .map(|attribute| wgpu::VertexAttribute {
                format: attribute.format(),
                offset: attribute.offset,
                shader_location: attribute.slot,
            })
            .collect()
    }
}

/// Vertex floats and triangle indices that have passed layout validation.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    vertices: Vec<f32>,
    indices: Vec<u32>,
    layout: VertexLayout,
}

impl MeshData {
    pub fn new(
        vertices: Vec<f32>,
        indices: Vec<u32>,
        layout: VertexLayout,
    ) -> Result<Self, LayoutError> {
        let per_vertex = layout.floats_per_vertex();
        if vertices.is_empty() {
            return Err(LayoutError::NoVertices);
        }
        if vertices.len() % per_vertex != 0 {
            return Err(LayoutError::RaggedVertices {
                floats: vertices.len(),
                per_vertex,
            });
        }
        if indices.is_empty() {
            return Err(LayoutError::NoIndices);
        }
        if indices.len() % 3 != 0 {
            return Err(LayoutError::PartialTriangle {
                count: indices.len(),
            });
        }

        let vertex_count = vertices.len() / per_vertex;
        if let Some((position, &value)) = indices
            .iter()
            .enumerate()
            .find(|&(_, &value)| value as usize >= vertex_count)
        {
            return Err(LayoutError::IndexOutOfRange {
                position,
                value,
                vertex_count,
            });
        }

        Ok(Self {
            vertices,
            indices,
            layout,
        })
    }

    pub fn vertices(&self) -> &[f32] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / self.layout.floats_per_vertex()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Line-list indices outlining every triangle: `a-b, b-c, c-a`.
    pub fn edge_indices(&self) -> Vec<u32> {
        self.indices
            .chunks_exact(3)
            .flat_map(|tri| [tri[0], tri[1], tri[1], tri[2], tri[2], tri[0]])
            .collect()
    }
}
