use wgpu::util::DeviceExt;

use crate::error::{LayoutError, ReadbackError};
use crate::geometry::MeshData;
use crate::types::{FillMode, WireframeStrategy};

use super::readback;

/// Index list a draw call reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexList {
    Triangles,
    Edges,
}

/// Indexed draw for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    pub list: IndexList,
    pub index_count: u32,
}

impl DrawCall {
    /// Draw covering every triangle of a mesh with `triangle_indices` indices.
    pub fn for_mode(triangle_indices: u32, mode: FillMode, strategy: WireframeStrategy) -> Self {
        match (mode, strategy) {
            (FillMode::Wireframe, WireframeStrategy::EdgeList) => Self {
                list: IndexList::Edges,
                index_count: triangle_indices * 2,
            },
            _ => Self {
                list: IndexList::Triangles,
                index_count: triangle_indices,
            },
        }
    }

    pub fn triangles(&self) -> u32 {
        match self.list {
            IndexList::Triangles => self.index_count / 3,
            IndexList::Edges => self.index_count / 6,
        }
    }
}

/// Vertex and index buffers for a validated [`MeshData`].
///
/// Buffers are immutable after upload. The edge buffer only exists when the
/// device draws wireframes as line lists.
pub struct Mesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    edge_buffer: Option<wgpu::Buffer>,
    index_count: u32,
    vertex_bytes: u64,
    wireframe: WireframeStrategy,
}

impl Mesh {
    pub fn upload(
        device: &wgpu::Device,
        data: &MeshData,
        wireframe: WireframeStrategy,
    ) -> Result<Self, LayoutError> {
        let index_count = u32::try_from(data.indices().len()).map_err(|_| {
            LayoutError::Device(format!("{} indices exceed u32", data.indices().len()))
        })?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh vertices"),
            contents: bytemuck::cast_slice(data.vertices()),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_SRC,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh indices"),
            contents: bytemuck::cast_slice(data.indices()),
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_SRC,
        });
        let edge_buffer = (wireframe == WireframeStrategy::EdgeList).then(|| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("mesh edges"),
                contents: bytemuck::cast_slice(&data.edge_indices()),
                usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_SRC,
            })
        });

        let out_of_memory = pollster::block_on(device.pop_error_scope());
        let invalid = pollster::block_on(device.pop_error_scope());
        if let Some(error) = out_of_memory.or(invalid) {
            return Err(LayoutError::Device(error.to_string()));
        }

        tracing::debug!(
            vertices = data.vertex_count(),
            triangles = data.triangle_count(),
            stride = data.layout().stride(),
            "uploaded mesh"
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            edge_buffer,
            index_count,
            vertex_bytes: std::mem::size_of_val(data.vertices()) as u64,
            wireframe,
        })
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn draw_call(&self, mode: FillMode) -> DrawCall {
        DrawCall::for_mode(self.index_count, mode, self.wireframe)
    }

    pub(crate) fn vertex_buffer(&self) -> &wgpu::Buffer {
        &self.vertex_buffer
    }

    pub(crate) fn index_buffer(&self, list: IndexList) -> &wgpu::Buffer {
        match (list, &self.edge_buffer) {
            (IndexList::Edges, Some(edges)) => edges,
            _ => &self.index_buffer,
        }
    }

    /// Reads both buffers back from the GPU.
    pub fn read_back(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> Result<(Vec<f32>, Vec<u32>), ReadbackError> {
        let vertex_bytes = readback::read_buffer(device, queue, &self.vertex_buffer, self.vertex_bytes)?;
        let index_bytes = readback::read_buffer(
            device,
            queue,
            &self.index_buffer,
            u64::from(self.index_count) * 4,
        )?;
        Ok((unpack(&vertex_bytes), unpack(&index_bytes)))
    }
}

fn unpack<T: bytemuck::Pod>(bytes: &[u8]) -> Vec<T> {
    bytes
        .chunks_exact(std::mem::size_of::<T>())
        .map(bytemuck::pod_read_unaligned)
        .collect()
}

impl std::fmt::Debug for Mesh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mesh")
            .field("index_count", &self.index_count)
            .field("vertex_bytes", &self.vertex_bytes)
            .field("wireframe", &self.wireframe)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::quad_mesh;

    #[test]
    fn fill_draws_every_index() {
        let call = DrawCall::for_mode(6, FillMode::Fill, WireframeStrategy::EdgeList);
        assert_eq!(call.list, IndexList::Triangles);
        assert_eq!(call.index_count, 6);
        assert_eq!(call.triangles(), 2);
    }

    #[test]
    fn wireframe_strategy_picks_index_list() {
        let polygon = DrawCall::for_mode(6, FillMode::Wireframe, WireframeStrategy::PolygonLine);
        assert_eq!(polygon.list, IndexList::Triangles);
        assert_eq!(polygon.index_count, 6);

        let edges = DrawCall::for_mode(6, FillMode::Wireframe, WireframeStrategy::EdgeList);
        assert_eq!(edges.list, IndexList::Edges);
        assert_eq!(edges.index_count, 12);
        assert_eq!(edges.triangles(), 2);
    }

    #[test]
    fn triangle_draws_never_read_the_edge_buffer() {
        let Some(gpu) = crate::gpu::testing::headless() else {
            return;
        };
        let data = quad_mesh().unwrap();

        let lines = Mesh::upload(&gpu.device, &data, WireframeStrategy::EdgeList).unwrap();
        let edges = lines.edge_buffer.as_ref().unwrap();
        assert!(std::ptr::eq(lines.index_buffer(IndexList::Triangles), &lines.index_buffer));
        assert!(std::ptr::eq(lines.index_buffer(IndexList::Edges), edges));
        let edge_bytes =
            readback::read_buffer(&gpu.device, &gpu.queue, edges, edges.size()).unwrap();
        assert_eq!(unpack::<u32>(&edge_bytes), data.edge_indices());

        let polygon = Mesh::upload(&gpu.device, &data, WireframeStrategy::PolygonLine).unwrap();
        assert!(polygon.edge_buffer.is_none());
        for list in [IndexList::Triangles, IndexList::Edges] {
            assert!(std::ptr::eq(polygon.index_buffer(list), &polygon.index_buffer));
        }
    }

    #[test]
    fn uploaded_quad_reads_back_unchanged() {
        let Some(gpu) = crate::gpu::testing::headless() else {
            return;
        };
        let data = quad_mesh().unwrap();
        let mesh = Mesh::upload(&gpu.device, &data, gpu.wireframe).unwrap();
        assert_eq!(mesh.index_count(), 6);

        let (vertices, indices) = mesh.read_back(&gpu.device, &gpu.queue).unwrap();
        assert_eq!(vertices, data.vertices());
        assert_eq!(indices, data.indices());
    }
}
