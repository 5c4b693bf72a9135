/// Geometry: vertex/index buffer bindings plus draw counts.
///
/// Like effects, geometry holds handles only and is shared through `Arc`.

use bytemuck::{Pod, Zeroable};
use crate::device::{BufferDesc, Format, IndexFormat, InputElement, InputLayoutDesc, PrimitiveTopology};
use crate::error::Result;
use crate::pipeline::{PipelineManager, VertexBufferBinding, IndexBufferBinding, VERTEX_BUFFER_SLOTS};
use crate::registry::{ResourceRegistry, ResourceHandle};
use crate::engine_bail;

/// Position-only vertex used by full-screen passes
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    vertex_buffers: Vec<VertexBufferBinding>,
    index_buffer: Option<IndexBufferBinding>,
    index_count: u32,
    vertex_count: u32,
    input_layout: ResourceHandle,
    topology: PrimitiveTopology,
}

impl Geometry {
    /// Non-indexed geometry with no buffers yet
    pub fn new(topology: PrimitiveTopology, vertex_count: u32) -> Self {
        Self {
            vertex_buffers: Vec::new(),
            index_buffer: None,
            index_count: 0,
            vertex_count,
            input_layout: ResourceHandle::default(),
            topology,
        }
    }

    /// Append a vertex stream in the next free slot
    pub fn with_vertex_buffer(mut self, buffer: ResourceHandle, stride: u32, offset: u32) -> Result<Self> {
        if self.vertex_buffers.len() >= VERTEX_BUFFER_SLOTS {
            engine_bail!("lumen3d::Geometry",
                "Geometry already uses all {} vertex buffer slots", VERTEX_BUFFER_SLOTS);
        }
        self.vertex_buffers.push(VertexBufferBinding { buffer, stride, offset });
        Ok(self)
    }

    /// Make the geometry indexed
    pub fn with_index_buffer(mut self, buffer: ResourceHandle, format: IndexFormat, index_count: u32) -> Self {
        self.index_buffer = Some(IndexBufferBinding { buffer, format, offset: 0 });
        self.index_count = index_count;
        self
    }

    pub fn with_input_layout(mut self, layout: ResourceHandle) -> Self {
        self.input_layout = layout;
        self
    }

    /// Four-vertex triangle strip covering clip space, with its own buffer
    /// and input layout
    pub fn full_screen_quad(registry: &mut ResourceRegistry) -> Result<Self> {
        let vertices = [
            QuadVertex { position: [-1.0, 1.0, 0.0] },
            QuadVertex { position: [1.0, 1.0, 0.0] },
            QuadVertex { position: [-1.0, -1.0, 0.0] },
            QuadVertex { position: [1.0, -1.0, 0.0] },
        ];
        let buffer = registry.create_buffer(&BufferDesc::vertex(&vertices))?;
        let layout = registry.create_input_layout(&InputLayoutDesc {
            elements: vec![InputElement {
                semantic: "POSITION".to_string(),
                semantic_index: 0,
                format: Format::R32G32B32_FLOAT,
                input_slot: 0,
                byte_offset: 0,
            }],
        });
        let layout = match layout {
            Ok(layout) => layout,
            Err(err) => {
                registry.destroy(buffer);
                return Err(err);
            }
        };
        Geometry::new(PrimitiveTopology::TriangleStrip, vertices.len() as u32)
            .with_vertex_buffer(buffer, std::mem::size_of::<QuadVertex>() as u32, 0)
            .map(|g| g.with_input_layout(layout))
    }

    pub fn vertex_buffers(&self) -> &[VertexBufferBinding] {
        &self.vertex_buffers
    }

    pub fn index_buffer(&self) -> Option<&IndexBufferBinding> {
        self.index_buffer.as_ref()
    }

    pub fn input_layout(&self) -> ResourceHandle {
        self.input_layout
    }

    pub fn topology(&self) -> PrimitiveTopology {
        self.topology
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn is_indexed(&self) -> bool {
        self.index_buffer.is_some()
    }

    /// Handles owned by this geometry (buffers and layout)
    pub fn resources(&self) -> impl Iterator<Item = ResourceHandle> + '_ {
        self.vertex_buffers
            .iter()
            .map(|vb| vb.buffer)
            .chain(self.index_buffer.iter().map(|ib| ib.buffer))
            .chain(std::iter::once(self.input_layout))
    }

    /// Write the input assembler's desired state
    pub fn bind(&self, pipeline: &mut PipelineManager) -> Result<()> {
        let ia = pipeline.input_assembler_mut();
        for (slot, vb) in self.vertex_buffers.iter().enumerate() {
            ia.set_vertex_buffer(slot, vb.buffer, vb.stride, vb.offset)?;
        }
        match self.index_buffer {
            Some(ib) => ia.set_index_buffer(ib.buffer, ib.format, ib.offset),
            None => ia.set_index_buffer(ResourceHandle::default(), IndexFormat::default(), 0),
        }
        ia.set_input_layout(self.input_layout);
        ia.set_primitive_topology(self.topology);
        Ok(())
    }

    /// Apply the pipeline and issue this geometry's draw
    pub fn draw(&self, pipeline: &mut PipelineManager, registry: &ResourceRegistry) -> Result<()> {
        match self.index_buffer {
            Some(_) => pipeline.draw_indexed(registry, self.index_count, 0, 0),
            None => pipeline.draw(registry, self.vertex_count, 0),
        }
    }
}

#[cfg(test)]
#[path = "geometry_tests.rs"]
mod tests;
