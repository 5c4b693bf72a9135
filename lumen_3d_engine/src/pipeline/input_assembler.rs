/// Input assembler stage state.

use crate::device::{DeviceContext, NativeVertexBuffer, IndexFormat, PrimitiveTopology};
use crate::error::Result;
use crate::pipeline::{SlotArray, Tracked, StageKind};
use crate::pipeline::state::{stage_error, is_stale_handle};
use crate::registry::{ResourceRegistry, ResourceHandle, ResourceKind};

/// Number of vertex buffer slots
pub const VERTEX_BUFFER_SLOTS: usize = 16;

const STAGE: StageKind = StageKind::InputAssembler;

/// Vertex buffer bound to one input slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VertexBufferBinding {
    pub buffer: ResourceHandle,
    pub stride: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexBufferBinding {
    pub buffer: ResourceHandle,
    pub format: IndexFormat,
    pub offset: u32,
}

#[derive(Debug, Clone, Default)]
pub struct InputAssemblerStage {
    vertex_buffers: SlotArray<VertexBufferBinding, VERTEX_BUFFER_SLOTS>,
    index_buffer: Tracked<IndexBufferBinding>,
    input_layout: Tracked<ResourceHandle>,
    topology: Tracked<PrimitiveTopology>,
}

impl InputAssemblerStage {
    // ===== DESIRED STATE =====

    pub fn set_vertex_buffer(&mut self, slot: usize, buffer: ResourceHandle, stride: u32, offset: u32) -> Result<()> {
        self.vertex_buffers.set(STAGE, slot, VertexBufferBinding { buffer, stride, offset })
    }

    pub fn set_index_buffer(&mut self, buffer: ResourceHandle, format: IndexFormat, offset: u32) {
        self.index_buffer.set(IndexBufferBinding { buffer, format, offset });
    }

    pub fn set_input_layout(&mut self, layout: ResourceHandle) {
        self.input_layout.set(layout);
    }

    pub fn set_primitive_topology(&mut self, topology: PrimitiveTopology) {
        self.topology.set(topology);
    }

    pub fn vertex_buffer(&self, slot: usize) -> Option<VertexBufferBinding> {
        self.vertex_buffers.get(slot)
    }

    pub fn vertex_buffers(&self) -> &SlotArray<VertexBufferBinding, VERTEX_BUFFER_SLOTS> {
        &self.vertex_buffers
    }

    pub fn index_buffer(&self) -> &IndexBufferBinding {
        self.index_buffer.get()
    }

    pub fn input_layout(&self) -> ResourceHandle {
        *self.input_layout.get()
    }

    pub fn primitive_topology(&self) -> PrimitiveTopology {
        *self.topology.get()
    }

    pub fn is_dirty(&self) -> bool {
        self.vertex_buffers.any_dirty()
            || self.index_buffer.is_dirty()
            || self.input_layout.is_dirty()
            || self.topology.is_dirty()
    }

    /// Reset desired state to defaults
    pub fn clear_state(&mut self) {
        self.vertex_buffers.reset_desired();
        self.index_buffer.reset_desired();
        self.input_layout.reset_desired();
        self.topology.reset_desired();
    }

    pub(crate) fn invalidate_current(&mut self) {
        self.vertex_buffers.invalidate_current();
        self.index_buffer.invalidate_current();
        self.input_layout.invalidate_current();
        self.topology.invalidate_current();
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn mark_stale(&mut self, registry: &ResourceRegistry) -> usize {
        self.vertex_buffers.mark_stale(|binding| is_stale_handle(registry, binding.buffer))
            + usize::from(self.index_buffer.mark_stale(|binding| is_stale_handle(registry, binding.buffer)))
            + usize::from(self.input_layout.mark_stale(|layout| is_stale_handle(registry, *layout)))
    }

    // ===== APPLY =====

    /// Bind changed state. Returns the number of device calls issued.
    pub(crate) fn apply(&mut self, context: &mut dyn DeviceContext, registry: &ResourceRegistry) -> Result<usize> {
        let mut calls = 0;

        for run in self.vertex_buffers.changed_runs() {
            let mut natives = Vec::with_capacity(run.len());
            for slot in run.clone() {
                let binding = self.vertex_buffers.desired()[slot];
                let buffer = registry
                    .resolve_native(binding.buffer, ResourceKind::Buffer)
                    .map_err(|err| stage_error(STAGE, Some(slot), err))?;
                natives.push(NativeVertexBuffer { buffer, stride: binding.stride, offset: binding.offset });
            }
            context
                .set_vertex_buffers(run.start as u32, &natives)
                .map_err(|err| stage_error(STAGE, Some(run.start), err))?;
            self.vertex_buffers.commit(run);
            calls += 1;
        }
        self.vertex_buffers.commit_all();

        if self.index_buffer.changed() {
            let binding = *self.index_buffer.get();
            let buffer = registry
                .resolve_native(binding.buffer, ResourceKind::Buffer)
                .map_err(|err| stage_error(STAGE, None, err))?;
            context
                .set_index_buffer(buffer, binding.format, binding.offset)
                .map_err(|err| stage_error(STAGE, None, err))?;
            calls += 1;
        }
        self.index_buffer.commit();

        if self.input_layout.changed() {
            let layout = registry
                .resolve_native(*self.input_layout.get(), ResourceKind::InputLayout)
                .map_err(|err| stage_error(STAGE, None, err))?;
            context
                .set_input_layout(layout)
                .map_err(|err| stage_error(STAGE, None, err))?;
            calls += 1;
        }
        self.input_layout.commit();

        if self.topology.changed() {
            context
                .set_primitive_topology(*self.topology.get())
                .map_err(|err| stage_error(STAGE, None, err))?;
            calls += 1;
        }
        self.topology.commit();

        Ok(calls)
    }
}
