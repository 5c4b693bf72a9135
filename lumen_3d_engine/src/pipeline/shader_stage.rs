/// Programmable shader stage state (vertex, hull, domain, geometry, pixel, compute).

use std::ops::Range;
use crate::device::{DeviceContext, NativeId, ShaderStage};
use crate::error::{Error, Result};
use crate::pipeline::{SlotArray, Tracked, StageKind};
use crate::pipeline::state::{stage_error, is_stale_handle};
use crate::registry::{ResourceRegistry, ResourceHandle, ResourceKind};
use crate::engine_report;

pub const CONSTANT_BUFFER_SLOTS: usize = 14;
pub const SHADER_RESOURCE_SLOTS: usize = 128;
pub const SAMPLER_SLOTS: usize = 16;
/// Unordered access slots (compute stage only)
pub const UNORDERED_ACCESS_SLOTS: usize = 8;

#[derive(Debug, Clone)]
pub struct ShaderStageState {
    stage: ShaderStage,
    shader: Tracked<ResourceHandle>,
    constant_buffers: SlotArray<ResourceHandle, CONSTANT_BUFFER_SLOTS>,
    shader_resources: SlotArray<ResourceHandle, SHADER_RESOURCE_SLOTS>,
    samplers: SlotArray<ResourceHandle, SAMPLER_SLOTS>,
    unordered_access: SlotArray<ResourceHandle, UNORDERED_ACCESS_SLOTS>,
}

impl ShaderStageState {
    pub fn new(stage: ShaderStage) -> Self {
        Self {
            stage,
            shader: Tracked::default(),
            constant_buffers: SlotArray::default(),
            shader_resources: SlotArray::default(),
            samplers: SlotArray::default(),
            unordered_access: SlotArray::default(),
        }
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    fn kind(&self) -> StageKind {
        StageKind::from(self.stage)
    }

    // ===== DESIRED STATE =====

    pub fn set_shader(&mut self, shader: ResourceHandle) {
        self.shader.set(shader);
    }

    pub fn set_constant_buffer(&mut self, slot: usize, buffer: ResourceHandle) -> Result<()> {
        let kind = self.kind();
        self.constant_buffers.set(kind, slot, buffer)
    }

    pub fn set_shader_resource(&mut self, slot: usize, view: ResourceHandle) -> Result<()> {
        let kind = self.kind();
        self.shader_resources.set(kind, slot, view)
    }

    pub fn set_sampler(&mut self, slot: usize, sampler: ResourceHandle) -> Result<()> {
        let kind = self.kind();
        self.samplers.set(kind, slot, sampler)
    }

    /// # Errors
    ///
    /// `SlotRange` with capacity 0 on any stage but compute.
    pub fn set_unordered_access_view(&mut self, slot: usize, view: ResourceHandle) -> Result<()> {
        let kind = self.kind();
        if self.stage != ShaderStage::Compute {
            return Err(engine_report!("lumen3d::Pipeline", Error::SlotRange {
                stage: kind,
                slot,
                capacity: 0,
            }));
        }
        self.unordered_access.set(kind, slot, view)
    }

    pub fn shader(&self) -> ResourceHandle {
        *self.shader.get()
    }

    pub fn constant_buffer(&self, slot: usize) -> Option<ResourceHandle> {
        self.constant_buffers.get(slot)
    }

    pub fn shader_resource(&self, slot: usize) -> Option<ResourceHandle> {
        self.shader_resources.get(slot)
    }

    /// Shader resource view actually bound on the context
    pub fn bound_shader_resource(&self, slot: usize) -> Option<ResourceHandle> {
        self.shader_resources.current(slot)
    }

    pub fn sampler(&self, slot: usize) -> Option<ResourceHandle> {
        self.samplers.get(slot)
    }

    pub fn unordered_access_view(&self, slot: usize) -> Option<ResourceHandle> {
        self.unordered_access.get(slot)
    }

    pub fn is_dirty(&self) -> bool {
        self.shader.is_dirty()
            || self.constant_buffers.any_dirty()
            || self.shader_resources.any_dirty()
            || self.samplers.any_dirty()
            || self.unordered_access.any_dirty()
    }

    /// Unbind every resource (buffers, views, samplers) but keep the shader
    pub fn clear_resources(&mut self) {
        self.constant_buffers.reset_desired();
        self.shader_resources.reset_desired();
        self.samplers.reset_desired();
        self.unordered_access.reset_desired();
    }

    /// Reset desired state to defaults
    pub fn clear_state(&mut self) {
        self.shader.reset_desired();
        self.clear_resources();
    }

    pub(crate) fn invalidate_current(&mut self) {
        self.shader.invalidate_current();
        self.constant_buffers.invalidate_current();
        self.shader_resources.invalidate_current();
        self.samplers.invalidate_current();
        self.unordered_access.invalidate_current();
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new(self.stage);
    }

    /// Force re-binding of every slot whose bound handle no longer resolves
    pub(crate) fn mark_stale(&mut self, registry: &ResourceRegistry) -> usize {
        let stale = |handle: &ResourceHandle| is_stale_handle(registry, *handle);
        usize::from(self.shader.mark_stale(stale))
            + self.constant_buffers.mark_stale(stale)
            + self.shader_resources.mark_stale(stale)
            + self.samplers.mark_stale(stale)
            + self.unordered_access.mark_stale(stale)
    }

    // ===== APPLY =====

    pub(crate) fn apply(&mut self, context: &mut dyn DeviceContext, registry: &ResourceRegistry) -> Result<usize> {
        let kind = self.kind();
        let stage = self.stage;
        let mut calls = 0;

        if self.shader.changed() {
            let shader = registry
                .resolve_native(*self.shader.get(), ResourceKind::Shader(stage))
                .map_err(|err| stage_error(kind, None, err))?;
            context
                .set_shader(stage, shader)
                .map_err(|err| stage_error(kind, None, err))?;
            calls += 1;
        }
        self.shader.commit();

        calls += apply_slots(kind, &mut self.constant_buffers, ResourceKind::Buffer, registry,
            |start, natives| context.set_constant_buffers(stage, start, natives))?;
        calls += apply_slots(kind, &mut self.shader_resources, ResourceKind::ShaderResourceView, registry,
            |start, natives| context.set_shader_resources(stage, start, natives))?;
        calls += apply_slots(kind, &mut self.samplers, ResourceKind::SamplerState, registry,
            |start, natives| context.set_samplers(stage, start, natives))?;
        if stage == ShaderStage::Compute {
            calls += apply_slots(kind, &mut self.unordered_access, ResourceKind::UnorderedAccessView, registry,
                |start, natives| context.set_unordered_access_views(start, natives))?;
        }

        Ok(calls)
    }
}

/// Bind every changed run of a handle array with one ranged call
pub(crate) fn apply_slots<const N: usize>(
    kind: StageKind,
    slots: &mut SlotArray<ResourceHandle, N>,
    expected: ResourceKind,
    registry: &ResourceRegistry,
    mut bind: impl FnMut(u32, &[Option<NativeId>]) -> Result<()>,
) -> Result<usize> {
    let mut calls = 0;
    for run in slots.changed_runs() {
        let natives = resolve_run(kind, slots, run.clone(), expected, registry)?;
        bind(run.start as u32, &natives).map_err(|err| stage_error(kind, Some(run.start), err))?;
        slots.commit(run);
        calls += 1;
    }
    slots.commit_all();
    Ok(calls)
}

fn resolve_run<const N: usize>(
    kind: StageKind,
    slots: &SlotArray<ResourceHandle, N>,
    run: Range<usize>,
    expected: ResourceKind,
    registry: &ResourceRegistry,
) -> Result<Vec<Option<NativeId>>> {
    run.map(|slot| {
        registry
            .resolve_native(slots.desired()[slot], expected)
            .map_err(|err| stage_error(kind, Some(slot), err))
    })
    .collect()
}
