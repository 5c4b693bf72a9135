/// Output merger stage state.

use crate::device::DeviceContext;
use crate::error::Result;
use crate::pipeline::{SlotArray, Tracked, StageKind};
use crate::pipeline::shader_stage::apply_slots;
use crate::pipeline::state::{stage_error, is_stale_handle};
use crate::registry::{ResourceRegistry, ResourceHandle, ResourceKind};

pub const RENDER_TARGET_SLOTS: usize = 8;

const STAGE: StageKind = StageKind::OutputMerger;

/// Blend state with its dynamic parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendBinding {
    pub state: ResourceHandle,
    pub blend_factor: [f32; 4],
    pub sample_mask: u32,
}

impl Default for BlendBinding {
    fn default() -> Self {
        Self {
            state: ResourceHandle::default(),
            blend_factor: [1.0; 4],
            sample_mask: u32::MAX,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DepthStencilBinding {
    pub state: ResourceHandle,
    pub stencil_ref: u32,
}

#[derive(Debug, Clone, Default)]
pub struct OutputMergerStage {
    render_targets: SlotArray<ResourceHandle, RENDER_TARGET_SLOTS>,
    depth_target: Tracked<ResourceHandle>,
    blend: Tracked<BlendBinding>,
    depth_stencil: Tracked<DepthStencilBinding>,
}

impl OutputMergerStage {
    // ===== DESIRED STATE =====

    pub fn set_render_target(&mut self, slot: usize, view: ResourceHandle) -> Result<()> {
        self.render_targets.set(STAGE, slot, view)
    }

    /// Depth-stencil view, null for no depth
    pub fn set_depth_target(&mut self, view: ResourceHandle) {
        self.depth_target.set(view);
    }

    pub fn set_blend_state(&mut self, state: ResourceHandle, blend_factor: [f32; 4], sample_mask: u32) {
        self.blend.set(BlendBinding { state, blend_factor, sample_mask });
    }

    pub fn set_depth_stencil_state(&mut self, state: ResourceHandle, stencil_ref: u32) {
        self.depth_stencil.set(DepthStencilBinding { state, stencil_ref });
    }

    pub fn render_target(&self, slot: usize) -> Option<ResourceHandle> {
        self.render_targets.get(slot)
    }

    /// Render target actually bound on the context
    pub fn bound_render_target(&self, slot: usize) -> Option<ResourceHandle> {
        self.render_targets.current(slot)
    }

    pub fn depth_target(&self) -> ResourceHandle {
        *self.depth_target.get()
    }

    pub fn blend(&self) -> &BlendBinding {
        self.blend.get()
    }

    pub fn depth_stencil(&self) -> &DepthStencilBinding {
        self.depth_stencil.get()
    }

    pub fn is_dirty(&self) -> bool {
        self.render_targets.any_dirty()
            || self.depth_target.is_dirty()
            || self.blend.is_dirty()
            || self.depth_stencil.is_dirty()
    }

    /// Unbind every render target and the depth target
    pub fn clear_targets(&mut self) {
        self.render_targets.reset_desired();
        self.depth_target.reset_desired();
    }

    pub fn clear_state(&mut self) {
        self.clear_targets();
        self.blend.reset_desired();
        self.depth_stencil.reset_desired();
    }

    pub(crate) fn invalidate_current(&mut self) {
        self.render_targets.invalidate_current();
        self.depth_target.invalidate_current();
        self.blend.invalidate_current();
        self.depth_stencil.invalidate_current();
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn mark_stale(&mut self, registry: &ResourceRegistry) -> usize {
        self.render_targets.mark_stale(|view| is_stale_handle(registry, *view))
            + usize::from(self.depth_target.mark_stale(|view| is_stale_handle(registry, *view)))
            + usize::from(self.blend.mark_stale(|binding| is_stale_handle(registry, binding.state)))
            + usize::from(self.depth_stencil.mark_stale(|binding| is_stale_handle(registry, binding.state)))
    }

    // ===== APPLY =====

    pub(crate) fn apply(&mut self, context: &mut dyn DeviceContext, registry: &ResourceRegistry) -> Result<usize> {
        let mut calls = apply_slots(STAGE, &mut self.render_targets, ResourceKind::RenderTargetView, registry,
            |start, natives| context.set_render_targets(start, natives))?;

        if self.depth_target.changed() {
            let view = registry
                .resolve_native(*self.depth_target.get(), ResourceKind::DepthStencilView)
                .map_err(|err| stage_error(STAGE, None, err))?;
            context
                .set_depth_stencil_view(view)
                .map_err(|err| stage_error(STAGE, None, err))?;
            calls += 1;
        }
        self.depth_target.commit();

        if self.blend.changed() {
            let binding = *self.blend.get();
            let state = registry
                .resolve_native(binding.state, ResourceKind::BlendState)
                .map_err(|err| stage_error(STAGE, None, err))?;
            context
                .set_blend_state(state, binding.blend_factor, binding.sample_mask)
                .map_err(|err| stage_error(STAGE, None, err))?;
            calls += 1;
        }
        self.blend.commit();

        if self.depth_stencil.changed() {
            let binding = *self.depth_stencil.get();
            let state = registry
                .resolve_native(binding.state, ResourceKind::DepthStencilState)
                .map_err(|err| stage_error(STAGE, None, err))?;
            context
                .set_depth_stencil_state(state, binding.stencil_ref)
                .map_err(|err| stage_error(STAGE, None, err))?;
            calls += 1;
        }
        self.depth_stencil.commit();

        Ok(calls)
    }
}
