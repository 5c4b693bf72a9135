/// Rasterizer stage state.
///
/// Viewports and scissor rectangles are not ranged on the device: when any
/// active slot or the count changes, the whole `[0, count)` array is set
/// with one call.

use crate::device::{DeviceContext, ScissorRect, Viewport};
use crate::error::{Error, Result};
use crate::pipeline::{SlotArray, Tracked, StageKind};
use crate::pipeline::state::{stage_error, is_stale_handle};
use crate::registry::{ResourceRegistry, ResourceHandle, ResourceKind, ViewportId};
use crate::engine_report;

pub const VIEWPORT_SLOTS: usize = 16;
pub const SCISSOR_SLOTS: usize = 16;

const STAGE: StageKind = StageKind::Rasterizer;

#[derive(Debug, Clone, Default)]
pub struct RasterizerStage {
    state: Tracked<ResourceHandle>,
    viewport_count: Tracked<usize>,
    viewports: SlotArray<Option<ViewportId>, VIEWPORT_SLOTS>,
    scissor_count: Tracked<usize>,
    scissors: SlotArray<ScissorRect, SCISSOR_SLOTS>,
}

fn check_count(count: usize, capacity: usize) -> Result<()> {
    if count > capacity {
        return Err(engine_report!("lumen3d::Pipeline", Error::SlotRange {
            stage: STAGE,
            slot: count,
            capacity,
        }));
    }
    Ok(())
}

impl RasterizerStage {
    // ===== DESIRED STATE =====

    pub fn set_rasterizer_state(&mut self, state: ResourceHandle) {
        self.state.set(state);
    }

    /// Number of active viewports (`0..=16`)
    pub fn set_viewport_count(&mut self, count: usize) -> Result<()> {
        check_count(count, VIEWPORT_SLOTS)?;
        self.viewport_count.set(count);
        Ok(())
    }

    pub fn set_viewport(&mut self, slot: usize, viewport: ViewportId) -> Result<()> {
        self.viewports.set(STAGE, slot, Some(viewport))
    }

    /// Number of active scissor rectangles (`0..=16`)
    pub fn set_scissor_count(&mut self, count: usize) -> Result<()> {
        check_count(count, SCISSOR_SLOTS)?;
        self.scissor_count.set(count);
        Ok(())
    }

    pub fn set_scissor_rect(&mut self, slot: usize, rect: ScissorRect) -> Result<()> {
        self.scissors.set(STAGE, slot, rect)
    }

    pub fn rasterizer_state(&self) -> ResourceHandle {
        *self.state.get()
    }

    pub fn viewport_count(&self) -> usize {
        *self.viewport_count.get()
    }

    pub fn viewport(&self, slot: usize) -> Option<ViewportId> {
        self.viewports.get(slot).flatten()
    }

    pub fn scissor_count(&self) -> usize {
        *self.scissor_count.get()
    }

    pub fn scissor_rect(&self, slot: usize) -> Option<ScissorRect> {
        self.scissors.get(slot)
    }

    pub fn is_dirty(&self) -> bool {
        self.state.is_dirty()
            || self.viewport_count.is_dirty()
            || self.viewports.any_dirty()
            || self.scissor_count.is_dirty()
            || self.scissors.any_dirty()
    }

    pub fn clear_state(&mut self) {
        self.state.reset_desired();
        self.viewport_count.reset_desired();
        self.viewports.reset_desired();
        self.scissor_count.reset_desired();
        self.scissors.reset_desired();
    }

    pub(crate) fn invalidate_current(&mut self) {
        self.state.invalidate_current();
        self.viewport_count.invalidate_current();
        self.viewports.invalidate_current();
        self.scissor_count.invalidate_current();
        self.scissors.invalidate_current();
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn mark_stale(&mut self, registry: &ResourceRegistry) -> usize {
        usize::from(self.state.mark_stale(|state| is_stale_handle(registry, *state)))
    }

    // ===== APPLY =====

    pub(crate) fn apply(&mut self, context: &mut dyn DeviceContext, registry: &ResourceRegistry) -> Result<usize> {
        let mut calls = 0;

        if self.state.changed() {
            let state = registry
                .resolve_native(*self.state.get(), ResourceKind::RasterizerState)
                .map_err(|err| stage_error(STAGE, None, err))?;
            context
                .set_rasterizer_state(state)
                .map_err(|err| stage_error(STAGE, None, err))?;
            calls += 1;
        }
        self.state.commit();

        let count = *self.viewport_count.get();
        if self.viewport_count.changed() || self.viewports.has_changes_below(count) {
            let mut viewports = Vec::with_capacity(count);
            for slot in 0..count {
                let id = self.viewports.desired()[slot].ok_or_else(|| Error::PipelineState {
                    stage: STAGE,
                    slot: Some(slot),
                    reason: "viewport slot is active but unset".to_string(),
                })?;
                let viewport: Viewport = *registry
                    .viewport(id)
                    .map_err(|err| stage_error(STAGE, Some(slot), err))?;
                viewports.push(viewport);
            }
            context
                .set_viewports(&viewports)
                .map_err(|err| stage_error(STAGE, None, err))?;
            calls += 1;
        }
        self.viewport_count.commit();
        self.viewports.commit_all();

        let count = *self.scissor_count.get();
        if self.scissor_count.changed() || self.scissors.has_changes_below(count) {
            context
                .set_scissor_rects(&self.scissors.desired()[..count])
                .map_err(|err| stage_error(STAGE, None, err))?;
            calls += 1;
        }
        self.scissor_count.commit();
        self.scissors.commit_all();

        Ok(calls)
    }
}
