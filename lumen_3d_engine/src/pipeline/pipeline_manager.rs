/// PipelineManager: desired/current state of every stage for one device context.
///
/// Callers write desired state through the stage accessors; nothing reaches
/// the device until `apply_stage` / `apply_all` (or a draw, which applies
/// first). Apply compares desired against current per slot and issues one
/// ranged call per run of adjacent changed slots.
///
/// A failing apply returns `PipelineState` for the stage that failed.
/// Stages applied before it stay applied; the failing run stays dirty.

use std::mem;
use crate::device::{ContextKind, DeviceContext, NativeId, ShaderStage, ClearFlags};
use crate::error::{Error, Result};
use crate::pipeline::{
    StageKind, InputAssemblerStage, ShaderStageState, RasterizerStage, OutputMergerStage,
};
use crate::registry::{ResourceRegistry, ResourceHandle, ResourceKind};
use crate::{engine_debug, engine_trace};

const SOURCE: &str = "lumen3d::Pipeline";

/// Device calls issued by one apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplyStats {
    pub bind_calls: usize,
}

impl std::ops::AddAssign for ApplyStats {
    fn add_assign(&mut self, other: Self) {
        self.bind_calls += other.bind_calls;
    }
}

/// Per-context counters since the last `take_stats`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineStats {
    pub bind_calls: u64,
    pub draw_calls: u64,
    pub dispatches: u64,
    pub clears: u64,
}

/// Pipeline state of one device context (immediate or deferred)
pub struct PipelineManager {
    context: Box<dyn DeviceContext>,
    input_assembler: InputAssemblerStage,
    shader_stages: [ShaderStageState; 6],
    rasterizer: RasterizerStage,
    output_merger: OutputMergerStage,
    stats: PipelineStats,
    /// Registry retire epoch at the last stale-binding check
    checked_epoch: u64,
}

impl PipelineManager {
    /// Take ownership of a device context
    pub fn new(context: Box<dyn DeviceContext>) -> Self {
        Self {
            context,
            input_assembler: InputAssemblerStage::default(),
            shader_stages: ShaderStage::ALL.map(ShaderStageState::new),
            rasterizer: RasterizerStage::default(),
            output_merger: OutputMergerStage::default(),
            stats: PipelineStats::default(),
            checked_epoch: 0,
        }
    }

    pub fn context_kind(&self) -> ContextKind {
        self.context.kind()
    }

    // ===== STAGE ACCESS =====

    pub fn input_assembler(&self) -> &InputAssemblerStage {
        &self.input_assembler
    }

    pub fn input_assembler_mut(&mut self) -> &mut InputAssemblerStage {
        &mut self.input_assembler
    }

    pub fn shader_stage(&self, stage: ShaderStage) -> &ShaderStageState {
        &self.shader_stages[stage.index()]
    }

    pub fn shader_stage_mut(&mut self, stage: ShaderStage) -> &mut ShaderStageState {
        &mut self.shader_stages[stage.index()]
    }

    pub fn rasterizer(&self) -> &RasterizerStage {
        &self.rasterizer
    }

    pub fn rasterizer_mut(&mut self) -> &mut RasterizerStage {
        &mut self.rasterizer
    }

    pub fn output_merger(&self) -> &OutputMergerStage {
        &self.output_merger
    }

    pub fn output_merger_mut(&mut self) -> &mut OutputMergerStage {
        &mut self.output_merger
    }

    /// Whether `stage` has dirty desired state
    pub fn is_dirty(&self, stage: StageKind) -> bool {
        match stage {
            StageKind::InputAssembler => self.input_assembler.is_dirty(),
            StageKind::Rasterizer => self.rasterizer.is_dirty(),
            StageKind::OutputMerger => self.output_merger.is_dirty(),
            shader => shader
                .shader_stage()
                .map(|s| self.shader_stages[s.index()].is_dirty())
                .unwrap_or(false),
        }
    }

    // ===== APPLY =====

    /// Mark for re-binding every bound handle that stopped resolving since
    /// the last check. The next apply binds the desired replacement, or
    /// fails with `PipelineState` if the desired handle is the retired one.
    fn mark_stale_bindings(&mut self, registry: &ResourceRegistry) {
        let epoch = registry.retire_epoch();
        if epoch == self.checked_epoch {
            return;
        }
        self.checked_epoch = epoch;
        let mut marked = self.input_assembler.mark_stale(registry);
        for stage in &mut self.shader_stages {
            marked += stage.mark_stale(registry);
        }
        marked += self.rasterizer.mark_stale(registry);
        marked += self.output_merger.mark_stale(registry);
        if marked > 0 {
            engine_debug!(SOURCE, "{} bound slots refer to retired resources", marked);
        }
    }

    /// Apply one stage
    pub fn apply_stage(&mut self, stage: StageKind, registry: &ResourceRegistry) -> Result<ApplyStats> {
        self.mark_stale_bindings(registry);
        let context = self.context.as_mut();
        let bind_calls = match stage {
            StageKind::InputAssembler => self.input_assembler.apply(context, registry),
            StageKind::Rasterizer => self.rasterizer.apply(context, registry),
            StageKind::OutputMerger => self.output_merger.apply(context, registry),
            shader => match shader.shader_stage() {
                Some(s) => self.shader_stages[s.index()].apply(context, registry),
                None => Ok(0),
            },
        }?;
        if bind_calls > 0 {
            engine_trace!(SOURCE, "Applied {}: {} calls", stage, bind_calls);
        }
        self.stats.bind_calls += bind_calls as u64;
        Ok(ApplyStats { bind_calls })
    }

    /// Apply every stage in `StageKind::APPLY_ORDER`, stopping at the first failure
    pub fn apply_all(&mut self, registry: &ResourceRegistry) -> Result<ApplyStats> {
        let mut stats = ApplyStats::default();
        for stage in StageKind::APPLY_ORDER {
            stats += self.apply_stage(stage, registry)?;
        }
        Ok(stats)
    }

    /// Apply only the rasterizer and output merger (viewports and targets),
    /// in `APPLY_ORDER`
    pub fn apply_render_targets(&mut self, registry: &ResourceRegistry) -> Result<ApplyStats> {
        let mut stats = self.apply_stage(StageKind::Rasterizer, registry)?;
        stats += self.apply_stage(StageKind::OutputMerger, registry)?;
        Ok(stats)
    }

    // ===== CLEARING DESIRED STATE =====

    /// Unbind every render target and the depth target (desired state)
    pub fn clear_render_targets(&mut self) {
        self.output_merger.clear_targets();
    }

    /// Unbind every shader-stage resource (desired state)
    pub fn clear_pipeline_resources(&mut self) {
        for stage in &mut self.shader_stages {
            stage.clear_resources();
        }
    }

    /// Reset the desired state of every stage to defaults
    pub fn clear_pipeline_state(&mut self) {
        self.input_assembler.clear_state();
        for stage in &mut self.shader_stages {
            stage.clear_state();
        }
        self.rasterizer.clear_state();
        self.output_merger.clear_state();
    }

    fn invalidate_current(&mut self) {
        self.input_assembler.invalidate_current();
        for stage in &mut self.shader_stages {
            stage.invalidate_current();
        }
        self.rasterizer.invalidate_current();
        self.output_merger.invalidate_current();
    }

    fn reset_all(&mut self) {
        self.input_assembler.reset();
        for stage in &mut self.shader_stages {
            stage.reset();
        }
        self.rasterizer.reset();
        self.output_merger.reset();
    }

    // ===== COMMANDS =====

    fn native(registry: &ResourceRegistry, handle: ResourceHandle, kind: ResourceKind) -> Result<NativeId> {
        registry
            .resolve_native(handle, kind)?
            .ok_or_else(|| Error::InvalidHandle("null handle".to_string()))
    }

    pub fn clear_color_target(&mut self, registry: &ResourceRegistry, rtv: ResourceHandle, color: [f32; 4]) -> Result<()> {
        let view = Self::native(registry, rtv, ResourceKind::RenderTargetView)?;
        self.context.clear_render_target_view(view, color)?;
        self.stats.clears += 1;
        Ok(())
    }

    pub fn clear_depth_stencil_target(
        &mut self,
        registry: &ResourceRegistry,
        dsv: ResourceHandle,
        flags: ClearFlags,
        depth: f32,
        stencil: u8,
    ) -> Result<()> {
        let view = Self::native(registry, dsv, ResourceKind::DepthStencilView)?;
        self.context.clear_depth_stencil_view(view, flags, depth, stencil)?;
        self.stats.clears += 1;
        Ok(())
    }

    /// Overwrite the contents of a buffer
    pub fn update_buffer(&mut self, registry: &ResourceRegistry, buffer: ResourceHandle, data: &[u8]) -> Result<()> {
        let native = Self::native(registry, buffer, ResourceKind::Buffer)?;
        self.context.update_subresource(native, data)
    }

    /// Apply all stages, then draw
    pub fn draw(&mut self, registry: &ResourceRegistry, vertex_count: u32, start_vertex: u32) -> Result<()> {
        self.apply_all(registry)?;
        self.context.draw(vertex_count, start_vertex)?;
        self.stats.draw_calls += 1;
        Ok(())
    }

    /// Apply all stages, then draw indexed
    pub fn draw_indexed(
        &mut self,
        registry: &ResourceRegistry,
        index_count: u32,
        start_index: u32,
        base_vertex: i32,
    ) -> Result<()> {
        self.apply_all(registry)?;
        self.context.draw_indexed(index_count, start_index, base_vertex)?;
        self.stats.draw_calls += 1;
        Ok(())
    }

    /// Apply all stages, then dispatch compute work
    pub fn dispatch(&mut self, registry: &ResourceRegistry, x: u32, y: u32, z: u32) -> Result<()> {
        self.apply_all(registry)?;
        self.context.dispatch(x, y, z)?;
        self.stats.dispatches += 1;
        Ok(())
    }

    /// Close the command list recorded on a deferred context.
    ///
    /// The device resets the deferred context afterwards, so both state
    /// records go back to defaults.
    pub fn finish_command_list(&mut self) -> Result<NativeId> {
        if self.context.kind() != ContextKind::Deferred {
            return Err(Error::InvalidOperation(
                "finish_command_list needs a deferred context".to_string(),
            ));
        }
        let list = self.context.finish_command_list()?;
        self.reset_all();
        engine_debug!(SOURCE, "Finished command list {:?}", list);
        Ok(list)
    }

    /// Play back a command list on the immediate context.
    ///
    /// The context's bindings are unknown afterwards: current state is
    /// reset and all desired state is re-applied on the next apply.
    pub fn execute_command_list(&mut self, list: NativeId) -> Result<()> {
        if self.context.kind() != ContextKind::Immediate {
            return Err(Error::InvalidOperation(
                "execute_command_list needs the immediate context".to_string(),
            ));
        }
        self.context.execute_command_list(list)?;
        self.invalidate_current();
        Ok(())
    }

    /// Counters since the last call
    pub fn take_stats(&mut self) -> PipelineStats {
        mem::take(&mut self.stats)
    }
}

#[cfg(test)]
#[path = "pipeline_manager_tests.rs"]
mod tests;
