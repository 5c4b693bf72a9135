/// Pipeline state tracking: per-stage desired/current records and the
/// manager that diffs and applies them to a device context

mod stage;
mod state;
mod input_assembler;
mod shader_stage;
mod rasterizer;
mod output_merger;
mod pipeline_manager;

pub use stage::StageKind;
pub use state::{SlotArray, Tracked};
pub(crate) use state::stage_error;
pub use input_assembler::{
    InputAssemblerStage, VertexBufferBinding, IndexBufferBinding, VERTEX_BUFFER_SLOTS,
};
pub use shader_stage::{
    ShaderStageState, CONSTANT_BUFFER_SLOTS, SHADER_RESOURCE_SLOTS, SAMPLER_SLOTS,
    UNORDERED_ACCESS_SLOTS,
};
pub use rasterizer::{RasterizerStage, VIEWPORT_SLOTS, SCISSOR_SLOTS};
pub use output_merger::{OutputMergerStage, BlendBinding, DepthStencilBinding, RENDER_TARGET_SLOTS};
pub use pipeline_manager::{PipelineManager, ApplyStats, PipelineStats};
