/// GraphicsDevice, DeviceContext and DeviceFactory traits.
///
/// This is the boundary with the underlying graphics API. The device creates
/// and releases objects; a context records binding, clear and draw calls.
/// Backends implement these traits; the crate ships a software
/// `ReferenceDevice`.

use std::fmt;
use std::sync::Arc;
use crate::error::Result;
use crate::device::{
    BufferDesc, Texture2dDesc, ViewDesc, SamplerDesc, RasterizerDesc, BlendDesc,
    DepthStencilDesc, ShaderDesc, InputLayoutDesc, SwapChainDesc,
    ShaderStage, Viewport, ScissorRect, PrimitiveTopology, IndexFormat, ClearFlags,
};

// ============================================================================
// Identifiers
// ============================================================================

/// Device-side object identifier.
///
/// Only meaningful to the device that produced it. The registry wraps these
/// behind handles; they never reach application code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeId(pub u64);

/// Kind of device to create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverType {
    /// GPU-backed device
    Hardware,
    /// Reference rasterizer (slow, exact)
    Reference,
    /// Software rasterizer
    Software,
    /// Optimized software rasterizer
    Warp,
}

impl fmt::Display for DriverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriverType::Hardware => "hardware",
            DriverType::Reference => "reference",
            DriverType::Software => "software",
            DriverType::Warp => "warp",
        };
        f.write_str(name)
    }
}

/// Device feature level (API version the device must support)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureLevel {
    pub major: u32,
    pub minor: u32,
}

impl FeatureLevel {
    pub const LEVEL_9_1: FeatureLevel = FeatureLevel::new(9, 1);
    pub const LEVEL_9_2: FeatureLevel = FeatureLevel::new(9, 2);
    pub const LEVEL_9_3: FeatureLevel = FeatureLevel::new(9, 3);
    pub const LEVEL_10_0: FeatureLevel = FeatureLevel::new(10, 0);
    pub const LEVEL_10_1: FeatureLevel = FeatureLevel::new(10, 1);
    pub const LEVEL_11_0: FeatureLevel = FeatureLevel::new(11, 0);
    pub const LEVEL_11_1: FeatureLevel = FeatureLevel::new(11, 1);

    /// Every feature level a device can be asked for
    pub const KNOWN: [FeatureLevel; 7] = [
        Self::LEVEL_9_1,
        Self::LEVEL_9_2,
        Self::LEVEL_9_3,
        Self::LEVEL_10_0,
        Self::LEVEL_10_1,
        Self::LEVEL_11_0,
        Self::LEVEL_11_1,
    ];

    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Whether this is one of the `KNOWN` levels
    pub fn is_known(&self) -> bool {
        Self::KNOWN.contains(self)
    }
}

impl fmt::Display for FeatureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.major, self.minor)
    }
}

/// Whether a context submits directly or records a command list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    Immediate,
    Deferred,
}

/// Vertex buffer binding as seen by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeVertexBuffer {
    pub buffer: Option<NativeId>,
    pub stride: u32,
    pub offset: u32,
}

// ============================================================================
// GraphicsDevice
// ============================================================================

/// Object factory side of a graphics device.
///
/// Creation methods validate their descriptor and fail with
/// `Error::ResourceCreation` when the device rejects it.
pub trait GraphicsDevice: Send + Sync {
    /// Driver type this device was created with
    fn driver_type(&self) -> DriverType;

    /// Feature level this device was created with
    fn feature_level(&self) -> FeatureLevel;

    fn create_buffer(&self, desc: &BufferDesc) -> Result<NativeId>;

    fn create_texture_2d(&self, desc: &Texture2dDesc) -> Result<NativeId>;

    /// Create a view over a previously created buffer or texture
    fn create_view(&self, resource: NativeId, desc: &ViewDesc) -> Result<NativeId>;

    fn create_sampler_state(&self, desc: &SamplerDesc) -> Result<NativeId>;

    fn create_rasterizer_state(&self, desc: &RasterizerDesc) -> Result<NativeId>;

    fn create_blend_state(&self, desc: &BlendDesc) -> Result<NativeId>;

    fn create_depth_stencil_state(&self, desc: &DepthStencilDesc) -> Result<NativeId>;

    fn create_shader(&self, desc: &ShaderDesc) -> Result<NativeId>;

    fn create_input_layout(&self, desc: &InputLayoutDesc) -> Result<NativeId>;

    /// Create a swap chain; its back buffer is fetched with `swap_chain_back_buffer`
    fn create_swap_chain(&self, desc: &SwapChainDesc) -> Result<NativeId>;

    /// Back buffer texture of a swap chain
    fn swap_chain_back_buffer(&self, swap_chain: NativeId) -> Result<NativeId>;

    /// Resize the swap chain buffers.
    ///
    /// The previous back buffer must have been released by the caller.
    fn resize_swap_chain(&self, swap_chain: NativeId, width: u32, height: u32) -> Result<()>;

    /// Present the swap chain's back buffer.
    ///
    /// May block for vertical sync when `sync_interval > 0`.
    fn present(&self, swap_chain: NativeId, sync_interval: u32) -> Result<()>;

    /// Release a device object
    fn release(&self, object: NativeId);

    /// `Err(DeviceLost)` once the device has been removed or reset
    fn status(&self) -> Result<()>;

    /// Create a deferred context for command recording on another thread
    fn create_deferred_context(&self) -> Result<Box<dyn DeviceContext>>;
}

// ============================================================================
// DeviceContext
// ============================================================================

/// Binding and recording side of a graphics device.
///
/// Ranged binding calls take a start slot and a slice of objects so that
/// adjacent slots are bound in a single call. `None` unbinds a slot.
pub trait DeviceContext: Send {
    fn kind(&self) -> ContextKind;

    // ----- Input assembler -----

    fn set_vertex_buffers(&mut self, start_slot: u32, buffers: &[NativeVertexBuffer]) -> Result<()>;

    fn set_index_buffer(&mut self, buffer: Option<NativeId>, format: IndexFormat, offset: u32) -> Result<()>;

    fn set_input_layout(&mut self, layout: Option<NativeId>) -> Result<()>;

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) -> Result<()>;

    // ----- Shader stages -----

    fn set_shader(&mut self, stage: ShaderStage, shader: Option<NativeId>) -> Result<()>;

    fn set_constant_buffers(&mut self, stage: ShaderStage, start_slot: u32, buffers: &[Option<NativeId>]) -> Result<()>;

    fn set_shader_resources(&mut self, stage: ShaderStage, start_slot: u32, views: &[Option<NativeId>]) -> Result<()>;

    fn set_samplers(&mut self, stage: ShaderStage, start_slot: u32, samplers: &[Option<NativeId>]) -> Result<()>;

    /// Unordered access views (compute stage)
    fn set_unordered_access_views(&mut self, start_slot: u32, views: &[Option<NativeId>]) -> Result<()>;

    // ----- Rasterizer -----

    fn set_rasterizer_state(&mut self, state: Option<NativeId>) -> Result<()>;

    /// Replace the whole viewport array
    fn set_viewports(&mut self, viewports: &[Viewport]) -> Result<()>;

    /// Replace the whole scissor array
    fn set_scissor_rects(&mut self, rects: &[ScissorRect]) -> Result<()>;

    // ----- Output merger -----

    fn set_render_targets(&mut self, start_slot: u32, views: &[Option<NativeId>]) -> Result<()>;

    fn set_depth_stencil_view(&mut self, view: Option<NativeId>) -> Result<()>;

    fn set_blend_state(&mut self, state: Option<NativeId>, blend_factor: [f32; 4], sample_mask: u32) -> Result<()>;

    fn set_depth_stencil_state(&mut self, state: Option<NativeId>, stencil_ref: u32) -> Result<()>;

    // ----- Commands -----

    fn clear_render_target_view(&mut self, view: NativeId, color: [f32; 4]) -> Result<()>;

    fn clear_depth_stencil_view(&mut self, view: NativeId, flags: ClearFlags, depth: f32, stencil: u8) -> Result<()>;

    /// Overwrite the contents of a buffer
    fn update_subresource(&mut self, resource: NativeId, data: &[u8]) -> Result<()>;

    fn draw(&mut self, vertex_count: u32, start_vertex: u32) -> Result<()>;

    fn draw_indexed(&mut self, index_count: u32, start_index: u32, base_vertex: i32) -> Result<()>;

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()>;

    /// Reset every binding to its default (unbound) value
    fn clear_state(&mut self) -> Result<()>;

    /// Close the recorded command list (deferred contexts only).
    ///
    /// The context's state is reset afterwards.
    fn finish_command_list(&mut self) -> Result<NativeId>;

    /// Play back a command list recorded on a deferred context (immediate only)
    fn execute_command_list(&mut self, list: NativeId) -> Result<()>;
}

// ============================================================================
// DeviceFactory
// ============================================================================

/// A freshly created device with its immediate context
pub struct CreatedDevice {
    pub device: Arc<dyn GraphicsDevice>,
    pub immediate_context: Box<dyn DeviceContext>,
}

/// Creates devices for a driver type and feature level.
///
/// Implemented by backends; the renderer asks it for the preferred driver
/// and falls back to the reference driver.
pub trait DeviceFactory: Send + Sync {
    fn create_device(&self, driver: DriverType, feature_level: FeatureLevel) -> Result<CreatedDevice>;
}
