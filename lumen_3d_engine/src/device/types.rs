/// Resource configuration descriptors and plain device types.
///
/// Descriptors are plain structs describing desired resource properties
/// (dimensions, format, usage, bind flags, initial contents). They are the
/// boundary contract with asset-loading collaborators.

use bitflags::bitflags;
use bytemuck::Pod;
use winit::dpi::PhysicalSize;
use winit::window::WindowId;

// ===== FORMAT =====

/// Pixel, vertex attribute and index format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum Format {
    Unknown,

    // Color formats
    R8G8B8A8_UNORM,
    R8G8B8A8_UNORM_SRGB,
    B8G8R8A8_UNORM,
    R10G10B10A2_UNORM,
    R16G16B16A16_FLOAT,
    R32G32B32A32_FLOAT,
    R32G32B32_FLOAT,
    R32G32_FLOAT,
    R32_FLOAT,

    // Integer formats (indices)
    R16_UINT,
    R32_UINT,

    // Depth formats
    D16_UNORM,
    D24_UNORM_S8_UINT,
    D32_FLOAT,
}

impl Format {
    /// Size of one element in bytes (0 for `Unknown`)
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            Format::Unknown => 0,
            Format::R16_UINT | Format::D16_UNORM => 2,
            Format::R8G8B8A8_UNORM
            | Format::R8G8B8A8_UNORM_SRGB
            | Format::B8G8R8A8_UNORM
            | Format::R10G10B10A2_UNORM
            | Format::R32_FLOAT
            | Format::R32_UINT
            | Format::D24_UNORM_S8_UINT
            | Format::D32_FLOAT => 4,
            Format::R16G16B16A16_FLOAT | Format::R32G32_FLOAT => 8,
            Format::R32G32B32_FLOAT => 12,
            Format::R32G32B32A32_FLOAT => 16,
        }
    }

    /// Whether this is a depth(-stencil) format
    pub fn is_depth(&self) -> bool {
        matches!(self, Format::D16_UNORM | Format::D24_UNORM_S8_UINT | Format::D32_FLOAT)
    }

    /// Whether the depth format carries a stencil component
    pub fn has_stencil(&self) -> bool {
        matches!(self, Format::D24_UNORM_S8_UINT)
    }

    /// Whether the format can be used for an index buffer
    pub fn is_index(&self) -> bool {
        matches!(self, Format::R16_UINT | Format::R32_UINT)
    }
}

// ===== FLAGS =====

bitflags! {
    /// How a resource may be bound to the pipeline
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BindFlags: u32 {
        const VERTEX_BUFFER    = 1 << 0;
        const INDEX_BUFFER     = 1 << 1;
        const CONSTANT_BUFFER  = 1 << 2;
        const SHADER_RESOURCE  = 1 << 3;
        const STREAM_OUTPUT    = 1 << 4;
        const RENDER_TARGET    = 1 << 5;
        const DEPTH_STENCIL    = 1 << 6;
        const UNORDERED_ACCESS = 1 << 7;
    }
}

bitflags! {
    /// Which parts of a depth-stencil target to clear
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        const DEPTH   = 1 << 0;
        const STENCIL = 1 << 1;
    }
}

bitflags! {
    /// Render target channels written by the blend stage
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorWriteMask: u8 {
        const RED   = 1 << 0;
        const GREEN = 1 << 1;
        const BLUE  = 1 << 2;
        const ALPHA = 1 << 3;
        const ALL   = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits() | Self::ALPHA.bits();
    }
}

/// Expected CPU/GPU access pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Usage {
    /// GPU read/write
    #[default]
    Default,
    /// GPU read only, contents fixed at creation
    Immutable,
    /// CPU write, GPU read (updated every frame)
    Dynamic,
    /// CPU read back
    Staging,
}

// ===== BUFFER =====

/// Descriptor for creating a buffer
#[derive(Debug, Clone, PartialEq)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    /// Access pattern
    pub usage: Usage,
    /// Bind flags
    pub bind: BindFlags,
    /// Element stride in bytes (vertex / structured buffers)
    pub stride: u32,
    /// Optional initial contents (must not exceed `size`)
    pub initial_data: Option<Vec<u8>>,
}

impl BufferDesc {
    /// Immutable vertex buffer filled with `vertices`
    pub fn vertex<T: Pod>(vertices: &[T]) -> Self {
        let bytes: &[u8] = bytemuck::cast_slice(vertices);
        Self {
            size: bytes.len() as u64,
            usage: Usage::Immutable,
            bind: BindFlags::VERTEX_BUFFER,
            stride: std::mem::size_of::<T>() as u32,
            initial_data: Some(bytes.to_vec()),
        }
    }

    /// Immutable 16-bit index buffer
    pub fn index_u16(indices: &[u16]) -> Self {
        Self::index_bytes(bytemuck::cast_slice(indices), 2)
    }

    /// Immutable 32-bit index buffer
    pub fn index_u32(indices: &[u32]) -> Self {
        Self::index_bytes(bytemuck::cast_slice(indices), 4)
    }

    fn index_bytes(bytes: &[u8], stride: u32) -> Self {
        Self {
            size: bytes.len() as u64,
            usage: Usage::Immutable,
            bind: BindFlags::INDEX_BUFFER,
            stride,
            initial_data: Some(bytes.to_vec()),
        }
    }

    /// Dynamic constant buffer of `size` bytes
    pub fn constant(size: u64) -> Self {
        Self {
            size,
            usage: Usage::Dynamic,
            bind: BindFlags::CONSTANT_BUFFER,
            stride: 0,
            initial_data: None,
        }
    }

    /// Copy of this descriptor without the initial contents (kept as metadata)
    pub fn without_data(&self) -> Self {
        Self { initial_data: None, ..self.clone() }
    }
}

// ===== TEXTURE =====

/// Descriptor for creating a 2D texture (or texture array)
#[derive(Debug, Clone, PartialEq)]
pub struct Texture2dDesc {
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub array_size: u32,
    pub format: Format,
    pub sample_count: u32,
    pub usage: Usage,
    pub bind: BindFlags,
    /// Optional initial contents for mip 0 of every layer, tightly packed
    pub initial_data: Option<Vec<u8>>,
}

impl Texture2dDesc {
    /// Color render target that can also be sampled
    pub fn render_target(width: u32, height: u32, format: Format) -> Self {
        Self {
            width,
            height,
            mip_levels: 1,
            array_size: 1,
            format,
            sample_count: 1,
            usage: Usage::Default,
            bind: BindFlags::RENDER_TARGET | BindFlags::SHADER_RESOURCE,
            initial_data: None,
        }
    }

    /// 24-bit depth + 8-bit stencil buffer
    pub fn depth_buffer(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            mip_levels: 1,
            array_size: 1,
            format: Format::D24_UNORM_S8_UINT,
            sample_count: 1,
            usage: Usage::Default,
            bind: BindFlags::DEPTH_STENCIL,
            initial_data: None,
        }
    }

    /// Immutable sampled texture with initial pixels
    pub fn sampled(width: u32, height: u32, format: Format, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            mip_levels: 1,
            array_size: 1,
            format,
            sample_count: 1,
            usage: Usage::Immutable,
            bind: BindFlags::SHADER_RESOURCE,
            initial_data: Some(pixels),
        }
    }

    /// Copy of this descriptor without the initial contents
    pub fn without_data(&self) -> Self {
        Self { initial_data: None, ..self.clone() }
    }
}

// ===== VIEWS =====

/// Kind of view created over a texture or buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    ShaderResource,
    RenderTarget,
    DepthStencil,
    UnorderedAccess,
}

impl ViewKind {
    /// Bind flag the parent resource must carry for this view
    pub fn required_bind_flag(&self) -> BindFlags {
        match self {
            ViewKind::ShaderResource => BindFlags::SHADER_RESOURCE,
            ViewKind::RenderTarget => BindFlags::RENDER_TARGET,
            ViewKind::DepthStencil => BindFlags::DEPTH_STENCIL,
            ViewKind::UnorderedAccess => BindFlags::UNORDERED_ACCESS,
        }
    }
}

/// Descriptor for creating a view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewDesc {
    pub kind: ViewKind,
    /// View format, `None` to inherit the resource format
    pub format: Option<Format>,
    pub mip_slice: u32,
}

impl ViewDesc {
    pub fn new(kind: ViewKind) -> Self {
        Self { kind, format: None, mip_slice: 0 }
    }
}

// ===== STATE OBJECTS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Filter {
    Point,
    #[default]
    Linear,
    Anisotropic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    #[default]
    Wrap,
    Mirror,
    Clamp,
    Border,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ComparisonFunc {
    Never,
    #[default]
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// Descriptor for a sampler state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerDesc {
    pub filter: Filter,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    pub address_w: AddressMode,
    pub mip_lod_bias: f32,
    pub max_anisotropy: u32,
    pub comparison: ComparisonFunc,
    pub border_color: [f32; 4],
    pub min_lod: f32,
    pub max_lod: f32,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            filter: Filter::Linear,
            address_u: AddressMode::Clamp,
            address_v: AddressMode::Clamp,
            address_w: AddressMode::Clamp,
            mip_lod_bias: 0.0,
            max_anisotropy: 1,
            comparison: ComparisonFunc::Never,
            border_color: [0.0; 4],
            min_lod: 0.0,
            max_lod: f32::MAX,
        }
    }
}

impl SamplerDesc {
    /// Wrapping anisotropic sampler
    pub fn anisotropic(max_anisotropy: u32) -> Self {
        Self {
            filter: Filter::Anisotropic,
            address_u: AddressMode::Wrap,
            address_v: AddressMode::Wrap,
            address_w: AddressMode::Wrap,
            max_anisotropy,
            comparison: ComparisonFunc::Always,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    Wireframe,
    #[default]
    Solid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    None,
    Front,
    #[default]
    Back,
}

/// Descriptor for a rasterizer state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizerDesc {
    pub fill_mode: FillMode,
    pub cull_mode: CullMode,
    pub front_counter_clockwise: bool,
    pub depth_bias: i32,
    pub slope_scaled_depth_bias: f32,
    pub depth_clip_enable: bool,
    pub scissor_enable: bool,
    pub multisample_enable: bool,
}

impl Default for RasterizerDesc {
    fn default() -> Self {
        Self {
            fill_mode: FillMode::Solid,
            cull_mode: CullMode::Back,
            front_counter_clockwise: false,
            depth_bias: 0,
            slope_scaled_depth_bias: 0.0,
            depth_clip_enable: true,
            scissor_enable: false,
            multisample_enable: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Blend {
    Zero,
    One,
    SrcColor,
    InvSrcColor,
    SrcAlpha,
    InvSrcAlpha,
    DestAlpha,
    InvDestAlpha,
    BlendFactor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOp {
    Add,
    Subtract,
    RevSubtract,
    Min,
    Max,
}

/// Descriptor for a blend state (same blend for every render target)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendDesc {
    pub alpha_to_coverage: bool,
    pub blend_enable: bool,
    pub src_blend: Blend,
    pub dest_blend: Blend,
    pub blend_op: BlendOp,
    pub src_blend_alpha: Blend,
    pub dest_blend_alpha: Blend,
    pub blend_op_alpha: BlendOp,
    pub write_mask: ColorWriteMask,
}

impl Default for BlendDesc {
    fn default() -> Self {
        Self {
            alpha_to_coverage: false,
            blend_enable: false,
            src_blend: Blend::One,
            dest_blend: Blend::Zero,
            blend_op: BlendOp::Add,
            src_blend_alpha: Blend::One,
            dest_blend_alpha: Blend::Zero,
            blend_op_alpha: BlendOp::Add,
            write_mask: ColorWriteMask::ALL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    IncrSat,
    DecrSat,
    Invert,
    Incr,
    Decr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilFaceDesc {
    pub fail: StencilOp,
    pub depth_fail: StencilOp,
    pub pass: StencilOp,
    pub func: ComparisonFunc,
}

impl Default for StencilFaceDesc {
    fn default() -> Self {
        Self {
            fail: StencilOp::Keep,
            depth_fail: StencilOp::Keep,
            pass: StencilOp::Keep,
            func: ComparisonFunc::Always,
        }
    }
}

/// Descriptor for a depth-stencil state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilDesc {
    pub depth_enable: bool,
    pub depth_write: bool,
    pub depth_func: ComparisonFunc,
    pub stencil_enable: bool,
    pub stencil_read_mask: u8,
    pub stencil_write_mask: u8,
    pub front_face: StencilFaceDesc,
    pub back_face: StencilFaceDesc,
}

impl Default for DepthStencilDesc {
    fn default() -> Self {
        Self {
            depth_enable: true,
            depth_write: true,
            depth_func: ComparisonFunc::Less,
            stencil_enable: false,
            stencil_read_mask: 0xFF,
            stencil_write_mask: 0xFF,
            front_face: StencilFaceDesc::default(),
            back_face: StencilFaceDesc::default(),
        }
    }
}

impl DepthStencilDesc {
    /// No depth test, stencil always passes and writes the reference value
    pub fn stencil_write() -> Self {
        let face = StencilFaceDesc {
            fail: StencilOp::Keep,
            depth_fail: StencilOp::Keep,
            pass: StencilOp::Replace,
            func: ComparisonFunc::Always,
        };
        Self {
            depth_enable: false,
            depth_write: false,
            depth_func: ComparisonFunc::Always,
            stencil_enable: true,
            front_face: face,
            back_face: face,
            ..Self::default()
        }
    }
}

// ===== SHADERS & INPUT LAYOUT =====

/// Programmable pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Hull,
    Domain,
    Geometry,
    Pixel,
    Compute,
}

impl ShaderStage {
    /// All shader stages in pipeline order
    pub const ALL: [ShaderStage; 6] = [
        ShaderStage::Vertex,
        ShaderStage::Hull,
        ShaderStage::Domain,
        ShaderStage::Geometry,
        ShaderStage::Pixel,
        ShaderStage::Compute,
    ];

    /// Position in `ShaderStage::ALL`
    pub fn index(&self) -> usize {
        match self {
            ShaderStage::Vertex => 0,
            ShaderStage::Hull => 1,
            ShaderStage::Domain => 2,
            ShaderStage::Geometry => 3,
            ShaderStage::Pixel => 4,
            ShaderStage::Compute => 5,
        }
    }
}

/// Descriptor for a compiled shader program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderDesc {
    pub stage: ShaderStage,
    /// Compiled bytecode
    pub bytecode: Vec<u8>,
    pub entry_point: String,
}

/// One element of a vertex input layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputElement {
    pub semantic: String,
    pub semantic_index: u32,
    pub format: Format,
    pub input_slot: u32,
    pub byte_offset: u32,
}

/// Descriptor for a vertex input layout
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputLayoutDesc {
    pub elements: Vec<InputElement>,
}

// ===== SWAP CHAIN =====

/// Descriptor for a swap chain
#[derive(Debug, Clone, PartialEq)]
pub struct SwapChainDesc {
    /// Back buffer size in pixels
    pub size: PhysicalSize<u32>,
    pub format: Format,
    pub buffer_count: u32,
    pub windowed: bool,
    /// Output window, `None` for headless presentation
    pub window: Option<WindowId>,
}

impl SwapChainDesc {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: PhysicalSize::new(width, height),
            format: Format::R8G8B8A8_UNORM,
            buffer_count: 2,
            windowed: true,
            window: None,
        }
    }
}

// ===== FIXED-FUNCTION STATE =====

/// Viewport rectangle and depth range
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Viewport covering a whole `width` x `height` target, depth [0, 1]
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// Scissor rectangle in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScissorRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// Primitive topology for the input assembler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    #[default]
    Undefined,
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
}

/// Index element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexFormat {
    #[default]
    U16,
    U32,
}

impl IndexFormat {
    pub fn size_bytes(&self) -> u32 {
        match self {
            IndexFormat::U16 => 2,
            IndexFormat::U32 => 4,
        }
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
