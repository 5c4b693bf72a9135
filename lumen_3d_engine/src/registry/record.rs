/// Registry record types.

use std::fmt;
use crate::device::{
    NativeId, BufferDesc, Texture2dDesc, ViewDesc, ViewKind, SamplerDesc,
    RasterizerDesc, BlendDesc, DepthStencilDesc, InputLayoutDesc, ShaderStage,
};
use crate::registry::ResourceHandle;

/// What a registry record holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Buffer,
    Texture2d,
    ShaderResourceView,
    RenderTargetView,
    DepthStencilView,
    UnorderedAccessView,
    SamplerState,
    RasterizerState,
    BlendState,
    DepthStencilState,
    Shader(ShaderStage),
    InputLayout,
}

impl ResourceKind {
    /// Record kind of a view of `kind`
    pub fn of_view(kind: ViewKind) -> Self {
        match kind {
            ViewKind::ShaderResource => ResourceKind::ShaderResourceView,
            ViewKind::RenderTarget => ResourceKind::RenderTargetView,
            ViewKind::DepthStencil => ResourceKind::DepthStencilView,
            ViewKind::UnorderedAccess => ResourceKind::UnorderedAccessView,
        }
    }

    pub fn is_view(&self) -> bool {
        matches!(
            self,
            ResourceKind::ShaderResourceView
                | ResourceKind::RenderTargetView
                | ResourceKind::DepthStencilView
                | ResourceKind::UnorderedAccessView
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Buffer => f.write_str("buffer"),
            ResourceKind::Texture2d => f.write_str("texture 2D"),
            ResourceKind::ShaderResourceView => f.write_str("shader resource view"),
            ResourceKind::RenderTargetView => f.write_str("render target view"),
            ResourceKind::DepthStencilView => f.write_str("depth-stencil view"),
            ResourceKind::UnorderedAccessView => f.write_str("unordered access view"),
            ResourceKind::SamplerState => f.write_str("sampler state"),
            ResourceKind::RasterizerState => f.write_str("rasterizer state"),
            ResourceKind::BlendState => f.write_str("blend state"),
            ResourceKind::DepthStencilState => f.write_str("depth-stencil state"),
            ResourceKind::Shader(stage) => write!(f, "{:?} shader", stage),
            ResourceKind::InputLayout => f.write_str("input layout"),
        }
    }
}

/// Descriptive metadata kept with a record (initial data is not kept)
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceDesc {
    Buffer(BufferDesc),
    Texture2d(Texture2dDesc),
    View { parent: ResourceHandle, desc: ViewDesc },
    Sampler(SamplerDesc),
    Rasterizer(RasterizerDesc),
    Blend(BlendDesc),
    DepthStencil(DepthStencilDesc),
    Shader { stage: ShaderStage, entry_point: String },
    InputLayout(InputLayoutDesc),
}

impl ResourceDesc {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceDesc::Buffer(_) => ResourceKind::Buffer,
            ResourceDesc::Texture2d(_) => ResourceKind::Texture2d,
            ResourceDesc::View { desc, .. } => ResourceKind::of_view(desc.kind),
            ResourceDesc::Sampler(_) => ResourceKind::SamplerState,
            ResourceDesc::Rasterizer(_) => ResourceKind::RasterizerState,
            ResourceDesc::Blend(_) => ResourceKind::BlendState,
            ResourceDesc::DepthStencil(_) => ResourceKind::DepthStencilState,
            ResourceDesc::Shader { stage, .. } => ResourceKind::Shader(*stage),
            ResourceDesc::InputLayout(_) => ResourceKind::InputLayout,
        }
    }

    /// Parent resource of a view
    pub fn parent(&self) -> Option<ResourceHandle> {
        match self {
            ResourceDesc::View { parent, .. } => Some(*parent),
            _ => None,
        }
    }
}

/// Lifetime state of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Resolvable
    Live,
    /// Logically destroyed at `frame`, waiting for physical release
    Retired { frame: u64 },
}

/// A GPU resource owned by the registry
#[derive(Debug, Clone)]
pub struct ResourceRecord {
    pub native: NativeId,
    pub desc: ResourceDesc,
    pub name: Option<String>,
    pub(crate) state: RecordState,
    /// Views (live or retired) still referencing this resource
    pub(crate) view_refs: u32,
}

impl ResourceRecord {
    pub(crate) fn new(native: NativeId, desc: ResourceDesc) -> Self {
        Self {
            native,
            desc,
            name: None,
            state: RecordState::Live,
            view_refs: 0,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.desc.kind()
    }

    pub fn state(&self) -> RecordState {
        self.state
    }

    pub fn is_live(&self) -> bool {
        self.state == RecordState::Live
    }

    /// Number of views referencing this resource
    pub fn view_refs(&self) -> u32 {
        self.view_refs
    }
}
