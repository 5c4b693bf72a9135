/// Pipeline stage identifiers.

use std::fmt;
use crate::device::ShaderStage;

/// One stage of the graphics/compute pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    InputAssembler,
    Vertex,
    Hull,
    Domain,
    Geometry,
    Pixel,
    Compute,
    Rasterizer,
    OutputMerger,
}

impl StageKind {
    /// Order in which `apply_all` applies the stages
    pub const APPLY_ORDER: [StageKind; 9] = [
        StageKind::InputAssembler,
        StageKind::Vertex,
        StageKind::Hull,
        StageKind::Domain,
        StageKind::Geometry,
        StageKind::Pixel,
        StageKind::Compute,
        StageKind::Rasterizer,
        StageKind::OutputMerger,
    ];

    /// Programmable stage behind this kind, if any
    pub fn shader_stage(&self) -> Option<ShaderStage> {
        match self {
            StageKind::Vertex => Some(ShaderStage::Vertex),
            StageKind::Hull => Some(ShaderStage::Hull),
            StageKind::Domain => Some(ShaderStage::Domain),
            StageKind::Geometry => Some(ShaderStage::Geometry),
            StageKind::Pixel => Some(ShaderStage::Pixel),
            StageKind::Compute => Some(ShaderStage::Compute),
            StageKind::InputAssembler | StageKind::Rasterizer | StageKind::OutputMerger => None,
        }
    }
}

impl From<ShaderStage> for StageKind {
    fn from(stage: ShaderStage) -> Self {
        match stage {
            ShaderStage::Vertex => StageKind::Vertex,
            ShaderStage::Hull => StageKind::Hull,
            ShaderStage::Domain => StageKind::Domain,
            ShaderStage::Geometry => StageKind::Geometry,
            ShaderStage::Pixel => StageKind::Pixel,
            ShaderStage::Compute => StageKind::Compute,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageKind::InputAssembler => "input assembler",
            StageKind::Vertex => "vertex shader stage",
            StageKind::Hull => "hull shader stage",
            StageKind::Domain => "domain shader stage",
            StageKind::Geometry => "geometry shader stage",
            StageKind::Pixel => "pixel shader stage",
            StageKind::Compute => "compute shader stage",
            StageKind::Rasterizer => "rasterizer",
            StageKind::OutputMerger => "output merger",
        };
        f.write_str(name)
    }
}
