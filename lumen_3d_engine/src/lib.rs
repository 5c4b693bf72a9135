/*!
# Lumen 3D Engine

Pipeline state tracking and resource management layer for a real-time 3D renderer.

The crate sits between application code and a graphics device. Applications
create GPU resources through the [`Renderer`](renderer::Renderer), receive
opaque handles, and describe the state they want bound for the next draw.
The pipeline manager diffs that desired state against what the device context
already has bound and issues only the binding calls that changed.

## Architecture

- **ResourceRegistry**: owns GPU resource records behind generational handles,
  defers physical release by the frame latency
- **Stage state blocks**: desired/current records per pipeline stage
- **PipelineManager**: diff-and-apply against one device context
- **RenderView**: closed set of pass kinds (forward, G-buffer)
- **Renderer**: explicit top-level context, device creation with fallback
- **GraphicsDevice / DeviceContext**: device boundary, with a software
  reference device shipped in-crate
*/

// Internal modules
mod error;
pub mod log;
pub mod utils;
pub mod device;
pub mod registry;
pub mod pipeline;
pub mod view;
pub mod renderer;

// Main lumen3d namespace module
pub mod lumen3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Top-level context
    pub use crate::renderer::{
        Renderer, RendererConfig, PresentStatus, SwapChainId, DeferredPipelineId,
        TextureImage, DEFAULT_FRAME_LATENCY,
    };

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{
            Logger, LogEntry, LogSeverity, DefaultLogger,
            set_logger, reset_logger, set_max_verbosity,
        };
    }

    // Device boundary
    pub mod device {
        pub use crate::device::*;
    }

    // Resource registry
    pub mod registry {
        pub use crate::registry::*;
    }

    // Pipeline state
    pub mod pipeline {
        pub use crate::pipeline::*;
    }

    // Render views, effects and parameters
    pub mod view {
        pub use crate::view::*;
    }
}

// Re-export math library at crate root
pub use glam;
