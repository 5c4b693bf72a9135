/// Top-level renderer: device creation, swap chains and the frame loop

mod config;
mod texture_image;
mod renderer;

pub use config::{RendererConfig, DEFAULT_FRAME_LATENCY};
pub use texture_image::TextureImage;
pub use renderer::{Renderer, SwapChainId, DeferredPipelineId, PresentStatus};
