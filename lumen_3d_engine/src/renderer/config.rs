/// Renderer configuration

/// Frames a destroyed resource stays alive before its native object is
/// released
pub const DEFAULT_FRAME_LATENCY: u32 = 2;

/// Renderer configuration
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Application name
    pub app_name: String,
    /// Enable validation/debug layers
    pub enable_validation: bool,
    /// Frames between `destroy` and the physical release of a resource
    pub frame_latency: u32,
    /// Vertical blanks to wait for in `present` (0 = no vsync)
    pub sync_interval: u32,
    /// Retry with the reference driver when a hardware device cannot be created
    pub fallback_to_reference: bool,
    /// Panic on invalid handles and out-of-range slots instead of returning
    /// the error. On by default in debug builds.
    pub panic_on_programmer_error: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            app_name: "Lumen3D Application".to_string(),
            enable_validation: cfg!(debug_assertions),
            frame_latency: DEFAULT_FRAME_LATENCY,
            sync_interval: 0,
            fallback_to_reference: true,
            panic_on_programmer_error: cfg!(debug_assertions),
        }
    }
}
