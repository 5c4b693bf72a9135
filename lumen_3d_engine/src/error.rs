//! Error types for the Lumen3D engine
//!
//! This module defines the error type used throughout the engine, covering
//! device creation, resource creation, handle validation, pipeline application
//! and render view lifecycle.

use std::fmt;
use crate::pipeline::StageKind;

/// Result type for Lumen3D engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Lumen3D engine errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (device driver, reference device, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (wrong kind, missing parent, bad data)
    InvalidResource(String),

    /// Initialization failed (device, renderer, subsystems)
    InitializationFailed(String),

    /// The device rejected a resource descriptor.
    ///
    /// Recoverable: the caller may retry with adjusted parameters
    /// or substitute a placeholder resource.
    ResourceCreation(String),

    /// A handle is null, stale, out of range or already destroyed
    InvalidHandle(String),

    /// A stage slot index is outside the stage's capacity
    SlotRange {
        stage: StageKind,
        slot: usize,
        capacity: usize,
    },

    /// Applying a stage to the device context failed.
    ///
    /// Stages applied before the failing one are not rolled back.
    PipelineState {
        stage: StageKind,
        slot: Option<usize>,
        reason: String,
    },

    /// A render view was drawn or updated before its targets were set
    UnconfiguredView(String),

    /// Operation not valid in the current lifecycle state
    InvalidOperation(String),

    /// The graphics device was removed or reset
    DeviceLost(String),
}

impl Error {
    /// Programmer errors: misuse of handles or slot indices.
    ///
    /// These are reported and turned into no-ops, unless the renderer is
    /// configured to escalate them.
    pub fn is_programmer_error(&self) -> bool {
        matches!(self, Error::InvalidHandle(_) | Error::SlotRange { .. })
    }

    /// Whether this error means the device must be re-created
    pub fn is_device_lost(&self) -> bool {
        matches!(self, Error::DeviceLost(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::ResourceCreation(msg) => write!(f, "Resource creation failed: {}", msg),
            Error::InvalidHandle(msg) => write!(f, "Invalid handle: {}", msg),
            Error::SlotRange { stage, slot, capacity } => write!(
                f,
                "Slot {} out of range for {} (capacity {})",
                slot, stage, capacity
            ),
            Error::PipelineState { stage, slot: Some(slot), reason } => write!(
                f,
                "Pipeline state error in {} slot {}: {}",
                stage, slot, reason
            ),
            Error::PipelineState { stage, slot: None, reason } => write!(
                f,
                "Pipeline state error in {}: {}",
                stage, reason
            ),
            Error::UnconfiguredView(msg) => write!(f, "Render view not configured: {}", msg),
            Error::InvalidOperation(msg) => write!(f, "Invalid operation: {}", msg),
            Error::DeviceLost(msg) => write!(f, "Device lost: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ===== ERROR MACROS =====

/// Build a `BackendError`, logging it as an ERROR first
///
/// # Example
///
/// ```ignore
/// let err = engine_err!("lumen3d::Registry", "slot {} is busy", slot);
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::lumen3d::Error::BackendError(message)
    }};
}

/// Log and return a `BackendError` from the current function
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

/// Log an already-built error and evaluate to it
///
/// # Example
///
/// ```ignore
/// return Err(engine_report!("lumen3d::Registry", Error::InvalidHandle(msg)));
/// ```
#[macro_export]
macro_rules! engine_report {
    ($source:expr, $error:expr) => {{
        let error = $error;
        $crate::engine_error!($source, "{}", error);
        error
    }};
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
