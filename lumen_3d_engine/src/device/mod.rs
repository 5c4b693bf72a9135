/// Graphics device boundary
///
/// Descriptors, the device and context traits, and the software reference
/// device used when no hardware device is available.

mod types;
mod graphics_device;
mod reference_device;

#[cfg(test)]
pub mod mock_device;

pub use types::*;
pub use graphics_device::*;
pub use reference_device::*;
