/// Opaque resource handles.
///
/// Handles are generational `slotmap` keys: a slot is only recycled after its
/// record has been physically released, and recycling bumps the slot version,
/// so a stale handle never resolves to a newer record.

use std::fmt;
use slotmap::{new_key_type, Key, KeyData};

// ===== SLOT MAP KEY =====

new_key_type! {
    /// Stable handle of a record in the `ResourceRegistry`.
    ///
    /// `ResourceHandle::default()` is the null handle ("unset"). Binding the
    /// null handle to a pipeline slot unbinds that slot.
    pub struct ResourceHandle;
}

impl ResourceHandle {
    /// Raw 64-bit form (logging, FFI)
    pub fn to_raw(self) -> u64 {
        self.data().as_ffi()
    }

    /// Rebuild a handle from `to_raw` output
    pub fn from_raw(raw: u64) -> Self {
        KeyData::from_ffi(raw).into()
    }
}

// ===== VIEWPORT ID =====

/// Index of an immutable viewport record in the registry's viewport table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewportId(pub(crate) u32);

impl ViewportId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ViewportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "viewport#{}", self.0)
    }
}

// ===== RESOURCE PROXY =====

/// A texture together with the views its bind flags asked for.
///
/// Views the bind flags did not request are null handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResourceProxy {
    pub resource: ResourceHandle,
    pub rtv: ResourceHandle,
    pub dsv: ResourceHandle,
    pub srv: ResourceHandle,
    pub uav: ResourceHandle,
}

impl ResourceProxy {
    /// Proxy for a resource without views (buffers, states)
    pub fn single(resource: ResourceHandle) -> Self {
        Self { resource, ..Self::default() }
    }

    /// Non-null view handles
    pub fn views(&self) -> impl Iterator<Item = ResourceHandle> {
        [self.rtv, self.dsv, self.srv, self.uav]
            .into_iter()
            .filter(|h| !h.is_null())
    }
}
