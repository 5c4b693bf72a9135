/// Desired/current state building blocks shared by every stage.
///
/// Each stage keeps two records of its bindings: `desired` (what the next
/// draw needs, written by `set_*`) and `current` (what the device context
/// has bound). Apply diffs the two and issues calls only for changed slots.

use std::ops::Range;
use slotmap::Key;
use crate::error::Error;
use crate::pipeline::StageKind;
use crate::registry::{ResourceRegistry, ResourceHandle};
use crate::engine_report;

// ============================================================================
// SlotArray
// ============================================================================

/// Fixed-capacity array of bindable slots with per-slot dirty flags
#[derive(Debug, Clone)]
pub struct SlotArray<T, const N: usize> {
    desired: [T; N],
    current: [T; N],
    dirty: [bool; N],
    /// Re-bind even when desired equals current
    forced: [bool; N],
}

impl<T: Copy + PartialEq + Default, const N: usize> Default for SlotArray<T, N> {
    fn default() -> Self {
        Self {
            desired: [T::default(); N],
            current: [T::default(); N],
            dirty: [false; N],
            forced: [false; N],
        }
    }
}

impl<T: Copy + PartialEq + Default, const N: usize> SlotArray<T, N> {
    pub const CAPACITY: usize = N;

    /// Write the desired value of `slot` and mark it dirty
    ///
    /// # Errors
    ///
    /// `SlotRange` when `slot >= N`. Nothing is written.
    pub fn set(&mut self, stage: StageKind, slot: usize, value: T) -> Result<(), Error> {
        if slot >= N {
            return Err(engine_report!("lumen3d::Pipeline", Error::SlotRange {
                stage,
                slot,
                capacity: N,
            }));
        }
        self.desired[slot] = value;
        self.dirty[slot] = true;
        Ok(())
    }

    /// Desired value of `slot`
    pub fn get(&self, slot: usize) -> Option<T> {
        self.desired.get(slot).copied()
    }

    /// Value the device context has bound in `slot`
    pub fn current(&self, slot: usize) -> Option<T> {
        self.current.get(slot).copied()
    }

    pub fn desired(&self) -> &[T] {
        &self.desired
    }

    pub fn is_dirty(&self, slot: usize) -> bool {
        self.dirty.get(slot).copied().unwrap_or(false)
    }

    pub fn any_dirty(&self) -> bool {
        self.dirty.iter().any(|d| *d)
    }

    fn changed(&self, slot: usize) -> bool {
        self.dirty[slot] && (self.forced[slot] || self.desired[slot] != self.current[slot])
    }

    /// Maximal runs of adjacent dirty slots whose desired value differs from
    /// the current one. Each run is bound with one ranged call.
    pub fn changed_runs(&self) -> Vec<Range<usize>> {
        let mut runs = Vec::new();
        let mut start: Option<usize> = None;
        for slot in 0..N {
            match (self.changed(slot), start) {
                (true, None) => start = Some(slot),
                (false, Some(s)) => {
                    runs.push(s..slot);
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            runs.push(s..N);
        }
        runs
    }

    /// Whether any slot below `limit` would need a device call
    pub fn has_changes_below(&self, limit: usize) -> bool {
        (0..limit.min(N)).any(|slot| self.changed(slot))
    }

    /// Record `range` as bound: current := desired, dirty cleared
    pub fn commit(&mut self, range: Range<usize>) {
        for slot in range {
            self.current[slot] = self.desired[slot];
            self.dirty[slot] = false;
            self.forced[slot] = false;
        }
    }

    /// Commit every slot (dirty slots equal to current need no call)
    pub fn commit_all(&mut self) {
        self.commit(0..N);
    }

    /// Reset desired values to the defaults (unbound)
    pub fn reset_desired(&mut self) {
        for slot in 0..N {
            if self.desired[slot] != T::default() {
                self.desired[slot] = T::default();
                self.dirty[slot] = true;
            }
        }
    }

    /// The context's bindings are back to defaults and must be re-applied
    pub fn invalidate_current(&mut self) {
        self.current = [T::default(); N];
        self.dirty = [true; N];
    }

    /// Force the next apply to re-bind every slot whose bound value
    /// `is_stale` rejects. Returns the number of slots marked.
    pub fn mark_stale(&mut self, is_stale: impl Fn(&T) -> bool) -> usize {
        let mut marked = 0;
        for slot in 0..N {
            if is_stale(&self.current[slot]) {
                self.dirty[slot] = true;
                self.forced[slot] = true;
                marked += 1;
            }
        }
        marked
    }

    /// Both records back to defaults, nothing dirty
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// Tracked
// ============================================================================

/// A single piece of scalar state with a dirty flag
#[derive(Debug, Clone, Default)]
pub struct Tracked<T> {
    desired: T,
    current: T,
    dirty: bool,
    forced: bool,
}

impl<T: Clone + PartialEq + Default> Tracked<T> {
    pub fn set(&mut self, value: T) {
        self.desired = value;
        self.dirty = true;
    }

    pub fn get(&self) -> &T {
        &self.desired
    }

    pub fn current(&self) -> &T {
        &self.current
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Dirty and different from what is bound, or marked stale
    pub fn changed(&self) -> bool {
        self.dirty && (self.forced || self.desired != self.current)
    }

    pub fn commit(&mut self) {
        self.current = self.desired.clone();
        self.dirty = false;
        self.forced = false;
    }

    pub fn reset_desired(&mut self) {
        if self.desired != T::default() {
            self.desired = T::default();
            self.dirty = true;
        }
    }

    pub fn invalidate_current(&mut self) {
        self.current = T::default();
        self.dirty = true;
    }

    /// Force a re-bind if `is_stale` rejects the bound value
    pub fn mark_stale(&mut self, is_stale: impl Fn(&T) -> bool) -> bool {
        let stale = is_stale(&self.current);
        if stale {
            self.dirty = true;
            self.forced = true;
        }
        stale
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// Apply errors
// ============================================================================

/// Wrap a resolve or bind failure into `PipelineState`.
///
/// Device loss is passed through unchanged so the renderer can recover.
pub(crate) fn stage_error(stage: StageKind, slot: Option<usize>, err: Error) -> Error {
    if err.is_device_lost() {
        return err;
    }
    Error::PipelineState {
        stage,
        slot,
        reason: err.to_string(),
    }
}

/// A bound handle that no longer resolves: destroyed, or from a lost device
pub(crate) fn is_stale_handle(registry: &ResourceRegistry, handle: ResourceHandle) -> bool {
    !handle.is_null() && !registry.contains(handle)
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
