/// Allocates and recycles small `u32` identifiers.
///
/// Used by the renderer for swap chain and deferred context ids: values
/// that index a `Vec` directly and are few enough that generations are not
/// worth carrying. Freed ids are recycled LIFO.
///
/// # Example
///
/// ```ignore
/// let mut ids = SlotAllocator::new();
/// let a = ids.alloc();   // 0
/// let b = ids.alloc();   // 1
/// ids.free(a);           // true
/// ids.free(a);           // false, already free
/// let c = ids.alloc();   // 0 (recycled)
/// ```
#[derive(Debug, Default)]
pub struct SlotAllocator {
    free_list: Vec<u32>,
    live: Vec<bool>,
    len: u32,
}

impl SlotAllocator {
    /// Create a new empty allocator
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next available id
    pub fn alloc(&mut self) -> u32 {
        self.len += 1;
        match self.free_list.pop() {
            Some(id) => {
                self.live[id as usize] = true;
                id
            }
            None => {
                self.live.push(true);
                (self.live.len() - 1) as u32
            }
        }
    }

    /// Return an id to the pool.
    ///
    /// Returns false when the id was never allocated or is already free.
    pub fn free(&mut self, id: u32) -> bool {
        match self.live.get_mut(id as usize) {
            Some(live) if *live => {
                *live = false;
                self.len -= 1;
                self.free_list.push(id);
                true
            }
            _ => false,
        }
    }

    /// Whether `id` is currently allocated
    pub fn is_allocated(&self, id: u32) -> bool {
        self.live.get(id as usize).copied().unwrap_or(false)
    }

    /// Highest id ever allocated + 1 (minimum backing storage length)
    pub fn high_water_mark(&self) -> u32 {
        self.live.len() as u32
    }

    /// Number of currently allocated ids
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Whether no ids are currently allocated
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over the allocated ids in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.live
            .iter()
            .enumerate()
            .filter(|(_, live)| **live)
            .map(|(id, _)| id as u32)
    }
}

#[cfg(test)]
#[path = "slot_allocator_tests.rs"]
mod tests;
