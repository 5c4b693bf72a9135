use super::*;

// ============================================================================
// Allocation
// ============================================================================

#[test]
fn test_sequential_alloc() {
    let mut ids = SlotAllocator::new();
    assert_eq!(ids.alloc(), 0);
    assert_eq!(ids.alloc(), 1);
    assert_eq!(ids.alloc(), 2);
    assert_eq!(ids.len(), 3);
}

#[test]
fn test_new_is_empty() {
    let ids = SlotAllocator::new();
    assert!(ids.is_empty());
    assert_eq!(ids.high_water_mark(), 0);
    assert!(!ids.is_allocated(0));
}

// ============================================================================
// Free and recycle
// ============================================================================

#[test]
fn test_free_recycles_lifo() {
    let mut ids = SlotAllocator::new();
    let a = ids.alloc();
    let _b = ids.alloc();
    let c = ids.alloc();
    assert!(ids.free(a));
    assert!(ids.free(c));

    // last freed = first recycled
    assert_eq!(ids.alloc(), c);
    assert_eq!(ids.alloc(), a);
    assert_eq!(ids.alloc(), 3);
}

#[test]
fn test_double_free_is_rejected() {
    let mut ids = SlotAllocator::new();
    let a = ids.alloc();
    assert!(ids.free(a));
    assert!(!ids.free(a));
    assert_eq!(ids.len(), 0);

    // A rejected free must not put the id on the free list twice
    let x = ids.alloc();
    let y = ids.alloc();
    assert_ne!(x, y);
}

#[test]
fn test_free_unknown_id() {
    let mut ids = SlotAllocator::new();
    assert!(!ids.free(7));
    assert!(ids.is_empty());
}

#[test]
fn test_high_water_mark_never_decreases() {
    let mut ids = SlotAllocator::new();
    ids.alloc();
    ids.alloc();
    ids.free(0);
    ids.free(1);
    assert_eq!(ids.high_water_mark(), 2);

    ids.alloc();
    ids.alloc();
    assert_eq!(ids.high_water_mark(), 2);
    ids.alloc();
    assert_eq!(ids.high_water_mark(), 3);
}

#[test]
fn test_iter_lists_live_ids() {
    let mut ids = SlotAllocator::new();
    for _ in 0..5 {
        ids.alloc();
    }
    ids.free(1);
    ids.free(3);
    assert_eq!(ids.iter().collect::<Vec<_>>(), vec![0, 2, 4]);
    assert!(ids.is_allocated(2));
    assert!(!ids.is_allocated(3));
}
