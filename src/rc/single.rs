//! Unsynchronized counter for components that stay on one thread.

use core::cell::Cell;

use super::RefCountPolicy;

/// Plain counter with no synchronization.
///
/// `Send` but not `Sync`: it can move with its component, but two threads
/// can never count on it at once.
#[derive(Debug)]
pub struct SingleThreadRc {
    count: Cell<u32>,
}

impl SingleThreadRc {
    /// A counter holding the creator's reference.
    pub const fn new() -> Self {
        Self {
            count: Cell::new(1),
        }
    }
}

impl Default for SingleThreadRc {
    fn default() -> Self {
        Self::new()
    }
}

impl RefCountPolicy for SingleThreadRc {
    #[inline]
    fn add_ref(&self) -> u32 {
        let prev = self.count.get();
        debug_assert!(prev > 0, "add_ref on a released counter");
        debug_assert!(prev < u32::MAX, "reference count overflow");
        self.count.set(prev.wrapping_add(1));
        prev
    }

    #[inline]
    fn remove_ref(&self) -> u32 {
        let prev = self.count.get();
        debug_assert!(prev > 0, "remove_ref on a released counter");
        self.count.set(prev.wrapping_sub(1));
        prev
    }

    #[inline]
    fn no_refs(&self) -> bool {
        self.count.get() == 0
    }

    #[inline]
    fn refs_count(&self) -> u32 {
        self.count.get()
    }
}
