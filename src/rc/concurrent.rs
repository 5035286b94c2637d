//! Lock-free atomic counter, shareable across threads.

use core::sync::atomic::{AtomicU32, Ordering};

use super::RefCountPolicy;

/// Atomic reference counter.
///
/// Increments and decrements are acquire/release, so a thread that takes a
/// reference sees every write made before the reference it was handed was
/// taken. `acquire` (and so `try_add_ref`) is a compare-and-swap loop that
/// never moves the count off zero.
#[derive(Debug)]
pub struct ConcurrentRc {
    count: AtomicU32,
}

impl ConcurrentRc {
    /// A counter holding the creator's reference.
    pub const fn new() -> Self {
        Self {
            count: AtomicU32::new(1),
        }
    }
}

impl Default for ConcurrentRc {
    fn default() -> Self {
        Self::new()
    }
}

impl RefCountPolicy for ConcurrentRc {
    #[inline]
    fn add_ref(&self) -> u32 {
        let prev = self.count.fetch_add(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "add_ref on a released counter");
        debug_assert!(prev < u32::MAX, "reference count overflow");
        prev
    }

    #[inline]
    fn remove_ref(&self) -> u32 {
        let prev = self.count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "remove_ref on a released counter");
        prev
    }

    #[inline]
    fn no_refs(&self) -> bool {
        self.count.load(Ordering::Acquire) == 0
    }

    #[inline]
    fn refs_count(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    fn acquire(&self) -> Option<u32> {
        let mut current = self.count.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return None;
            }
            debug_assert!(current < u32::MAX, "reference count overflow");

            match self.count.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(prev) => return Some(prev),
                Err(observed) => current = observed,
            }
        }
    }
}
