//! Single-thread counter that checks its caller's thread.

use core::cell::Cell;
use std::thread::{self, ThreadId};

use super::RefCountPolicy;

/// [`SingleThreadRc`](super::SingleThreadRc) plus an owner check.
///
/// Records the thread that created it; in debug builds every operation
/// asserts it runs on that thread. Release builds skip the check, leaving
/// the same cost as the unchecked counter.
#[derive(Debug)]
pub struct StrictSingleThreadRc {
    count: Cell<u32>,
    owner: ThreadId,
}

impl StrictSingleThreadRc {
    /// A counter holding the creator's reference, owned by the calling
    /// thread.
    pub fn new() -> Self {
        Self {
            count: Cell::new(1),
            owner: thread::current().id(),
        }
    }

    /// Thread the counter belongs to.
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    #[inline]
    fn check_owner(&self) {
        debug_assert_eq!(
            thread::current().id(),
            self.owner,
            "reference counter used off its owning thread"
        );
    }
}

impl Default for StrictSingleThreadRc {
    fn default() -> Self {
        Self::new()
    }
}

impl RefCountPolicy for StrictSingleThreadRc {
    fn add_ref(&self) -> u32 {
        self.check_owner();
        let prev = self.count.get();
        debug_assert!(prev > 0, "add_ref on a released counter");
        debug_assert!(prev < u32::MAX, "reference count overflow");
        self.count.set(prev.wrapping_add(1));
        prev
    }

    fn remove_ref(&self) -> u32 {
        self.check_owner();
        let prev = self.count.get();
        debug_assert!(prev > 0, "remove_ref on a released counter");
        self.count.set(prev.wrapping_sub(1));
        prev
    }

    fn no_refs(&self) -> bool {
        self.check_owner();
        self.count.get() == 0
    }

    fn refs_count(&self) -> u32 {
        self.check_owner();
        self.count.get()
    }
}
