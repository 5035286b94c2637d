//! Reference-Count Policies
//!
//! Interchangeable lifetime counters, selected per component type.
//!
//! # Design
//! - Every counter starts at 1: the creator holds the first reference
//! - `add_ref` / `remove_ref` return the *previous* count
//! - Counters never destroy anything; whoever saw `remove_ref() == 1`
//!   released the last reference and owns the teardown (for a counted
//!   instance that is its block header)
//!
//! # Policies
//! ```text
//! ┌──────────────────────┬────────────┬──────────────────────────────┐
//! │ Policy               │ Sharing    │ Checks                       │
//! ├──────────────────────┼────────────┼──────────────────────────────┤
//! │ ConcurrentRc         │ Send+Sync  │ underflow (debug)            │
//! │ SingleThreadRc       │ Send       │ underflow (debug)            │
//! │ StrictSingleThreadRc │ Send       │ underflow, owner (debug)     │
//! └──────────────────────┴────────────┴──────────────────────────────┘
//! ```
//!
//! Precondition violations (counting on a dead counter, calling from the
//! wrong thread) are defects: debug builds assert, release builds do not
//! check.

mod concurrent;
mod single;
#[cfg(feature = "std")]
mod strict;

pub use concurrent::ConcurrentRc;
pub use single::SingleThreadRc;
#[cfg(feature = "std")]
pub use strict::StrictSingleThreadRc;

/// The counter contract shared by all policies.
pub trait RefCountPolicy: Default {
    /// Add a reference, returning the previous count.
    fn add_ref(&self) -> u32;

    /// Remove a reference, returning the previous count.
    fn remove_ref(&self) -> u32;

    /// Whether the count reached zero.
    fn no_refs(&self) -> bool;

    /// Current count. Only a snapshot under concurrent use.
    fn refs_count(&self) -> u32;

    /// Add a reference only while the count is nonzero, returning the
    /// previous count.
    ///
    /// Check-then-act: only sound when no other thread can touch the
    /// counter, which holds for the `!Sync` policies. `ConcurrentRc`
    /// overrides it with a compare-and-swap.
    fn acquire(&self) -> Option<u32> {
        if self.no_refs() {
            return None;
        }

        Some(self.add_ref())
    }

    /// Add a reference only while the count is nonzero.
    #[inline]
    fn try_add_ref(&self) -> bool {
        self.acquire().is_some()
    }
}

/// Promote a non-owning observation to a reference, failing once the
/// count has reached zero.
#[inline]
pub fn try_add_ref<R: RefCountPolicy>(rc: &R) -> bool {
    rc.try_add_ref()
}

/// A field [`ref_counted!`](crate::ref_counted) can forward
/// [`RefCounted`](crate::RefCounted) to.
#[doc(hidden)]
pub trait RefCountField {
    fn add_ref(&self) -> u32;

    /// # Safety
    /// See [`RefCounted::remove_ref`](crate::RefCounted::remove_ref).
    unsafe fn remove_ref(&self) -> u32;

    fn no_refs(&self) -> bool;

    fn try_add_ref(&self) -> bool;
}

impl<R: RefCountPolicy> RefCountField for R {
    #[inline]
    fn add_ref(&self) -> u32 {
        RefCountPolicy::add_ref(self)
    }

    #[inline]
    unsafe fn remove_ref(&self) -> u32 {
        RefCountPolicy::remove_ref(self)
    }

    #[inline]
    fn no_refs(&self) -> bool {
        RefCountPolicy::no_refs(self)
    }

    #[inline]
    fn try_add_ref(&self) -> bool {
        try_add_ref(self)
    }
}
