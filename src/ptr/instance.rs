//! Instance counter exposed through `RefCounted`.
//!
//! A component built with `create_instance_with` receives an `InstanceRc`
//! for its own block. Forwarding `RefCounted` to it (`ref_counted!`) makes
//! the capability count the same strong references as `ComPtr`: a
//! `RefCountedGuard` keeps the instance alive, and the `remove_ref` that
//! returns 1 destroys it.
//!
//! The counter holds a storage reference on its block, so one that ends up
//! outside its instance (never stored in `T`, or moved out while `T` drops)
//! still points at a live header. It then refuses new references.

use core::fmt;
use core::ptr::NonNull;

use super::state::SharedState;
use crate::rc::{RefCountField, RefCountPolicy};

/// The strong-reference counter of the instance it was created for.
pub struct InstanceRc<P: RefCountPolicy> {
    state: NonNull<SharedState<P>>,
}

// SAFETY: only the header's counters are reached, through the policy.
unsafe impl<P: RefCountPolicy + Send + Sync> Send for InstanceRc<P> {}

// SAFETY: as above.
unsafe impl<P: RefCountPolicy + Send + Sync> Sync for InstanceRc<P> {}

impl<P: RefCountPolicy> InstanceRc<P> {
    /// # Safety
    /// `state` must be a written header.
    pub(crate) unsafe fn attach(state: NonNull<SharedState<P>>) -> Self {
        // SAFETY: header written (caller).
        unsafe { state.as_ref() }.add_weak_ref();
        Self { state }
    }

    #[inline]
    fn state(&self) -> &SharedState<P> {
        // SAFETY: our storage reference keeps the header alive.
        unsafe { self.state.as_ref() }
    }

    /// Number of strong references to the instance.
    pub fn refs_count(&self) -> u32 {
        self.state().instance_refs()
    }

    /// Whether the instance is gone, or was never built.
    pub fn is_dead(&self) -> bool {
        self.state().is_dead()
    }

    /// Take a strong reference, returning the previous count.
    ///
    /// # Panics
    /// If the instance is already gone.
    pub fn add_ref(&self) -> u32 {
        match self.state().acquire() {
            Some(prev) => prev,
            None => panic!("add_ref on a destroyed component"),
        }
    }

    /// Take a strong reference unless the instance is already gone.
    pub fn try_add_ref(&self) -> bool {
        self.state().try_acquire()
    }

    /// Drop a strong reference, returning the previous count. The instance
    /// is destroyed when that was 1.
    ///
    /// # Safety
    /// The caller must own the strong reference it drops, and must not
    /// touch the instance again when this returns 1.
    pub unsafe fn remove_ref(&self) -> u32 {
        let state = self.state;
        // SAFETY: a strong reference is handed over (caller). `self` lives
        // in the instance, so only the copied header pointer is used.
        unsafe { SharedState::release_instance(state) }
    }
}

impl<P: RefCountPolicy> Drop for InstanceRc<P> {
    fn drop(&mut self) {
        // SAFETY: we owned this storage reference.
        unsafe { SharedState::release_storage(self.state) };
    }
}

impl<P: RefCountPolicy> RefCountField for InstanceRc<P> {
    #[inline]
    fn add_ref(&self) -> u32 {
        InstanceRc::add_ref(self)
    }

    #[inline]
    unsafe fn remove_ref(&self) -> u32 {
        // SAFETY: same contract.
        unsafe { InstanceRc::remove_ref(self) }
    }

    #[inline]
    fn no_refs(&self) -> bool {
        self.is_dead()
    }

    #[inline]
    fn try_add_ref(&self) -> bool {
        InstanceRc::try_add_ref(self)
    }
}

impl<P: RefCountPolicy> fmt::Debug for InstanceRc<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceRc")
            .field("refs", &self.refs_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ptr::{create_instance_with, ComClass, ComPtr};
    use crate::{cast, ConcurrentRc, RefCounted, SingleThreadRc};
    use core::mem::ManuallyDrop;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Session {
        rc: InstanceRc<ConcurrentRc>,
        drops: Arc<AtomicUsize>,
    }

    impl Drop for Session {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    crate::component!(Session: dyn RefCounted);
    crate::ref_counted!(Session => rc);

    impl ComClass for Session {
        type Policy = ConcurrentRc;
    }

    fn session() -> (ComPtr<Session>, Arc<AtomicUsize>) {
        let drops = Arc::new(AtomicUsize::new(0));
        let ptr = create_instance_with(|rc| Session {
            rc,
            drops: drops.clone(),
        });
        (ptr, drops)
    }

    #[test]
    fn test_capability_counts_strong_references() {
        let (ptr, _drops) = session();
        let rc = cast::<dyn RefCounted, _>(&*ptr).unwrap();

        assert_eq!(rc.add_ref(), 1);
        assert_eq!(ComPtr::refs_count(&ptr), 2);
        assert!(rc.try_add_ref());
        assert_eq!(ComPtr::refs_count(&ptr), 3);

        assert_eq!(unsafe { rc.remove_ref() }, 3);
        assert_eq!(unsafe { rc.remove_ref() }, 2);
        assert_eq!(ComPtr::refs_count(&ptr), 1);
        assert!(!rc.no_refs());
    }

    #[test]
    fn test_last_remove_ref_destroys() {
        let (ptr, drops) = session();
        let weak = ComPtr::downgrade(&ptr);

        // The capability's reference outlives every ComPtr.
        ptr.add_ref();
        drop(ptr);
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        let last = ManuallyDrop::new(weak.upgrade().unwrap());
        assert_eq!(ComPtr::refs_count(&last), 2);
        let counter: *const dyn RefCounted = cast::<dyn RefCounted, _>(&**last).unwrap();
        // SAFETY: releases the upgraded reference, then the one taken above.
        unsafe {
            assert_eq!((*counter).remove_ref(), 2);
            assert_eq!((*counter).remove_ref(), 1);
        }

        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(weak.is_dead());
        assert!(weak.upgrade().is_none());
    }

    struct Gauge {
        rc: InstanceRc<SingleThreadRc>,
    }

    crate::component!(Gauge);

    impl ComClass for Gauge {
        type Policy = SingleThreadRc;
    }

    #[test]
    fn test_counter_in_single_thread_instance() {
        let ptr = create_instance_with(|rc| Gauge { rc });
        assert_eq!(ptr.rc.refs_count(), 1);

        let copy = ptr.clone();
        assert_eq!(ptr.rc.refs_count(), 2);
        assert!(!ptr.rc.is_dead());
        drop(copy);
        assert_eq!(ptr.rc.refs_count(), 1);
    }
}
