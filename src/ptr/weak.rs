//! Non-owning component reference.

use core::fmt;
use core::ptr::NonNull;

use super::com_ptr::ComPtr;
use super::state::SharedState;
use crate::rc::{ConcurrentRc, RefCountPolicy};

/// Weak reference to a component instance.
///
/// Keeps the block header alive but not the instance. `upgrade` promotes
/// it to a [`ComPtr`] through the policy's `try_add_ref`, so an instance
/// whose count has reached zero is never revived.
pub struct WeakComPtr<C: ?Sized, P: RefCountPolicy = ConcurrentRc> {
    inner: Option<(NonNull<C>, NonNull<SharedState<P>>)>,
}

// SAFETY: see `ComPtr`; a weak reference only reaches the counters until
// upgraded.
unsafe impl<C, P> Send for WeakComPtr<C, P>
where
    C: ?Sized + Send + Sync,
    P: RefCountPolicy + Send + Sync,
{
}

// SAFETY: as above.
unsafe impl<C, P> Sync for WeakComPtr<C, P>
where
    C: ?Sized + Send + Sync,
    P: RefCountPolicy + Send + Sync,
{
}

impl<C: ?Sized, P: RefCountPolicy> WeakComPtr<C, P> {
    /// An empty weak reference; it never upgrades.
    pub const fn new() -> Self {
        Self { inner: None }
    }

    /// # Safety
    /// `view` must point into the instance headed by `state`, and the
    /// caller hands over one storage reference.
    pub(crate) unsafe fn from_raw_parts(view: NonNull<C>, state: NonNull<SharedState<P>>) -> Self {
        Self {
            inner: Some((view, state)),
        }
    }

    /// Strong reference to the instance, if it is still alive.
    pub fn upgrade(&self) -> Option<ComPtr<C, P>> {
        let (view, state) = self.inner?;
        // SAFETY: our storage reference keeps the header alive.
        if !unsafe { state.as_ref() }.try_acquire() {
            return None;
        }

        // SAFETY: strong reference taken above.
        Some(unsafe { ComPtr::from_raw_parts(view, state) })
    }

    /// Whether the instance is gone, or this reference is empty.
    ///
    /// `false` is only a snapshot: the instance may die right after.
    /// `true` is final.
    pub fn is_dead(&self) -> bool {
        match self.inner {
            // SAFETY: our storage reference keeps the header alive.
            Some((_, state)) => unsafe { state.as_ref() }.is_dead(),
            None => true,
        }
    }

    /// Whether this reference was never set or has been reset.
    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }

    /// Drop the reference, leaving this one empty.
    pub fn reset(&mut self) {
        if let Some((_, state)) = self.inner.take() {
            // SAFETY: we owned this storage reference.
            unsafe { SharedState::release_storage(state) };
        }
    }
}

impl<C: ?Sized, P: RefCountPolicy> Default for WeakComPtr<C, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized, P: RefCountPolicy> Clone for WeakComPtr<C, P> {
    fn clone(&self) -> Self {
        if let Some((_, state)) = self.inner {
            // SAFETY: our storage reference keeps the header alive.
            unsafe { state.as_ref() }.add_weak_ref();
        }
        Self { inner: self.inner }
    }
}

impl<C: ?Sized, P: RefCountPolicy> Drop for WeakComPtr<C, P> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<C: ?Sized, P: RefCountPolicy> From<&ComPtr<C, P>> for WeakComPtr<C, P> {
    fn from(ptr: &ComPtr<C, P>) -> Self {
        ComPtr::downgrade(ptr)
    }
}

impl<C: ?Sized, P: RefCountPolicy> fmt::Debug for WeakComPtr<C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(WeakComPtr)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ptr::{create_instance, ComClass};
    use crate::{Anything, SingleThreadRc};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    trait Ping: Anything {
        fn ping(&self) -> u32;
    }

    crate::capability!(dyn Ping: dyn Anything);
    crate::capability!(dyn Ping + Send + Sync: dyn Anything);

    struct Node {
        id: u32,
        dropped: Arc<AtomicBool>,
    }

    impl Ping for Node {
        fn ping(&self) -> u32 {
            self.id
        }
    }

    impl Drop for Node {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    crate::component!(Node: dyn Ping, dyn Ping + Send + Sync);

    impl ComClass for Node {
        type Policy = ConcurrentRc;
    }

    fn node(id: u32) -> (ComPtr<Node>, Arc<AtomicBool>) {
        let dropped = Arc::new(AtomicBool::new(false));
        let ptr = create_instance(Node {
            id,
            dropped: dropped.clone(),
        });
        (ptr, dropped)
    }

    #[test]
    fn test_upgrade_while_alive() {
        let (ptr, _dropped) = node(1);
        let weak = ComPtr::downgrade(&ptr);
        assert!(!weak.is_dead());
        assert!(!weak.is_empty());

        let strong = weak.upgrade().unwrap();
        assert_eq!(strong.ping(), 1);
        assert_eq!(ComPtr::refs_count(&ptr), 2);
    }

    #[test]
    fn test_weak_does_not_keep_instance() {
        let (ptr, dropped) = node(2);
        let weak = WeakComPtr::from(&ptr);
        let second = weak.clone();

        drop(ptr);
        assert!(dropped.load(Ordering::SeqCst));
        assert!(weak.is_dead());
        assert!(weak.upgrade().is_none());
        assert!(second.upgrade().is_none());
    }

    #[test]
    fn test_empty_and_reset() {
        let empty = WeakComPtr::<dyn Ping>::default();
        assert!(empty.is_empty());
        assert!(empty.is_dead());
        assert!(empty.upgrade().is_none());

        let (ptr, _dropped) = node(3);
        let mut weak = ComPtr::downgrade(&ptr);
        weak.reset();
        assert!(weak.is_empty());
        assert!(weak.upgrade().is_none());
        assert_eq!(ComPtr::refs_count(&ptr), 1);
    }

    #[test]
    fn test_upgrade_races_release() {
        for _ in 0..100 {
            let (ptr, dropped) = node(4);
            let shared: ComPtr<dyn Ping + Send + Sync> = ComPtr::cast(&ptr).unwrap();
            drop(ptr);
            let weak = ComPtr::downgrade(&shared);
            let upgrades = AtomicUsize::new(0);

            thread::scope(|s| {
                s.spawn(|| {
                    for _ in 0..100 {
                        match weak.upgrade() {
                            Some(strong) => {
                                assert_eq!(strong.ping(), 4);
                                upgrades.fetch_add(1, Ordering::Relaxed);
                            }
                            None => break,
                        }
                    }
                });
                s.spawn(move || drop(shared));
            });

            assert!(weak.is_dead());
            assert!(dropped.load(Ordering::SeqCst));
            assert!(weak.upgrade().is_none());
        }
    }

    struct Local {
        id: u32,
    }

    impl Ping for Local {
        fn ping(&self) -> u32 {
            self.id
        }
    }

    crate::component!(Local: dyn Ping);

    impl ComClass for Local {
        type Policy = SingleThreadRc;
    }

    #[test]
    fn test_single_thread_weak() {
        let ptr = create_instance(Local { id: 9 });
        let weak = ComPtr::downgrade(&ptr);
        assert_eq!(weak.upgrade().unwrap().ping(), 9);
        drop(ptr);
        assert!(weak.upgrade().is_none());
    }
}
