//! Strong component reference.

use core::fmt;
use core::marker::PhantomData;
use core::mem::ManuallyDrop;
use core::ops::Deref;
use core::ptr::NonNull;

use super::state::SharedState;
use super::weak::WeakComPtr;
use crate::cap::{self, AnythingExt, CapabilityId, Interface};
use crate::mm::AllocatorPtr;
use crate::rc::{ConcurrentRc, RefCountPolicy};

/// Owning reference to a component instance, viewed as capability `C`.
///
/// Every `ComPtr` to the same instance shares one block header, whatever
/// capability it views the instance as. The instance is dropped with its
/// last `ComPtr`.
///
/// # Thread Safety
/// `Send` and `Sync` only when both the view and the counter policy are;
/// components counted with a single-thread policy stay on one thread.
pub struct ComPtr<C: ?Sized, P: RefCountPolicy = ConcurrentRc> {
    view: NonNull<C>,
    state: NonNull<SharedState<P>>,
    _owns: PhantomData<C>,
}

// SAFETY: a thread-safe view of a thread-safe instance, counted atomically.
unsafe impl<C, P> Send for ComPtr<C, P>
where
    C: ?Sized + Send + Sync,
    P: RefCountPolicy + Send + Sync,
{
}

// SAFETY: as above; shared access only reaches `&C` and the counters.
unsafe impl<C, P> Sync for ComPtr<C, P>
where
    C: ?Sized + Send + Sync,
    P: RefCountPolicy + Send + Sync,
{
}

impl<C: ?Sized, P: RefCountPolicy> ComPtr<C, P> {
    /// Assemble from a view and its header.
    ///
    /// # Safety
    /// `view` must point into the instance headed by `state`, and the
    /// caller hands over one strong reference.
    pub(crate) unsafe fn from_raw_parts(view: NonNull<C>, state: NonNull<SharedState<P>>) -> Self {
        Self {
            view,
            state,
            _owns: PhantomData,
        }
    }

    /// Split into view and header without releasing the reference.
    pub(crate) fn into_raw_parts(this: Self) -> (NonNull<C>, NonNull<SharedState<P>>) {
        let this = ManuallyDrop::new(this);
        (this.view, this.state)
    }

    #[inline]
    fn state(&self) -> &SharedState<P> {
        // SAFETY: our strong reference keeps the header alive.
        unsafe { self.state.as_ref() }
    }

    /// A new strong reference to the same instance, viewed as `D`.
    ///
    /// # Safety
    /// `view` must point into this instance.
    unsafe fn retain_as<D: ?Sized>(this: &Self, view: NonNull<D>) -> ComPtr<D, P> {
        this.state().add_instance_ref();
        // SAFETY: reference taken above; view guaranteed by the caller.
        unsafe { ComPtr::from_raw_parts(view, this.state) }
    }

    /// Number of strong references to the instance.
    pub fn refs_count(this: &Self) -> u32 {
        this.state().instance_refs()
    }

    /// Whether both pointers reference the same instance.
    pub fn ptr_eq<D: ?Sized>(this: &Self, other: &ComPtr<D, P>) -> bool {
        this.state == other.state
    }

    /// Raw pointer to the view.
    pub fn as_ptr(this: &Self) -> *const C {
        this.view.as_ptr()
    }

    /// Allocator the instance's block was placed with; `None` for the
    /// global allocator.
    pub fn allocator(this: &Self) -> Option<AllocatorPtr> {
        this.state().allocator().cloned()
    }

    /// Non-owning reference to the same instance.
    pub fn downgrade(this: &Self) -> WeakComPtr<C, P> {
        this.state().add_weak_ref();
        // SAFETY: storage reference taken above.
        unsafe { WeakComPtr::from_raw_parts(this.view, this.state) }
    }

    /// Dynamic capability query through the instance's `Anything`.
    ///
    /// Finds any capability the component declares, not only those
    /// reachable from `C`. A miss returns `None`.
    pub fn query<D: ?Sized + 'static>(this: &Self) -> Option<ComPtr<D, P>> {
        let Some(view) = this.state().anything().capability::<D>() else {
            log::trace!(
                "capability query for {} missed on {:p}",
                CapabilityId::of::<D>(),
                this.view
            );
            return None;
        };

        // SAFETY: the view was resolved on this instance.
        Some(unsafe { Self::retain_as(this, NonNull::from(view)) })
    }
}

impl<C: ?Sized + Interface, P: RefCountPolicy> ComPtr<C, P> {
    /// Static capability cast from the `C` view.
    ///
    /// Only the bases declared below `C` are reachable.
    pub fn cast<D: ?Sized + 'static>(this: &Self) -> Option<ComPtr<D, P>> {
        let view = cap::cast::<D, C>(&**this)?;
        // SAFETY: the view is an upcast of this instance.
        Some(unsafe { Self::retain_as(this, NonNull::from(view)) })
    }
}

impl<C: ?Sized, P: RefCountPolicy> Deref for ComPtr<C, P> {
    type Target = C;

    #[inline]
    fn deref(&self) -> &C {
        // SAFETY: a strong reference keeps the instance alive.
        unsafe { self.view.as_ref() }
    }
}

impl<C: ?Sized, P: RefCountPolicy> Clone for ComPtr<C, P> {
    fn clone(&self) -> Self {
        // SAFETY: same view, same instance.
        unsafe { Self::retain_as(self, self.view) }
    }
}

impl<C: ?Sized, P: RefCountPolicy> Drop for ComPtr<C, P> {
    fn drop(&mut self) {
        // SAFETY: we own one strong reference and are done with it.
        unsafe { SharedState::release_instance(self.state) };
    }
}

impl<C: ?Sized + fmt::Debug, P: RefCountPolicy> fmt::Debug for ComPtr<C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<C: ?Sized, P: RefCountPolicy> fmt::Pointer for ComPtr<C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.view, f)
    }
}
