//! Component Block Header
//!
//! A component created through `create_instance` lives in one block:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 ComBlock<P, T> (repr C)                  │
//! ├──────────────────────────────────────────────────────────┤
//! │  SharedState<P>                                          │
//! │    instance_rc: P    - strong references                 │
//! │    storage_rc: P     - strong + weak references          │
//! │    anything          - the instance as `dyn Anything`    │
//! │    drop_value        - drops T in place                  │
//! │    layout            - block layout                      │
//! │    allocator         - who frees the block (or global)   │
//! ├──────────────────────────────────────────────────────────┤
//! │  T                   - the component                     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The instance is dropped when `instance_rc` reaches zero; the block is
//! freed when `storage_rc` reaches zero. Every strong reference also holds
//! a storage reference, and so does an `InstanceRc` stored in `T`, until
//! the value is dropped.

use core::alloc::Layout;
use core::mem;
use core::ptr::{self, NonNull};

use crate::cap::Anything;
use crate::mm::AllocatorPtr;
use crate::rc::RefCountPolicy;

/// Header in front of every component instance.
pub(crate) struct SharedState<P> {
    instance_rc: P,
    storage_rc: P,
    anything: NonNull<dyn Anything>,
    drop_value: unsafe fn(NonNull<SharedState<P>>),
    layout: Layout,
    allocator: Option<AllocatorPtr>,
}

#[repr(C)]
pub(crate) struct ComBlock<P, T> {
    state: SharedState<P>,
    value: T,
}

/// A block whose header is written but whose value is still being built.
///
/// Dropped only when the builder panics: the instance is marked dead
/// without ever having lived, and the creator's storage reference goes.
struct Unborn<P: RefCountPolicy> {
    state: NonNull<SharedState<P>>,
}

impl<P: RefCountPolicy> Drop for Unborn<P> {
    fn drop(&mut self) {
        log::trace!("component construction unwound, header {:p}", self.state);
        // SAFETY: the creator's references keep the header alive; no value
        // was written, so it must not be dropped.
        unsafe {
            self.state.as_ref().instance_rc.remove_ref();
            SharedState::release_storage(self.state);
        }
    }
}

/// Drop the instance behind a header, leaving the header intact.
///
/// # Safety
/// `state` must head a live `ComBlock<P, T>` whose value was not dropped.
unsafe fn drop_value<P, T>(state: NonNull<SharedState<P>>) {
    let block = state.cast::<ComBlock<P, T>>().as_ptr();
    // SAFETY: guaranteed by the caller.
    unsafe { ptr::drop_in_place(ptr::addr_of_mut!((*block).value)) }
}

impl<P: RefCountPolicy> SharedState<P> {
    /// Layout of the block holding a `T`.
    pub(crate) fn block_layout<T>() -> Layout {
        Layout::new::<ComBlock<P, T>>()
    }

    /// Write the header of a fresh block, then the value `make` builds.
    ///
    /// `make` gets the live header, but the instance counts as alive only
    /// once it returns. Both counters start at 1, owned by the returned
    /// pointers. If `make` panics the block is released once nothing
    /// else references its header.
    ///
    /// # Safety
    /// `block` must be valid for writes of `block_layout::<T>()` and must
    /// be released through `allocator` (or the global allocator when
    /// `None`).
    pub(crate) unsafe fn init<T, F>(
        block: NonNull<u8>,
        allocator: Option<AllocatorPtr>,
        make: F,
    ) -> (NonNull<T>, NonNull<Self>)
    where
        T: Anything + 'static,
        F: FnOnce(NonNull<Self>) -> T,
    {
        let block = block.cast::<ComBlock<P, T>>().as_ptr();

        // SAFETY: field projections of a block valid for writes (caller);
        // the header is written before anything reads it.
        let (value_ptr, state_ptr) = unsafe {
            let value_ptr = NonNull::new_unchecked(ptr::addr_of_mut!((*block).value));
            let state_ptr = NonNull::new_unchecked(ptr::addr_of_mut!((*block).state));
            let anything: NonNull<dyn Anything> = value_ptr;

            state_ptr.as_ptr().write(Self {
                instance_rc: P::default(),
                storage_rc: P::default(),
                anything,
                drop_value: drop_value::<P, T>,
                layout: Self::block_layout::<T>(),
                allocator,
            });
            (value_ptr, state_ptr)
        };

        let unborn = Unborn { state: state_ptr };
        let value = make(state_ptr);
        mem::forget(unborn);

        // SAFETY: the value slot is valid for writes and still empty.
        unsafe { value_ptr.as_ptr().write(value) };
        (value_ptr, state_ptr)
    }

    /// The instance, as seen by dynamic queries.
    ///
    /// Only valid while a strong reference is held.
    pub(crate) fn anything(&self) -> &dyn Anything {
        // SAFETY: a strong reference keeps the value alive.
        unsafe { self.anything.as_ref() }
    }

    pub(crate) fn allocator(&self) -> Option<&AllocatorPtr> {
        self.allocator.as_ref()
    }

    pub(crate) fn instance_refs(&self) -> u32 {
        self.instance_rc.refs_count()
    }

    /// Take a strong reference, returning the previous strong count.
    pub(crate) fn add_instance_ref(&self) -> u32 {
        self.storage_rc.add_ref();
        self.instance_rc.add_ref()
    }

    pub(crate) fn add_weak_ref(&self) {
        self.storage_rc.add_ref();
    }

    /// Take a strong reference unless the instance is already gone,
    /// returning the previous strong count.
    pub(crate) fn acquire(&self) -> Option<u32> {
        let prev = self.instance_rc.acquire()?;
        self.storage_rc.add_ref();
        Some(prev)
    }

    pub(crate) fn try_acquire(&self) -> bool {
        self.acquire().is_some()
    }

    pub(crate) fn is_dead(&self) -> bool {
        self.instance_rc.no_refs()
    }

    /// Drop a strong reference, returning the previous strong count.
    ///
    /// # Safety
    /// The caller must own a strong reference on `this` and never use it
    /// again.
    pub(crate) unsafe fn release_instance(this: NonNull<Self>) -> u32 {
        // SAFETY: the caller's reference keeps the header alive.
        let state = unsafe { this.as_ref() };
        let prev = state.instance_rc.remove_ref();
        if prev == 1 {
            log::trace!("destroying component at {:p}", state.anything);
            // SAFETY: this was the last strong reference; the value is
            // live and nobody else will drop it.
            unsafe { (state.drop_value)(this) };
        }

        // SAFETY: the strong reference also owned a storage reference.
        unsafe { Self::release_storage(this) };
        prev
    }

    /// Drop a storage (weak) reference.
    ///
    /// # Safety
    /// The caller must own a storage reference on `this` and never use it
    /// again.
    pub(crate) unsafe fn release_storage(this: NonNull<Self>) {
        // SAFETY: the caller's reference keeps the header alive.
        if unsafe { this.as_ref() }.storage_rc.remove_ref() != 1 {
            return;
        }

        // SAFETY: last storage reference; no one else can reach the
        // header, so moving it out is the final access.
        let state = unsafe { ptr::read(this.as_ptr()) };
        debug_assert!(state.instance_rc.no_refs());

        let block = this.cast::<u8>();
        log::trace!("releasing component block {:p} ({} bytes)", block, state.layout.size());

        match &state.allocator {
            // SAFETY: the block was placed by this allocator with this layout.
            Some(allocator) => unsafe { allocator.free(block, state.layout) },
            // SAFETY: the block came from the global allocator.
            None => unsafe { alloc::alloc::dealloc(block.as_ptr(), state.layout) },
        }
        // The allocator reference goes last, after its block.
        drop(state);
    }
}
