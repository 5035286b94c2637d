//! Allocator Capability
//!
//! Component blocks are placed either with the Rust global allocator or
//! with an `Allocator` component chosen at creation time.
//!
//! # Ownership
//! The block header keeps an `AllocatorPtr` to the allocator that placed
//! it, so an allocator outlives every block it handed out.

use core::alloc::Layout;
use core::ptr::{self, NonNull};

use spin::Once;

use crate::cap::Anything;
use crate::ptr::{create_instance, ComClass, ComPtr};
use crate::rc::ConcurrentRc;

/// Memory provider capability.
pub trait Allocator: Anything + Send + Sync {
    /// Allocate a block for `layout`, or `None` when exhausted.
    fn alloc(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// Return a block to the allocator.
    ///
    /// # Safety
    /// `ptr` must come from `alloc` on this allocator with the same
    /// `layout`, and must not be used afterwards.
    unsafe fn free(&self, ptr: NonNull<u8>, layout: Layout);
}

crate::capability!(dyn Allocator: dyn Anything);

/// Shared reference to an allocator component.
pub type AllocatorPtr = ComPtr<dyn Allocator, ConcurrentRc>;

/// The Rust global allocator as a component.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobalAllocator;

static SHARED: Once<AllocatorPtr> = Once::new();

impl GlobalAllocator {
    /// Process-wide instance, created on first use.
    pub fn shared() -> AllocatorPtr {
        SHARED
            .call_once(|| create_instance(GlobalAllocator).into_allocator())
            .clone()
    }
}

impl Allocator for GlobalAllocator {
    fn alloc(&self, layout: Layout) -> Option<NonNull<u8>> {
        if layout.size() == 0 {
            return NonNull::new(ptr::without_provenance_mut(layout.align()));
        }
        // SAFETY: the layout has a nonzero size.
        NonNull::new(unsafe { alloc::alloc::alloc(layout) })
    }

    unsafe fn free(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            return;
        }
        // SAFETY: guaranteed by the caller; the block came from `alloc`
        // above with this layout.
        unsafe { alloc::alloc::dealloc(ptr.as_ptr(), layout) }
    }
}

crate::component!(GlobalAllocator: dyn Allocator);

impl ComClass for GlobalAllocator {
    type Policy = ConcurrentRc;
}

impl<T: ComClass<Policy = ConcurrentRc> + Allocator> ComPtr<T, ConcurrentRc> {
    /// View an allocator component as an [`AllocatorPtr`].
    pub fn into_allocator(self) -> AllocatorPtr {
        let (view, state) = ComPtr::into_raw_parts(self);
        let view: NonNull<dyn Allocator> = view;
        // SAFETY: the view is an upcast of the same instance, and the
        // reference moves with it.
        unsafe { ComPtr::from_raw_parts(view, state) }
    }
}
