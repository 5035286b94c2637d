//! Component Smart Pointers
//!
//! Creates components in counted blocks and hands out references to them.
//!
//! # Design
//! - One block per instance: shared header followed by the component
//! - Strong references (`ComPtr`) keep the instance alive
//! - Weak references (`WeakComPtr`) keep only the header alive
//! - The counter policy is chosen per component type (`ComClass::Policy`)
//! - A component built by `create_instance_with` holds an `InstanceRc`, so
//!   its `RefCounted` capability counts the same strong references
//!
//! # Reference Flow
//! ```text
//! create_instance ──► ComPtr<T> ──cast/query──► ComPtr<dyn Cap>
//!                       │   ▲
//!             downgrade │   │ upgrade (try_add_ref)
//!                       ▼   │
//!                   WeakComPtr<T>
//! ```

mod com_ptr;
mod guard;
mod instance;
mod singleton;
mod state;
mod weak;

pub use com_ptr::ComPtr;
pub use guard::RefCountedGuard;
pub use instance::InstanceRc;
pub use singleton::Singleton;
pub use weak::WeakComPtr;

use core::ptr::NonNull;

use crate::cap::Component;
use crate::error::ComError;
use crate::mm::AllocatorPtr;
use crate::rc::RefCountPolicy;
use state::SharedState;

/// A component that can be created as a counted instance.
pub trait ComClass: Component {
    /// Counter policy for references to this component.
    type Policy: RefCountPolicy;
}

/// Create `value` as a counted instance in global memory.
///
/// Aborts through the global allocation-error handler when memory is
/// exhausted, like `Box::new`.
pub fn create_instance<T: ComClass>(value: T) -> ComPtr<T, T::Policy> {
    place_global(|_| value)
}

/// Create a counted instance whose value is built around its own
/// [`InstanceRc`].
///
/// ```
/// use comkit::{component, create_instance_with, ref_counted, ComClass, ComPtr};
/// use comkit::{ConcurrentRc, InstanceRc, RefCounted, RefCountedGuard};
///
/// struct Texture {
///     rc: InstanceRc<ConcurrentRc>,
/// }
/// component!(Texture: dyn RefCounted);
/// ref_counted!(Texture => rc);
/// impl ComClass for Texture {
///     type Policy = ConcurrentRc;
/// }
///
/// let texture = create_instance_with(|rc| Texture { rc });
/// let _guard = RefCountedGuard::new(&*texture);
/// assert_eq!(ComPtr::refs_count(&texture), 2);
/// ```
pub fn create_instance_with<T, F>(make: F) -> ComPtr<T, T::Policy>
where
    T: ComClass,
    F: FnOnce(InstanceRc<T::Policy>) -> T,
{
    // SAFETY: `place_global` hands over a written header.
    place_global(|state| make(unsafe { InstanceRc::attach(state) }))
}

/// Create `value` as a counted instance placed by `allocator`.
///
/// The block keeps `allocator` referenced until it is freed.
pub fn create_instance_in<T: ComClass>(
    allocator: &AllocatorPtr,
    value: T,
) -> Result<ComPtr<T, T::Policy>, ComError> {
    place_in(allocator, |_| value)
}

/// [`create_instance_with`] placed by `allocator`.
pub fn create_instance_in_with<T, F>(
    allocator: &AllocatorPtr,
    make: F,
) -> Result<ComPtr<T, T::Policy>, ComError>
where
    T: ComClass,
    F: FnOnce(InstanceRc<T::Policy>) -> T,
{
    // SAFETY: `place_in` hands over a written header.
    place_in(allocator, |state| make(unsafe { InstanceRc::attach(state) }))
}

fn place_global<T, F>(make: F) -> ComPtr<T, T::Policy>
where
    T: ComClass,
    F: FnOnce(NonNull<SharedState<T::Policy>>) -> T,
{
    let layout = SharedState::<T::Policy>::block_layout::<T>();
    // SAFETY: the layout includes the header, so it is never zero-sized.
    let raw = unsafe { alloc::alloc::alloc(layout) };
    let Some(block) = NonNull::new(raw) else {
        alloc::alloc::handle_alloc_error(layout);
    };

    // SAFETY: fresh block of the right layout from the global allocator.
    unsafe {
        let (view, state) = SharedState::<T::Policy>::init(block, None, make);
        ComPtr::from_raw_parts(view, state)
    }
}

fn place_in<T, F>(allocator: &AllocatorPtr, make: F) -> Result<ComPtr<T, T::Policy>, ComError>
where
    T: ComClass,
    F: FnOnce(NonNull<SharedState<T::Policy>>) -> T,
{
    let layout = SharedState::<T::Policy>::block_layout::<T>();
    let block = allocator.alloc(layout).ok_or(ComError::from(layout))?;

    // SAFETY: the allocator returned a block for this layout, and the
    // header records it for the release.
    Ok(unsafe {
        let (view, state) = SharedState::<T::Policy>::init(block, Some(allocator.clone()), make);
        ComPtr::from_raw_parts(view, state)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::{GlobalAllocator, HeapAllocator};
    use crate::ConcurrentRc;
    use core::mem::MaybeUninit;
    use std::boxed::Box;
    use std::panic::{self, AssertUnwindSafe};
    use std::vec;

    #[derive(Debug)]
    struct Blob {
        bytes: [u8; 64],
    }

    crate::component!(Blob);

    impl ComClass for Blob {
        type Policy = ConcurrentRc;
    }

    struct Linked {
        rc: InstanceRc<ConcurrentRc>,
    }

    crate::component!(Linked);

    impl ComClass for Linked {
        type Policy = ConcurrentRc;
    }

    fn heap(size: usize) -> AllocatorPtr {
        let region: &'static mut [MaybeUninit<u8>] =
            Box::leak(vec![MaybeUninit::uninit(); size].into_boxed_slice());
        create_instance(HeapAllocator::new(region).unwrap()).into_allocator()
    }

    #[test]
    fn test_create_in_heap_and_release() {
        let allocator = heap(4096);
        let heap_view = ComPtr::query::<HeapAllocator>(&allocator).unwrap();
        assert_eq!(heap_view.used(), 0);

        let blob = create_instance_in(&allocator, Blob { bytes: [7; 64] }).unwrap();
        assert_eq!(blob.bytes[63], 7);
        assert!(heap_view.used() >= 64);

        let owner = ComPtr::allocator(&blob).unwrap();
        assert!(ComPtr::ptr_eq(&owner, &allocator));
        drop(owner);

        drop(blob);
        assert_eq!(heap_view.used(), 0);
    }

    #[test]
    fn test_weak_keeps_block_until_released() {
        let allocator = heap(4096);
        let heap_view = ComPtr::query::<HeapAllocator>(&allocator).unwrap();

        let blob = create_instance_in(&allocator, Blob { bytes: [1; 64] }).unwrap();
        let weak = ComPtr::downgrade(&blob);
        drop(blob);

        // Instance gone, header still placed.
        assert!(weak.is_dead());
        assert!(heap_view.used() > 0);

        drop(weak);
        assert_eq!(heap_view.used(), 0);
    }

    #[test]
    fn test_exhausted_allocator() {
        let allocator = heap(64);
        let err = create_instance_in(&allocator, Blob { bytes: [0; 64] }).unwrap_err();
        assert!(matches!(err, ComError::OutOfMemory { .. }));
    }

    #[test]
    fn test_allocator_outlives_blocks() {
        let allocator = heap(4096);
        let heap_refs = ComPtr::refs_count(&allocator);
        let blob = create_instance_in(&allocator, Blob { bytes: [2; 64] }).unwrap();
        assert_eq!(ComPtr::refs_count(&allocator), heap_refs + 1);

        drop(allocator);
        assert_eq!(blob.bytes[0], 2);
        drop(blob);
    }

    #[test]
    fn test_global_allocator_placement() {
        let blob = create_instance_in(&GlobalAllocator::shared(), Blob { bytes: [3; 64] }).unwrap();
        assert!(ComPtr::allocator(&blob).is_some());
    }

    #[test]
    fn test_panicking_builder_releases_block() {
        let allocator = heap(4096);
        let heap_view = ComPtr::query::<HeapAllocator>(&allocator).unwrap();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            create_instance_in_with(&allocator, |rc| -> Linked {
                drop(rc);
                panic!("builder failed");
            })
        }));
        assert!(result.is_err());
        assert_eq!(heap_view.used(), 0);
    }

    #[test]
    fn test_stray_counter_keeps_header_only() {
        let allocator = heap(4096);
        let heap_view = ComPtr::query::<HeapAllocator>(&allocator).unwrap();

        let mut stray = None;
        let blob = create_instance_in_with(&allocator, |rc| {
            stray = Some(rc);
            Blob { bytes: [5; 64] }
        })
        .unwrap();
        let stray = stray.unwrap();
        assert_eq!(stray.refs_count(), 1);

        drop(blob);
        assert!(stray.is_dead());
        assert!(!stray.try_add_ref());
        assert!(heap_view.used() > 0);

        drop(stray);
        assert_eq!(heap_view.used(), 0);
    }

    #[test]
    #[should_panic(expected = "destroyed component")]
    fn test_stray_counter_refuses_add_ref() {
        let mut stray = None;
        drop(create_instance_with(|rc| {
            stray = Some(rc);
            Blob { bytes: [0; 64] }
        }));
        stray.unwrap().add_ref();
    }

    #[test]
    fn test_linked_instance_in_heap() {
        let allocator = heap(4096);
        let linked = create_instance_in_with(&allocator, |rc| Linked { rc }).unwrap();
        let weak = ComPtr::downgrade(&linked);
        assert_eq!(linked.rc.refs_count(), 1);

        let upgraded = weak.upgrade().unwrap();
        assert_eq!(linked.rc.refs_count(), 2);
        drop(upgraded);
        drop(linked);
        assert!(weak.is_dead());
    }
}
