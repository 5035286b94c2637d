//! Region Heap Allocator
//!
//! Uses `linked_list_allocator` for first-fit management of one memory
//! region handed over by the caller.
//!
//! # Memory Layout
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ region (owned by the heap for 'static)       │
//! │ ┌──────────┬──────┬──────────┬─────────────┐ │
//! │ │ block    │ hole │ block    │ hole ...    │ │
//! │ └──────────┴──────┴──────────┴─────────────┘ │
//! └──────────────────────────────────────────────┘
//! ```
//! Freed blocks return to the hole list and are merged with neighbours.

use core::alloc::Layout;
use core::mem::{size_of, MaybeUninit};
use core::ptr::NonNull;

use linked_list_allocator::Heap;
use spin::Mutex;

use super::allocator::Allocator;
use crate::error::ComError;
use crate::ptr::ComClass;
use crate::rc::ConcurrentRc;

/// Smallest region the heap bookkeeping fits in, whatever its alignment.
const MIN_REGION: usize = 4 * size_of::<usize>();

/// First-fit allocator over a dedicated region.
pub struct HeapAllocator {
    heap: Mutex<Heap>,
}

impl HeapAllocator {
    /// Take ownership of `region` and manage it as a heap.
    pub fn new(region: &'static mut [MaybeUninit<u8>]) -> Result<Self, ComError> {
        let size = region.len();
        if size < MIN_REGION {
            return Err(ComError::RegionTooSmall {
                size,
                min: MIN_REGION,
            });
        }

        log::debug!("heap allocator over {:p} ({} bytes)", region.as_ptr(), size);
        Ok(Self {
            heap: Mutex::new(Heap::from_slice(region)),
        })
    }

    /// Managed bytes.
    pub fn size(&self) -> usize {
        self.heap.lock().size()
    }

    /// Bytes currently handed out.
    pub fn used(&self) -> usize {
        self.heap.lock().used()
    }

    /// Bytes still available (possibly fragmented).
    pub fn free(&self) -> usize {
        self.heap.lock().free()
    }
}

impl Allocator for HeapAllocator {
    fn alloc(&self, layout: Layout) -> Option<NonNull<u8>> {
        self.heap.lock().allocate_first_fit(layout).ok()
    }

    unsafe fn free(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: guaranteed by the caller.
        unsafe { self.heap.lock().deallocate(ptr, layout) }
    }
}

crate::component!(HeapAllocator: dyn Allocator);

impl ComClass for HeapAllocator {
    type Policy = ConcurrentRc;
}

impl core::fmt::Debug for HeapAllocator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let heap = self.heap.lock();
        f.debug_struct("HeapAllocator")
            .field("size", &heap.size())
            .field("used", &heap.used())
            .finish()
    }
}
