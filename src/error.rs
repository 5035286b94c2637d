//! Error types.
//!
//! Casting has no error type: a missing capability is `None`. Errors only
//! come from placing component storage.

/// Error type for component allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComError {
    /// The allocator could not provide a block for the layout.
    OutOfMemory { size: usize, align: usize },
    /// A heap region is too small to hold the allocator's bookkeeping.
    RegionTooSmall { size: usize, min: usize },
}

impl core::fmt::Display for ComError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::OutOfMemory { size, align } => {
                write!(f, "out of memory: size={}, align={}", size, align)
            }
            Self::RegionTooSmall { size, min } => {
                write!(f, "heap region too small: {} bytes, need {}", size, min)
            }
        }
    }
}

impl core::error::Error for ComError {}

impl From<core::alloc::Layout> for ComError {
    fn from(layout: core::alloc::Layout) -> Self {
        Self::OutOfMemory {
            size: layout.size(),
            align: layout.align(),
        }
    }
}
