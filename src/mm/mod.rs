//! Memory for component storage
//!
//! Provides:
//! - The `Allocator` capability that component blocks are placed with
//! - `GlobalAllocator`: the Rust global allocator as a component
//! - `HeapAllocator`: a first-fit heap over a caller-supplied region
//!
//! # Principles
//! - A block is always freed through the allocator that produced it
//! - An allocator stays referenced until its last block is freed
//! - Allocation failure is a value (`None`), never a panic

mod allocator;
mod heap;

pub use allocator::{Allocator, AllocatorPtr, GlobalAllocator};
pub use heap::HeapAllocator;
