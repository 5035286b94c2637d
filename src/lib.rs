//! comkit - Capability-Based Component Model
//!
//! Components expose capabilities (trait-object views) through a declared
//! graph, and are reached by static or dynamic casts over that graph.
//!
//! # Features
//! - Capability graph metadata declared with `capability!` / `component!`
//! - Static casts (`cast`), dynamic casts (`rt_cast`), type-level `supports`
//! - Root capabilities `Anything` and `RefCounted` with fast paths
//! - Interchangeable reference-count policies
//! - Counted instances with strong and weak references, optionally counted
//!   through their own `RefCounted` capability
//!
//! # Example
//! ```
//! use comkit::{capability, cast, component, supports, Anything, CapabilityId};
//!
//! trait Drawable: Anything {
//!     fn draw(&self) -> &'static str;
//! }
//! capability!(dyn Drawable: dyn Anything);
//!
//! struct Widget;
//! impl Drawable for Widget {
//!     fn draw(&self) -> &'static str {
//!         "widget"
//!     }
//! }
//! component!(Widget: dyn Drawable);
//!
//! assert_eq!(cast::<dyn Drawable, _>(&Widget).unwrap().draw(), "widget");
//! assert!(supports::<Widget>(CapabilityId::anything()));
//! ```
//!
//! # Crate Features
//! - `std` (default): thread-aware `StrictSingleThreadRc`; without it the
//!   crate is `no_std` + `alloc`

#![cfg_attr(not(any(feature = "std", test)), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod cap;
pub mod error;
pub mod mm;
pub mod ptr;
pub mod rc;

pub use cap::{
    as_anything, as_ref_counted, cast, cast_mut, rt_cast, rt_cast_anything, rt_cast_ref_counted,
    supports, Anything, AnythingExt, BaseVisitor, CapabilityId, Component, Interface,
    RawCapability, RefCounted, Roots, TypeVisitor,
};
pub use error::ComError;
pub use mm::{Allocator, AllocatorPtr, GlobalAllocator, HeapAllocator};
pub use ptr::{
    create_instance, create_instance_in, create_instance_in_with, create_instance_with, ComClass,
    ComPtr, InstanceRc, RefCountedGuard, Singleton, WeakComPtr,
};
pub use rc::{try_add_ref, ConcurrentRc, RefCountPolicy, SingleThreadRc};
#[cfg(feature = "std")]
pub use rc::StrictSingleThreadRc;
