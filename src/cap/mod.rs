//! Capability Object Model
//!
//! Components expose their functionality through *capabilities*:
//! trait-object types arranged in a declared graph of bases.
//!
//! # Design
//! - A capability is identified by its type (`CapabilityId`)
//! - Each node lists only its direct bases (`Interface`)
//! - Casts walk the graph on demand; nothing is cached or registered
//! - `Anything` and `RefCounted` are roots with dedicated fast paths
//!
//! # Graph Properties
//! - Acyclic: every edge is a supertrait upcast
//! - Every component reaches `Anything`
//! - All views of a component share its address

pub mod cast;
pub mod graph;
pub mod id;
mod macros;
pub mod root;

pub use cast::{
    as_anything, as_ref_counted, cast, cast_mut, rt_cast, rt_cast_anything, rt_cast_ref_counted,
    supports, Component, RawCapability,
};
pub use graph::{direct_bases, reaches, roots, unique_bases, BaseVisitor, Interface, TypeVisitor};
pub use id::{CapabilityId, Roots};
pub use root::{Anything, AnythingExt, RefCounted};
