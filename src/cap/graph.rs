//! Capability Graph Metadata
//!
//! Every node of the graph (a component type or a capability trait-object
//! type) implements [`Interface`], which lists the node's *direct* bases in
//! declaration order. The transitive closure is never stored; it is walked
//! on demand from the direct lists.
//!
//! # Design
//! - Two walks over the same declaration: one over an instance pointer
//!   (upcasting along each edge), one over types only
//! - Visitors stop the walk by returning `ControlFlow::Break`
//! - Declarations come from the `capability!` / `component!` macros
//!
//! Edges are upcast coercions, so a declared base must really be a
//! supertrait (or an implemented trait, for components). Undeclared bases
//! exist for the compiler but are invisible here.

use alloc::vec::Vec;
use core::ops::ControlFlow;

use super::id::{CapabilityId, Roots};

/// Direct-base metadata of one node of the capability graph.
///
/// Implemented through [`capability!`](crate::capability) and
/// [`component!`](crate::component); hand-written impls must visit each
/// direct base exactly once, in declaration order, and forward the
/// visitor's `Break`.
pub trait Interface: 'static {
    /// Visit each direct base of the node behind `this`.
    ///
    /// `this` is only upcast, never dereferenced.
    fn visit_bases<V: BaseVisitor>(this: *mut Self, visitor: &mut V) -> ControlFlow<V::Output>;

    /// Visit each direct base type, without an instance.
    fn visit_base_types<V: TypeVisitor>(visitor: &mut V) -> ControlFlow<V::Output>;
}

/// Receives upcast pointers to the direct bases of an instance.
pub trait BaseVisitor {
    type Output;

    fn visit<B: ?Sized + Interface>(&mut self, base: *mut B) -> ControlFlow<Self::Output>;
}

/// Receives the direct base types of a node.
pub trait TypeVisitor {
    type Output;

    fn visit<B: ?Sized + Interface>(&mut self) -> ControlFlow<Self::Output>;
}

/// Direct bases of `T`, in declaration order.
pub fn direct_bases<T: ?Sized + Interface>() -> Vec<CapabilityId> {
    struct Direct(Vec<CapabilityId>);

    impl TypeVisitor for Direct {
        type Output = ();

        fn visit<B: ?Sized + Interface>(&mut self) -> ControlFlow<()> {
            self.0.push(CapabilityId::of::<B>());
            ControlFlow::Continue(())
        }
    }

    let mut direct = Direct(Vec::new());
    let _ = T::visit_base_types(&mut direct);
    direct.0
}

/// Every capability `T` transitively supports, each listed once.
///
/// Order is first discovery in a depth-first walk of the declarations.
/// `T` itself is not included.
pub fn unique_bases<T: ?Sized + Interface>() -> Vec<CapabilityId> {
    struct Closure(Vec<CapabilityId>);

    impl TypeVisitor for Closure {
        type Output = ();

        fn visit<B: ?Sized + Interface>(&mut self) -> ControlFlow<()> {
            let id = CapabilityId::of::<B>();
            if !self.0.contains(&id) {
                self.0.push(id);
                B::visit_base_types(self)?;
            }
            ControlFlow::Continue(())
        }
    }

    let mut closure = Closure(Vec::new());
    let _ = T::visit_base_types(&mut closure);
    closure.0
}

/// Whether any transitive base of `T` has identity `target`.
pub fn reaches<T: ?Sized + Interface>(target: CapabilityId) -> bool {
    struct Reach(CapabilityId);

    impl TypeVisitor for Reach {
        type Output = ();

        fn visit<B: ?Sized + Interface>(&mut self) -> ControlFlow<()> {
            if CapabilityId::of::<B>() == self.0 {
                return ControlFlow::Break(());
            }
            B::visit_base_types(self)
        }
    }

    T::visit_base_types(&mut Reach(target)).is_break()
}

/// Root capabilities among `T` and its transitive bases.
pub fn roots<T: ?Sized + Interface>() -> Roots {
    struct Collect(Roots);

    impl TypeVisitor for Collect {
        type Output = ();

        fn visit<B: ?Sized + Interface>(&mut self) -> ControlFlow<()> {
            self.0 |= CapabilityId::of::<B>().root();
            if self.0.is_all() {
                return ControlFlow::Break(());
            }
            B::visit_base_types(self)
        }
    }

    let mut collect = Collect(CapabilityId::of::<T>().root());
    let _ = T::visit_base_types(&mut collect);
    collect.0
}
