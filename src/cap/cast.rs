//! Capability Casts
//!
//! Three lookups over the declared capability graph:
//! - `cast` / `cast_mut`: target type known at compile time, typed result
//! - `rt_cast`: target identity known only at runtime, untyped result
//! - `supports`: type-level predicate, no instance
//!
//! None of them allocate, block or mutate the instance. A miss is a plain
//! `None`/`false`.
//!
//! # Walk Order
//! Direct bases are tried left to right as declared, depth first. All views
//! of one component share the component's address, so a capability reached
//! through two paths (a diamond) resolves to the same pointer either way.

use core::marker::PhantomData;
use core::mem::{size_of, MaybeUninit};
use core::ops::ControlFlow;
use core::ptr;

use super::graph::{self, BaseVisitor, Interface};
use super::id::{CapabilityId, Roots};
use super::root::{Anything, RefCounted};

/// Marker for concrete component types.
///
/// Implemented by [`component!`](crate::component) together with
/// [`Interface`] and [`Anything`].
pub trait Component: Interface + Anything + Sized {}

/// Pointer storage large enough for a thin or a trait-object pointer.
type PtrSlot = MaybeUninit<[usize; 2]>;

/// A pointer to some capability view, with its static type erased.
///
/// The identity recorded at construction is the only key that gets the
/// typed pointer back out.
#[derive(Clone, Copy)]
struct ErasedPtr {
    id: CapabilityId,
    address: *const (),
    slot: PtrSlot,
}

impl ErasedPtr {
    fn new<C: ?Sized + 'static>(ptr: *mut C) -> Self {
        const { assert!(size_of::<*mut C>() <= size_of::<PtrSlot>()) };

        let mut slot = PtrSlot::uninit();
        // SAFETY: the slot is large enough (checked above) and aligned for
        // a pointer.
        unsafe { slot.as_mut_ptr().cast::<*mut C>().write(ptr) };

        Self {
            id: CapabilityId::of::<C>(),
            address: ptr.cast::<()>().cast_const(),
            slot,
        }
    }

    fn downcast<C: ?Sized + 'static>(&self) -> Option<*mut C> {
        if self.id != CapabilityId::of::<C>() {
            return None;
        }
        // SAFETY: equal identities mean `new::<C>` wrote this slot.
        Some(unsafe { self.read::<C>() })
    }

    /// # Safety
    /// The slot must have been written by `new::<C>`.
    unsafe fn read<C: ?Sized + 'static>(&self) -> *mut C {
        // SAFETY: guaranteed by the caller.
        unsafe { self.slot.as_ptr().cast::<*mut C>().read() }
    }
}

/// Result of a dynamic cast: a capability view whose type the caller only
/// knows by identity.
///
/// Borrows the instance it was cast from.
#[derive(Clone, Copy)]
pub struct RawCapability<'a> {
    ptr: ErasedPtr,
    _borrow: PhantomData<&'a ()>,
    // The view may not be `Sync`; keep the erased form on this thread.
    _not_send: PhantomData<*const ()>,
}

impl<'a> RawCapability<'a> {
    /// Erase a typed capability view.
    #[inline]
    pub fn new<C: ?Sized + 'static>(view: &'a C) -> Self {
        Self::from_ptr(ptr::from_ref(view).cast_mut())
    }

    #[inline]
    fn from_ptr<C: ?Sized + 'static>(ptr: *mut C) -> Self {
        Self {
            ptr: ErasedPtr::new(ptr),
            _borrow: PhantomData,
            _not_send: PhantomData,
        }
    }

    /// Identity this view was resolved for.
    #[inline]
    pub fn id(&self) -> CapabilityId {
        self.ptr.id
    }

    /// Address of the viewed object.
    #[inline]
    pub fn address(&self) -> *const () {
        self.ptr.address
    }

    /// The view as `C`, if `C` is the identity it was resolved for.
    #[inline]
    pub fn downcast<C: ?Sized + 'static>(self) -> Option<&'a C> {
        // SAFETY: the pointer came from a `&'a C` (or an upcast of one).
        self.ptr.downcast::<C>().map(|ptr| unsafe { &*ptr })
    }

    /// The view as `C` without checking the identity.
    ///
    /// # Safety
    /// `C` must be the capability this view was resolved for.
    #[inline]
    pub unsafe fn reinterpret<C: ?Sized + 'static>(self) -> &'a C {
        debug_assert_eq!(self.ptr.id, CapabilityId::of::<C>());
        // SAFETY: guaranteed by the caller.
        unsafe { &*self.ptr.read::<C>() }
    }
}

impl core::fmt::Debug for RawCapability<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "RawCapability({} @ {:p})", self.ptr.id, self.ptr.address)
    }
}

/// Depth-first search for `target` below (and including) a node.
fn walk<N: ?Sized + Interface>(node: *mut N, target: CapabilityId) -> Option<ErasedPtr> {
    struct Search(CapabilityId);

    impl BaseVisitor for Search {
        type Output = ErasedPtr;

        fn visit<B: ?Sized + Interface>(&mut self, base: *mut B) -> ControlFlow<ErasedPtr> {
            match walk(base, self.0) {
                Some(found) => ControlFlow::Break(found),
                None => ControlFlow::Continue(()),
            }
        }
    }

    if CapabilityId::of::<N>() == target {
        return Some(ErasedPtr::new(node));
    }

    match N::visit_bases(node, &mut Search(target)) {
        ControlFlow::Break(found) => Some(found),
        ControlFlow::Continue(()) => None,
    }
}

/// Match `target` against the direct bases only.
fn direct<N: ?Sized + Interface>(node: *mut N, target: CapabilityId) -> Option<ErasedPtr> {
    struct Direct(CapabilityId);

    impl BaseVisitor for Direct {
        type Output = ErasedPtr;

        fn visit<B: ?Sized + Interface>(&mut self, base: *mut B) -> ControlFlow<ErasedPtr> {
            if CapabilityId::of::<B>() == self.0 {
                return ControlFlow::Break(ErasedPtr::new(base));
            }
            ControlFlow::Continue(())
        }
    }

    match N::visit_bases(node, &mut Direct(target)) {
        ControlFlow::Break(found) => Some(found),
        ControlFlow::Continue(()) => None,
    }
}

fn find<C: ?Sized + 'static, T: ?Sized + Interface>(node: *mut T) -> Option<*mut C> {
    let target = CapabilityId::of::<C>();

    let found = if CapabilityId::of::<T>() == target {
        ErasedPtr::new(node)
    } else {
        direct(node, target).or_else(|| walk(node, target))?
    };

    found.downcast::<C>()
}

/// Statically typed capability cast.
///
/// Returns `instance` viewed as capability `C`, or `None` when no declared
/// path leads to `C`.
///
/// ```
/// use comkit::{cast, component, Anything};
///
/// struct Gauge;
/// component!(Gauge);
///
/// assert!(cast::<dyn Anything, _>(&Gauge).is_some());
/// ```
#[inline]
pub fn cast<C: ?Sized + 'static, T: ?Sized + Interface>(instance: &T) -> Option<&C> {
    let node = ptr::from_ref(instance).cast_mut();
    // SAFETY: the pointer is an upcast of `instance` and is only read.
    find::<C, T>(node).map(|view| unsafe { &*view })
}

/// Mutable form of [`cast`].
#[inline]
pub fn cast_mut<C: ?Sized + 'static, T: ?Sized + Interface>(instance: &mut T) -> Option<&mut C> {
    let node = ptr::from_mut(instance);
    // SAFETY: the pointer is an upcast of the exclusive borrow `instance`,
    // which it inherits.
    find::<C, T>(node).map(|view| unsafe { &mut *view })
}

/// The component as `Anything`. Always succeeds.
#[inline]
pub fn as_anything<T: Component>(instance: &T) -> &(dyn Anything + 'static) {
    instance
}

/// The component as `RefCounted`, if it declares it.
#[inline]
pub fn as_ref_counted<T: Component>(instance: &T) -> Option<&(dyn RefCounted + 'static)> {
    cast::<dyn RefCounted, T>(instance)
}

/// [`rt_cast`] fast path for the `Anything` root.
#[inline]
pub fn rt_cast_anything<T: Component>(instance: &T) -> RawCapability<'_> {
    RawCapability::new(as_anything(instance))
}

/// [`rt_cast`] fast path for the `RefCounted` root.
#[inline]
pub fn rt_cast_ref_counted<T: Component>(instance: &T) -> Option<RawCapability<'_>> {
    as_ref_counted(instance).map(RawCapability::new)
}

/// Dynamically typed capability cast.
///
/// Looks `target` up in the component's graph and returns the untyped
/// view, or `None`. The two root capabilities skip the graph search.
pub fn rt_cast<T: Component>(instance: &T, target: CapabilityId) -> Option<RawCapability<'_>> {
    let root = target.root();
    if root == Roots::ANYTHING {
        return Some(rt_cast_anything(instance));
    }
    if root == Roots::REF_COUNTED {
        return rt_cast_ref_counted(instance);
    }

    let node = ptr::from_ref(instance).cast_mut();
    walk(node, target).map(|found| RawCapability {
        ptr: found,
        _borrow: PhantomData,
        _not_send: PhantomData,
    })
}

/// Whether type `T` supports capability `target`.
///
/// Agrees with `rt_cast(instance, target).is_some()` for every instance of
/// `T`.
pub fn supports<T: ?Sized + Interface>(target: CapabilityId) -> bool {
    let root = target.root();
    if !root.is_empty() {
        return graph::roots::<T>().contains(root);
    }

    CapabilityId::of::<T>() == target || graph::reaches::<T>(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConcurrentRc, SingleThreadRc};

    trait Drawable: Anything {
        fn draw(&self) -> u32;
    }

    trait Serializable: Anything {}

    trait Resizable: Anything {
        fn resize(&mut self, width: u32);
    }

    crate::capability!(dyn Drawable: dyn Anything);
    crate::capability!(dyn Serializable: dyn Anything);
    crate::capability!(dyn Resizable: dyn Anything);

    struct Widget {
        rc: ConcurrentRc,
        width: u32,
    }

    impl Drawable for Widget {
        fn draw(&self) -> u32 {
            self.width
        }
    }

    impl Resizable for Widget {
        fn resize(&mut self, width: u32) {
            self.width = width;
        }
    }

    crate::component!(Widget: dyn Drawable, dyn RefCounted, dyn Resizable);
    crate::ref_counted!(Widget => rc);

    fn widget() -> Widget {
        Widget {
            rc: ConcurrentRc::default(),
            width: 4,
        }
    }

    // Diamond: Both -> {Left, Right} -> RefCounted.
    trait Left: RefCounted {}
    trait Right: RefCounted {}
    trait Both: Left + Right {}

    crate::capability!(dyn Left: dyn RefCounted);
    crate::capability!(dyn Right: dyn RefCounted);
    crate::capability!(dyn Both: dyn Left, dyn Right);

    struct Gem {
        rc: SingleThreadRc,
    }

    impl Left for Gem {}
    impl Right for Gem {}
    impl Both for Gem {}

    crate::component!(Gem: dyn Both);
    crate::ref_counted!(Gem => rc);

    fn address<C: ?Sized>(view: &C) -> *const () {
        ptr::from_ref(view).cast::<()>()
    }

    #[test]
    fn test_static_cast_declared() {
        let w = widget();
        assert_eq!(cast::<dyn Drawable, _>(&w).unwrap().draw(), 4);
        assert!(cast::<dyn RefCounted, _>(&w).is_some());
        assert!(cast::<dyn Anything, _>(&w).is_some());
        assert!(cast::<Widget, _>(&w).is_some());
    }

    #[test]
    fn test_static_cast_undeclared_is_none() {
        let w = widget();
        assert!(cast::<dyn Serializable, _>(&w).is_none());
        assert!(cast::<Gem, _>(&w).is_none());
    }

    #[test]
    fn test_static_cast_mut() {
        let mut w = widget();
        cast_mut::<dyn Resizable, _>(&mut w).unwrap().resize(9);
        assert_eq!(w.width, 9);
        assert!(cast_mut::<dyn Serializable, _>(&mut w).is_none());
    }

    #[test]
    fn test_static_cast_from_capability_view() {
        let w = widget();
        let drawable: &dyn Drawable = &w;
        assert!(cast::<dyn Anything, _>(drawable).is_some());
        // A view only knows its own declared bases.
        assert!(cast::<dyn RefCounted, _>(drawable).is_none());
    }

    #[test]
    fn test_cast_is_idempotent() {
        let w = widget();
        let first = cast::<dyn Drawable, _>(&w).unwrap();
        let second = cast::<dyn Drawable, _>(&w).unwrap();
        assert!(ptr::eq(first, second));
    }

    #[test]
    fn test_diamond_paths_share_address() {
        let gem = Gem {
            rc: SingleThreadRc::default(),
        };
        let left = cast::<dyn Left, _>(&gem).unwrap();
        let right = cast::<dyn Right, _>(&gem).unwrap();

        let via_left = cast::<dyn RefCounted, _>(left).unwrap();
        let via_right = cast::<dyn RefCounted, _>(right).unwrap();
        assert_eq!(address(via_left), address(via_right));
        assert_eq!(address(via_left), address(&gem));

        // Both paths reach the one counter.
        via_left.add_ref();
        assert_eq!(unsafe { via_right.remove_ref() }, 2);
    }

    #[test]
    fn test_rt_cast_general_path() {
        let w = widget();
        let raw = rt_cast(&w, CapabilityId::of::<dyn Drawable>()).unwrap();
        assert_eq!(raw.id(), CapabilityId::of::<dyn Drawable>());
        assert_eq!(raw.address(), address(&w));
        assert_eq!(raw.downcast::<dyn Drawable>().unwrap().draw(), 4);
        assert!(raw.downcast::<dyn Resizable>().is_none());

        assert!(rt_cast(&w, CapabilityId::of::<dyn Serializable>()).is_none());
    }

    #[test]
    fn test_rt_cast_own_type() {
        let w = widget();
        let raw = rt_cast(&w, CapabilityId::of::<Widget>()).unwrap();
        assert_eq!(raw.downcast::<Widget>().unwrap().width, 4);
    }

    #[test]
    fn test_rt_cast_roots() {
        let w = widget();
        assert!(rt_cast(&w, CapabilityId::anything()).is_some());
        let rc = rt_cast(&w, CapabilityId::ref_counted()).unwrap();
        assert_eq!(rc.downcast::<dyn RefCounted>().unwrap().add_ref(), 1);

        struct Bare;
        crate::component!(Bare);
        assert!(rt_cast_anything(&Bare).downcast::<dyn Anything>().is_some());
        assert!(rt_cast_ref_counted(&Bare).is_none());
        assert!(as_ref_counted(&Bare).is_none());
    }

    #[test]
    fn test_root_fast_paths_match_general_walk() {
        let w = widget();
        let anything = rt_cast_anything(&w);
        assert_eq!(anything.id(), CapabilityId::anything());
        assert_eq!(anything.address(), address(&w));

        let rc = rt_cast_ref_counted(&w).unwrap();
        assert_eq!(rc.id(), CapabilityId::ref_counted());
        assert_eq!(rc.address(), address(as_ref_counted(&w).unwrap()));
        assert!(ptr::addr_eq(
            rc.downcast::<dyn RefCounted>().unwrap(),
            cast::<dyn RefCounted, _>(&w).unwrap(),
        ));
    }

    #[test]
    fn test_reinterpret_matching_identity() {
        let w = widget();
        let raw = rt_cast(&w, CapabilityId::of::<dyn Drawable>()).unwrap();
        // SAFETY: resolved for `dyn Drawable`.
        let drawable = unsafe { raw.reinterpret::<dyn Drawable>() };
        assert_eq!(drawable.draw(), 4);
    }

    #[test]
    fn test_supports_agrees_with_rt_cast() {
        let w = widget();
        let gem = Gem {
            rc: SingleThreadRc::default(),
        };
        let ids = [
            CapabilityId::anything(),
            CapabilityId::ref_counted(),
            CapabilityId::of::<dyn Drawable>(),
            CapabilityId::of::<dyn Resizable>(),
            CapabilityId::of::<dyn Serializable>(),
            CapabilityId::of::<dyn Left>(),
            CapabilityId::of::<dyn Right>(),
            CapabilityId::of::<dyn Both>(),
            CapabilityId::of::<Widget>(),
            CapabilityId::of::<Gem>(),
        ];

        for id in ids {
            assert_eq!(supports::<Widget>(id), rt_cast(&w, id).is_some(), "{id}");
            assert_eq!(supports::<Gem>(id), rt_cast(&gem, id).is_some(), "{id}");
        }
    }

    #[test]
    fn test_supports_on_capability_types() {
        assert!(supports::<dyn Both>(CapabilityId::ref_counted()));
        assert!(supports::<dyn Both>(CapabilityId::anything()));
        assert!(!supports::<dyn Drawable>(CapabilityId::ref_counted()));
        assert!(supports::<dyn Drawable>(CapabilityId::of::<dyn Drawable>()));
    }
}
