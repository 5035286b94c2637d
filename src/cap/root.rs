//! Root Capabilities
//!
//! Two capabilities are special-cased by every cast:
//! - `Anything`: no contract of its own; every component reaches it
//! - `RefCounted`: the lifetime-management contract
//!
//! Both are resolved without a general graph search (see `cast`).

use super::cast::RawCapability;
use super::id::CapabilityId;

/// The universal capability: "this is a component".
///
/// Implemented for every component by [`component!`](crate::component);
/// `is` answers [`supports`](crate::supports) for the component type and
/// `query` performs [`rt_cast`](crate::rt_cast) on the instance. Capability
/// traits that extend `Anything` therefore let a caller holding only a
/// capability view ask for any other capability of the same component.
pub trait Anything {
    /// Whether the component supports the capability `id`.
    fn is(&self, id: CapabilityId) -> bool;

    /// The component viewed as capability `id`, if supported.
    fn query(&self, id: CapabilityId) -> Option<RawCapability<'_>>;
}

/// Lifetime-management capability.
///
/// Counts start at 1 (the creator's reference). The release that returns 1
/// was the last one:
/// - a counted instance (counter is an [`InstanceRc`](crate::InstanceRc))
///   destroys itself inside that `remove_ref`
/// - a component with an embedded policy counter is left to the caller,
///   who is responsible for destruction
pub trait RefCounted: Anything {
    /// Add a reference, returning the previous count.
    fn add_ref(&self) -> u32;

    /// Remove a reference, returning the previous count.
    ///
    /// # Safety
    /// The caller must own the reference it removes (one taken with
    /// `add_ref`, or the creator's), and must not touch the component
    /// again when this returns 1.
    unsafe fn remove_ref(&self) -> u32;

    /// Whether the count reached zero.
    fn no_refs(&self) -> bool;

    /// Add a reference only while the count is nonzero.
    ///
    /// The provided form checks and then increments, which races under
    /// concurrent use; implementations backed by
    /// [`ConcurrentRc`](crate::ConcurrentRc) must forward to its atomic
    /// version ([`ref_counted!`](crate::ref_counted) does).
    fn try_add_ref(&self) -> bool {
        if self.no_refs() {
            return false;
        }

        self.add_ref();
        true
    }
}

crate::capability!(dyn Anything);
crate::capability!(dyn RefCounted: dyn Anything);

/// Typed forms of the [`Anything`] queries.
///
/// Blanket-implemented, so it works on components and on every capability
/// view that extends `Anything`.
pub trait AnythingExt: Anything {
    /// Whether the component supports capability `C`.
    #[inline]
    fn is_capability<C: ?Sized + 'static>(&self) -> bool {
        self.is(CapabilityId::of::<C>())
    }

    /// The component viewed as capability `C`.
    #[inline]
    fn capability<C: ?Sized + 'static>(&self) -> Option<&C> {
        self.query(CapabilityId::of::<C>())?.downcast::<C>()
    }
}

impl<T: ?Sized + Anything> AnythingExt for T {}
