//! Capability Identity
//!
//! A capability is known by its type at compile time and by a
//! `CapabilityId` at runtime. Identities are derived from
//! `core::any::TypeId`, so two capabilities compare equal exactly when they
//! are the same declared type, whichever graph path reached them.
//!
//! # Identity Structure
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    CapabilityId                          │
//! ├──────────────────────────────────────────────────────────┤
//! │  type_id: TypeId         - Compared and hashed           │
//! │  name: &'static str      - Diagnostics only              │
//! └──────────────────────────────────────────────────────────┘
//! ```

use core::any::{type_name, TypeId};
use core::fmt;
use core::hash::{Hash, Hasher};

use bitflags::bitflags;

use super::root::{Anything, RefCounted};

/// Runtime identity of a capability (or of a component type).
///
/// Obtained with [`CapabilityId::of`]. Cheap to copy and compare.
#[derive(Clone, Copy)]
pub struct CapabilityId {
    type_id: TypeId,
    name: &'static str,
}

impl CapabilityId {
    /// Identity of `C`, usually a trait-object type such as `dyn Drawable`.
    #[inline]
    pub fn of<C: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<C>(),
            name: type_name::<C>(),
        }
    }

    /// Identity of the universal root capability.
    #[inline]
    pub fn anything() -> Self {
        Self::of::<dyn Anything>()
    }

    /// Identity of the lifetime-management root capability.
    #[inline]
    pub fn ref_counted() -> Self {
        Self::of::<dyn RefCounted>()
    }

    /// Type name the identity was created from.
    ///
    /// Not guaranteed unique or stable; use it for messages only.
    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Underlying type identity.
    #[inline]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Which root capability, if any, this identity names.
    pub fn root(&self) -> Roots {
        if *self == Self::anything() {
            Roots::ANYTHING
        } else if *self == Self::ref_counted() {
            Roots::REF_COUNTED
        } else {
            Roots::empty()
        }
    }
}

impl PartialEq for CapabilityId {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for CapabilityId {}

impl Hash for CapabilityId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CapabilityId({})", self.name)
    }
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

bitflags! {
    /// Root capabilities reachable from a type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Roots: u8 {
        /// The universal `Anything` marker.
        const ANYTHING = 1 << 0;
        /// The `RefCounted` lifetime-management capability.
        const REF_COUNTED = 1 << 1;
    }
}
