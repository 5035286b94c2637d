//! Capability Declaration Macros
//!
//! - `capability!(dyn Drawable: dyn Anything)`: a capability and its direct bases
//! - `component!(Widget: dyn Drawable, dyn RefCounted)`: a concrete component
//! - `ref_counted!(Widget => rc)`: `RefCounted` through a counter field
//!
//! Every declared edge is an upcast coercion, so a base the type does not
//! really extend (or implement) fails to compile.

/// Declare a capability trait-object type and its direct bases.
///
/// Each base must be a supertrait of the capability.
///
/// ```
/// use comkit::{capability, Anything};
///
/// trait Drawable: Anything {}
/// capability!(dyn Drawable: dyn Anything);
/// ```
#[macro_export]
macro_rules! capability {
    ($cap:ty $(: $($base:ty),+ $(,)?)?) => {
        impl $crate::Interface for $cap {
            #[allow(unused_variables)]
            fn visit_bases<V: $crate::BaseVisitor>(
                this: *mut Self,
                visitor: &mut V,
            ) -> ::core::ops::ControlFlow<V::Output> {
                $($(
                    {
                        let base: *mut $base = this;
                        visitor.visit::<$base>(base)?;
                    }
                )+)?
                ::core::ops::ControlFlow::Continue(())
            }

            #[allow(unused_variables)]
            fn visit_base_types<V: $crate::TypeVisitor>(
                visitor: &mut V,
            ) -> ::core::ops::ControlFlow<V::Output> {
                $($(
                    visitor.visit::<$base>()?;
                )+)?
                ::core::ops::ControlFlow::Continue(())
            }
        }
    };
}

/// Declare a component type and its direct base capabilities.
///
/// Implements [`Interface`](crate::Interface), [`Anything`](crate::Anything)
/// and [`Component`](crate::Component). `dyn Anything` is appended as an
/// implicit last base. Generic components put their impl generics in
/// brackets, and need `'static` parameters:
///
/// ```
/// use comkit::{capability, component, Anything};
///
/// trait Drawable: Anything {}
/// capability!(dyn Drawable: dyn Anything);
///
/// struct Sprite<T>(T);
/// impl<T: 'static> Drawable for Sprite<T> {}
///
/// component!(impl[T: 'static] Sprite<T>: dyn Drawable);
/// ```
#[macro_export]
macro_rules! component {
    (impl [$($gen:tt)*] $ty:ty $(: $($base:ty),+ $(,)?)?) => {
        $crate::__component_impl!([$($gen)*] $ty; $($($base),+)?);
    };
    ($ty:ty $(: $($base:ty),+ $(,)?)?) => {
        $crate::__component_impl!([] $ty; $($($base),+)?);
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __component_impl {
    ([$($gen:tt)*] $ty:ty; $($base:ty),*) => {
        impl<$($gen)*> $crate::Interface for $ty {
            fn visit_bases<V: $crate::BaseVisitor>(
                this: *mut Self,
                visitor: &mut V,
            ) -> ::core::ops::ControlFlow<V::Output> {
                $(
                    {
                        let base: *mut $base = this;
                        visitor.visit::<$base>(base)?;
                    }
                )*
                let anything: *mut dyn $crate::Anything = this;
                visitor.visit::<dyn $crate::Anything>(anything)
            }

            fn visit_base_types<V: $crate::TypeVisitor>(
                visitor: &mut V,
            ) -> ::core::ops::ControlFlow<V::Output> {
                $(
                    visitor.visit::<$base>()?;
                )*
                visitor.visit::<dyn $crate::Anything>()
            }
        }

        impl<$($gen)*> $crate::Anything for $ty {
            fn is(&self, id: $crate::CapabilityId) -> bool {
                $crate::supports::<Self>(id)
            }

            fn query(
                &self,
                id: $crate::CapabilityId,
            ) -> ::core::option::Option<$crate::RawCapability<'_>> {
                $crate::rt_cast(self, id)
            }
        }

        impl<$($gen)*> $crate::Component for $ty {}
    };
}

/// Implement [`RefCounted`](crate::RefCounted) for a component by
/// delegating to a counter field.
///
/// The field is either an [`InstanceRc`](crate::InstanceRc), for components
/// built with [`create_instance_with`](crate::create_instance_with) whose
/// capability drives the instance lifetime, or a plain
/// [`RefCountPolicy`](crate::RefCountPolicy) the caller manages:
///
/// ```
/// use comkit::{component, ref_counted, ConcurrentRc, RefCounted};
///
/// struct Texture {
///     rc: ConcurrentRc,
/// }
///
/// component!(Texture: dyn RefCounted);
/// ref_counted!(Texture => rc);
/// ```
#[macro_export]
macro_rules! ref_counted {
    (impl [$($gen:tt)*] $ty:ty => $field:tt) => {
        $crate::__ref_counted_impl!([$($gen)*] $ty => $field);
    };
    ($ty:ty => $field:tt) => {
        $crate::__ref_counted_impl!([] $ty => $field);
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __ref_counted_impl {
    ([$($gen:tt)*] $ty:ty => $field:tt) => {
        impl<$($gen)*> $crate::RefCounted for $ty {
            fn add_ref(&self) -> u32 {
                $crate::rc::RefCountField::add_ref(&self.$field)
            }

            unsafe fn remove_ref(&self) -> u32 {
                // SAFETY: the caller's contract is the counter's.
                unsafe { $crate::rc::RefCountField::remove_ref(&self.$field) }
            }

            fn no_refs(&self) -> bool {
                $crate::rc::RefCountField::no_refs(&self.$field)
            }

            fn try_add_ref(&self) -> bool {
                $crate::rc::RefCountField::try_add_ref(&self.$field)
            }
        }
    };
}
