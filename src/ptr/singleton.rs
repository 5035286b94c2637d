//! Process-wide component instances.

use spin::Once;

use super::com_ptr::ComPtr;
use super::{create_instance, ComClass};

/// A lazily created, process-wide component.
///
/// ```
/// use comkit::{component, ComClass, ConcurrentRc, Singleton};
///
/// struct Registry;
/// component!(Registry);
/// impl ComClass for Registry {
///     type Policy = ConcurrentRc;
/// }
///
/// static REGISTRY: Singleton<Registry> = Singleton::new();
///
/// let a = REGISTRY.get_or_init(|| Registry);
/// let b = REGISTRY.get_or_init(|| unreachable!());
/// assert!(comkit::ComPtr::ptr_eq(&a, &b));
/// ```
///
/// The instance holds one reference of its own and is never destroyed.
pub struct Singleton<T: ComClass> {
    instance: Once<ComPtr<T, T::Policy>>,
}

impl<T: ComClass> Singleton<T> {
    /// An empty slot; the instance is created on first use.
    pub const fn new() -> Self {
        Self {
            instance: Once::new(),
        }
    }

    /// The instance, created by `init` on first call.
    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> ComPtr<T, T::Policy> {
        self.instance
            .call_once(|| create_instance(init()))
            .clone()
    }

    /// The instance, if it was created.
    pub fn get(&self) -> Option<ComPtr<T, T::Policy>> {
        self.instance.get().cloned()
    }
}

impl<T: ComClass> Default for Singleton<T> {
    fn default() -> Self {
        Self::new()
    }
}
