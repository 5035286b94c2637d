//! Scoped extra reference.

use crate::cap::RefCounted;

/// Holds one extra reference on a [`RefCounted`] for its own lifetime.
///
/// For code that must keep a self-counted component alive across a call
/// that may release the caller's own reference. On an instance built with
/// [`create_instance_with`](crate::create_instance_with) the extra
/// reference is a strong one, seen by `ComPtr::refs_count`.
pub struct RefCountedGuard<'a> {
    target: &'a dyn RefCounted,
}

impl<'a> RefCountedGuard<'a> {
    /// Take a reference on `target`, released when the guard drops.
    pub fn new(target: &'a dyn RefCounted) -> Self {
        target.add_ref();
        Self { target }
    }

    pub fn target(&self) -> &'a dyn RefCounted {
        self.target
    }
}

impl Drop for RefCountedGuard<'_> {
    fn drop(&mut self) {
        // SAFETY: drops the reference `new` took; the borrow keeps another.
        let prev = unsafe { self.target.remove_ref() };
        debug_assert!(prev > 1, "guard held the last reference");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ptr::{create_instance_with, ComClass, ComPtr, InstanceRc};
    use crate::{RefCountPolicy, SingleThreadRc};

    struct Job {
        rc: SingleThreadRc,
    }

    crate::component!(Job: dyn RefCounted);
    crate::ref_counted!(Job => rc);

    #[test]
    fn test_guard_scope() {
        let job = Job {
            rc: SingleThreadRc::new(),
        };
        {
            let guard = RefCountedGuard::new(&job);
            assert_eq!(job.rc.refs_count(), 2);
            assert!(!guard.target().no_refs());
        }
        assert_eq!(job.rc.refs_count(), 1);
    }

    struct Task {
        rc: InstanceRc<SingleThreadRc>,
    }

    crate::component!(Task: dyn RefCounted);
    crate::ref_counted!(Task => rc);

    impl ComClass for Task {
        type Policy = SingleThreadRc;
    }

    #[test]
    fn test_guard_holds_instance_reference() {
        let task = create_instance_with(|rc| Task { rc });
        {
            let _guard = RefCountedGuard::new(&*task);
            assert_eq!(ComPtr::refs_count(&task), 2);
            assert_eq!(task.rc.refs_count(), 2);
        }
        assert_eq!(ComPtr::refs_count(&task), 1);
    }
}
