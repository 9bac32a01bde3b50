//! Kernel object accessors
//!
//! An accessor is the capability a successful open returns: a
//! reference to a kernel object paired with the access mask granted at
//! open time. Each accessor has exactly one logical owner, and closing
//! it releases the object reference exactly once.

use alloc::sync::Arc;

use super::traits::{AccessMask, KernelObject};
use crate::error::KernelError;

/// Access-checked handle to a kernel object of type `T`.
pub struct Accessor<T: KernelObject> {
    /// Taken on close so a second close is a no-op, never a second
    /// reference-count decrement.
    object: Option<Arc<T>>,
    granted: AccessMask,
}

impl<T: KernelObject> Accessor<T> {
    pub(crate) fn new(object: Arc<T>, granted: AccessMask) -> Self {
        Self {
            object: Some(object),
            granted,
        }
    }

    /// Rights granted at open time.
    pub fn granted_access(&self) -> AccessMask {
        self.granted
    }

    /// The referenced object, or [`KernelError::HandleClosed`] after a
    /// close.
    pub fn object(&self) -> Result<&Arc<T>, KernelError> {
        self.object.as_ref().ok_or(KernelError::HandleClosed)
    }

    /// Verify the accessor grants all of `required`.
    pub fn check_access(&self, required: AccessMask) -> Result<(), KernelError> {
        if self.object.is_none() {
            return Err(KernelError::HandleClosed);
        }
        if required.is_subset_of(self.granted) {
            Ok(())
        } else {
            Err(KernelError::AccessDenied)
        }
    }

    /// Whether the accessor is still open.
    pub fn is_open(&self) -> bool {
        self.object.is_some()
    }

    /// Release the object reference. Idempotent; only the first call
    /// drops the reference and runs the object's close hook.
    pub fn close(&mut self) {
        if let Some(object) = self.object.take() {
            object.on_close();
            drop(object);
        }
    }
}

impl<T: KernelObject> core::fmt::Debug for Accessor<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Accessor")
            .field("open", &self.object.is_some())
            .field("granted", &self.granted)
            .finish()
    }
}

impl<T: KernelObject> Drop for Accessor<T> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use core::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::object::traits::KObjectId;

    #[derive(Debug)]
    struct Counted {
        id: KObjectId,
        closes: AtomicUsize,
    }

    impl Counted {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                id: KObjectId::new(),
                closes: AtomicUsize::new(0),
            })
        }
    }

    impl crate::object::traits::KernelObject for Counted {
        fn type_name(&self) -> &'static str {
            "Counted"
        }

        fn id(&self) -> KObjectId {
            self.id
        }

        fn on_close(&self) {
            self.closes.fetch_add(1, Ordering::Relaxed);
        }

        fn as_any(&self) -> &dyn core::any::Any {
            self
        }
    }

    #[test]
    fn close_is_idempotent() {
        let object = Counted::new();
        let mut accessor = Accessor::new(object.clone(), AccessMask::GENERIC_READ);
        assert_eq!(Arc::strong_count(&object), 2);

        accessor.close();
        assert_eq!(Arc::strong_count(&object), 1);
        assert_eq!(object.closes.load(Ordering::Relaxed), 1);

        // Second close neither decrements again nor re-runs the hook.
        accessor.close();
        assert_eq!(Arc::strong_count(&object), 1);
        assert_eq!(object.closes.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn drop_closes_exactly_once() {
        let object = Counted::new();
        {
            let _accessor = Accessor::new(object.clone(), AccessMask::GENERIC_READ);
        }
        assert_eq!(Arc::strong_count(&object), 1);
        assert_eq!(object.closes.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn closed_accessor_rejects_use() {
        let object = Counted::new();
        let mut accessor = Accessor::new(object, AccessMask::GENERIC_READ);
        accessor.close();

        assert_eq!(accessor.object().unwrap_err(), KernelError::HandleClosed);
        assert_eq!(
            accessor.check_access(AccessMask::GENERIC_READ).unwrap_err(),
            KernelError::HandleClosed
        );
    }

    #[test]
    fn rights_check_uses_subset_semantics() {
        let object = Counted::new();
        let accessor = Accessor::new(object, AccessMask::GENERIC_READ);

        assert!(accessor.check_access(AccessMask::GENERIC_READ).is_ok());
        assert!(accessor.check_access(AccessMask::empty()).is_ok());
        assert_eq!(
            accessor
                .check_access(AccessMask::GENERIC_WRITE)
                .unwrap_err(),
            KernelError::AccessDenied
        );
    }
}
