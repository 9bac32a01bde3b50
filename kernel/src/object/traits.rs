// Kernel object base traits.

use core::any::Any;
use core::sync::atomic::{AtomicU64, Ordering};

use alloc::sync::Arc;

use crate::error::KernelError;

/// Kernel object identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KObjectId(u64);

impl KObjectId {
    pub fn new() -> KObjectId {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        KObjectId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for KObjectId {
    fn default() -> Self {
        Self::new()
    }
}

bitflags::bitflags! {
    /// Rights recorded on an accessor at open time.
    ///
    /// Granted rights never exceed what was requested and what the
    /// object's access policy allows; checks use subset semantics as
    /// with capability rights.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessMask: u32 {
        const GENERIC_READ  = 1 << 0;
        const GENERIC_WRITE = 1 << 1;
    }
}

impl AccessMask {
    /// True when every right in `self` is also present in `other`.
    pub fn is_subset_of(self, other: AccessMask) -> bool {
        other.contains(self)
    }
}

/// Trait every kernel object implements.
///
/// A kernel object carries a type tag, a reference count (through
/// `Arc`) and optionally a namespace name. It is owned by the object
/// manager's namespace table while named, otherwise by whichever
/// accessors still hold it.
pub trait KernelObject: Send + Sync + Any {
    /// Type tag, checked on typed opens.
    fn type_name(&self) -> &'static str;

    /// Object identifier.
    fn id(&self) -> KObjectId;

    /// Namespace name, if the object carries one.
    fn name(&self) -> Option<&str> {
        None
    }

    /// Rights the object's access policy allows at open time.
    fn allowed_access(&self) -> AccessMask {
        AccessMask::all()
    }

    /// Called each time an accessor to this object is closed.
    fn on_close(&self) {}

    /// Upcast used by the typed downcast helpers.
    fn as_any(&self) -> &dyn Any;
}

/// Typed downcast for `Arc<dyn KernelObject>`.
pub trait DowncastArc {
    /// Recover the concrete object type, or fail with
    /// [`KernelError::TypeMismatch`].
    fn downcast_arc<T: KernelObject>(self) -> Result<Arc<T>, KernelError>;
}

impl DowncastArc for Arc<dyn KernelObject> {
    fn downcast_arc<T: KernelObject>(self) -> Result<Arc<T>, KernelError> {
        if self.as_any().is::<T>() {
            // Type checked above; Arc<dyn _> and Arc<T> share the same
            // allocation, only the vtable pointer is dropped.
            let ptr = Arc::into_raw(self);
            Ok(unsafe { Arc::from_raw(ptr as *const T) })
        } else {
            Err(KernelError::TypeMismatch)
        }
    }
}
