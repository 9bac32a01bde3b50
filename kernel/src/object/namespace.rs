// Object manager namespace.
//
// A process-wide table mapping well-known paths to kernel objects.
// Opens are access-checked and hand out reference-counted accessors;
// the table never holds a stale entry for a destroyed object because
// unbinding removes the table's reference in one step and destruction
// follows from the last reference going away.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use spin::Mutex;

use super::accessor::Accessor;
use super::traits::{AccessMask, DowncastArc, KernelObject};
use crate::error::KernelError;

/// Open-time request descriptor: the namespace path to look up and the
/// rights the caller wants on the resulting accessor. Not retained
/// after the open.
#[derive(Debug, Clone)]
pub struct ObjectAttributes {
    name: String,
    desired_access: AccessMask,
}

impl ObjectAttributes {
    pub fn new(name: &str, desired_access: AccessMask) -> Self {
        Self {
            name: String::from(name),
            desired_access,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn desired_access(&self) -> AccessMask {
        self.desired_access
    }
}

/// The object manager's named registry.
pub struct ObjectNamespace {
    bindings: Mutex<BTreeMap<String, Arc<dyn KernelObject>>>,
}

impl ObjectNamespace {
    pub const fn new() -> Self {
        Self {
            bindings: Mutex::new(BTreeMap::new()),
        }
    }

    /// Open the object bound at `attributes.name()`.
    ///
    /// Fails with [`KernelError::NotFound`] on a lookup miss,
    /// [`KernelError::TypeMismatch`] when the binding is not a `T`,
    /// and [`KernelError::AccessDenied`] when the desired access is
    /// not a subset of the object's policy. On success the object's
    /// reference count is incremented before the accessor is handed
    /// to the caller.
    pub fn open<T: KernelObject>(
        &self,
        attributes: &ObjectAttributes,
    ) -> Result<Accessor<T>, KernelError> {
        let object = {
            let bindings = self.bindings.lock();
            bindings
                .get(attributes.name())
                .cloned()
                .ok_or(KernelError::NotFound)?
        };

        let object = object.downcast_arc::<T>()?;
        let desired = attributes.desired_access();
        if !desired.is_subset_of(object.allowed_access()) {
            return Err(KernelError::AccessDenied);
        }
        Ok(Accessor::new(object, desired))
    }

    /// Bind `object` under `path`. Fails with
    /// [`KernelError::NameCollision`] if the path is already bound.
    pub fn install(&self, path: &str, object: Arc<dyn KernelObject>) -> Result<(), KernelError> {
        let mut bindings = self.bindings.lock();
        if bindings.contains_key(path) {
            return Err(KernelError::NameCollision);
        }
        log::debug!("namespace: bound {} ({})", path, object.type_name());
        bindings.insert(String::from(path), object);
        Ok(())
    }

    /// Unbind `path`.
    ///
    /// Removal is atomic from an observer's viewpoint; the object's
    /// destruction, if this was the last reference, runs after the
    /// table lock is released and therefore never inside the critical
    /// section.
    pub fn remove(&self, path: &str) -> Result<(), KernelError> {
        let object = {
            let mut bindings = self.bindings.lock();
            bindings.remove(path).ok_or(KernelError::NotFound)?
        };
        log::debug!("namespace: unbound {}", path);
        drop(object);
        Ok(())
    }

    /// Whether `path` is currently bound.
    pub fn contains(&self, path: &str) -> bool {
        self.bindings.lock().contains_key(path)
    }

    /// Number of live bindings.
    pub fn len(&self) -> usize {
        self.bindings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.lock().is_empty()
    }
}

impl Default for ObjectNamespace {
    fn default() -> Self {
        Self::new()
    }
}
