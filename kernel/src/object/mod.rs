//! Kernel object system
//!
//! Capability-style object manager:
//! - every kernel resource (device, thread, event) is an object
//! - objects are reached through accessors carrying an access mask,
//!   granted and checked at open time
//! - lifetime is reference counted; a named object is additionally
//!   kept alive by its namespace binding

pub mod accessor;
pub mod namespace;
pub mod traits;
pub mod types;

pub use accessor::Accessor;
pub use namespace::{ObjectAttributes, ObjectNamespace};
pub use traits::{AccessMask, DowncastArc, KObjectId, KernelObject};

/// Implements the boilerplate part of [`KernelObject`] for a type with
/// an `id: KObjectId` field.
#[macro_export]
macro_rules! impl_kernel_object {
    ($type:ty, $name:expr) => {
        impl $crate::object::traits::KernelObject for $type {
            fn type_name(&self) -> &'static str {
                $name
            }

            fn id(&self) -> $crate::object::traits::KObjectId {
                self.id
            }

            fn as_any(&self) -> &dyn core::any::Any {
                self
            }
        }
    };
}
