//! Kernel error types
//!
//! Namespace and access errors are returned to the caller and are
//! recoverable; a caller may retry with different attributes. Chip
//! contract violations are not represented here at all: they are fatal
//! and halt the kernel instead of propagating.

use core::fmt;

/// Error type shared by the object manager, the driver framework and
/// the console subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Namespace lookup miss.
    NotFound,
    /// The named object exists but is of a different kernel type.
    TypeMismatch,
    /// Requested rights exceed what the object's policy allows, or an
    /// accessor was used for an operation its mask does not grant.
    AccessDenied,
    /// Duplicate registration under an already-bound namespace path.
    NameCollision,
    /// Read on a write-only device or write on a read-only device.
    UnsupportedDirection,
    /// A wait expired before the object was signaled.
    Timeout,
    /// The accessor was already closed.
    HandleClosed,
    /// Operation not legal for the object's current state.
    InvalidState,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KernelError::NotFound => "object not found",
            KernelError::TypeMismatch => "kernel object type mismatch",
            KernelError::AccessDenied => "access denied",
            KernelError::NameCollision => "name already bound",
            KernelError::UnsupportedDirection => "unsupported transfer direction",
            KernelError::Timeout => "wait timed out",
            KernelError::HandleClosed => "accessor already closed",
            KernelError::InvalidState => "invalid object state",
        };
        f.write_str(s)
    }
}

/// Convenience alias used throughout the kernel.
pub type Result<T> = core::result::Result<T, KernelError>;
