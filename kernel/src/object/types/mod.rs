//! Concrete kernel object types.

pub mod event;
pub mod thread;

pub use event::Event;
pub use thread::{Thread, ThreadState};
