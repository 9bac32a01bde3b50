//! Compile-time kernel configuration.

/// Well-known namespace path the console driver installs its device
/// under, and the path boot-time service wiring opens the standard
/// input/output/error accessors from.
pub const DEFAULT_CONSOLE_PATH: &str = "/device/console";

/// Capacity of the console event ring buffer. The oldest unread event
/// is evicted when a producer pushes into a full ring.
pub const CONSOLE_RING_CAPACITY: usize = 16;

/// Default stack size for newly created threads, in bytes.
pub const DEFAULT_STACK_SIZE: usize = 16 * 1024;

/// Default scheduler time slice, in timer ticks.
pub const DEFAULT_TIME_SLICE: u64 = 20;
