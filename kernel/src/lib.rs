//! Vireo kernel substrate
//!
//! A small embeddable kernel core: a chip abstraction layer, a
//! capability-checked object namespace, a round-robin scheduler, a
//! device/driver matching framework and a console subsystem. The crate
//! is `no_std` + `alloc`; the test build runs hosted against the
//! emulated chip.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod chip; // Chip abstraction layer and the emulated chip
pub mod config; // Build-time tunables
pub mod console; // Host I/O seam and console host service
pub mod drivers; // Device descriptions, drivers, driver registry
pub mod error; // Kernel error taxonomy
pub mod kernel; // Composition root and boot sequence
pub mod logging; // `log` facade backend over chip debug output
pub mod object; // Kernel objects, accessors, namespace
pub mod sched; // Per-processor round-robin scheduler

pub use error::{KernelError, Result};

pub const KERNEL_NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
