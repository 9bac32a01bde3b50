//! Console host service
//!
//! Two seams live here. [`HostIo`] is the interop boundary toward
//! native/platform code: three well-known handles, read/write by
//! handle, and a console-handle predicate — the kernel does not
//! specify what lies beyond it. [`ConsoleHostService`] is the thin
//! composition root that, at boot, opens the standard input, output
//! and error accessors against the console device so user-level
//! services inherit a uniform I/O surface.

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use spin::Mutex;

use crate::config::DEFAULT_CONSOLE_PATH;
use crate::drivers::console::ConsoleDevice;
use crate::error::KernelError;
use crate::object::accessor::Accessor;
use crate::object::namespace::{ObjectAttributes, ObjectNamespace};
use crate::object::traits::AccessMask;

/// Opaque platform I/O handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostHandle(pub u32);

/// Interop boundary toward the hosting platform.
pub trait HostIo: Send + Sync {
    fn standard_input(&self) -> HostHandle;
    fn standard_output(&self) -> HostHandle;
    fn standard_error(&self) -> HostHandle;

    fn read(&self, handle: HostHandle, buf: &mut [u8]) -> usize;
    fn write(&self, handle: HostHandle, buf: &[u8]) -> usize;

    /// Whether `handle` refers to an interactive console.
    fn is_console_handle(&self, handle: HostHandle) -> bool;
}

/// In-memory [`HostIo`] used by the emulated platform and the test
/// suite: input is fed programmatically, output and error accumulate.
pub struct BufferedHostIo {
    input: Mutex<VecDeque<u8>>,
    output: Mutex<Vec<u8>>,
    error: Mutex<Vec<u8>>,
}

impl BufferedHostIo {
    const STDIN: HostHandle = HostHandle(0);
    const STDOUT: HostHandle = HostHandle(1);
    const STDERR: HostHandle = HostHandle(2);

    pub fn new() -> Self {
        Self {
            input: Mutex::new(VecDeque::new()),
            output: Mutex::new(Vec::new()),
            error: Mutex::new(Vec::new()),
        }
    }

    /// Queue bytes for the input handle.
    pub fn feed_input(&self, bytes: &[u8]) {
        self.input.lock().extend(bytes.iter().copied());
    }

    pub fn take_output(&self) -> Vec<u8> {
        core::mem::take(&mut *self.output.lock())
    }

    pub fn take_error(&self) -> Vec<u8> {
        core::mem::take(&mut *self.error.lock())
    }
}

impl Default for BufferedHostIo {
    fn default() -> Self {
        Self::new()
    }
}

impl HostIo for BufferedHostIo {
    fn standard_input(&self) -> HostHandle {
        Self::STDIN
    }

    fn standard_output(&self) -> HostHandle {
        Self::STDOUT
    }

    fn standard_error(&self) -> HostHandle {
        Self::STDERR
    }

    fn read(&self, handle: HostHandle, buf: &mut [u8]) -> usize {
        if handle != Self::STDIN {
            return 0;
        }
        let mut input = self.input.lock();
        let mut n = 0;
        while n < buf.len() {
            match input.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    fn write(&self, handle: HostHandle, buf: &[u8]) -> usize {
        match handle {
            Self::STDOUT => self.output.lock().extend_from_slice(buf),
            Self::STDERR => self.error.lock().extend_from_slice(buf),
            _ => return 0,
        }
        buf.len()
    }

    fn is_console_handle(&self, handle: HostHandle) -> bool {
        handle == Self::STDIN || handle == Self::STDOUT || handle == Self::STDERR
    }
}

/// External observability hook the kernel queries at boot; it never
/// implements one itself.
pub trait MemoryStats: Send + Sync {
    fn used_bytes(&self) -> usize;
    fn free_bytes(&self) -> usize;
}

/// Stand-in for platforms without memory accounting.
pub struct NoMemoryStats;

impl MemoryStats for NoMemoryStats {
    fn used_bytes(&self) -> usize {
        0
    }

    fn free_bytes(&self) -> usize {
        0
    }
}

/// Standard console accessors opened once at boot.
#[derive(Debug)]
pub struct ConsoleHostService {
    input: Accessor<ConsoleDevice>,
    output: Accessor<ConsoleDevice>,
    error: Accessor<ConsoleDevice>,
}

impl ConsoleHostService {
    /// Open the three standard accessors against the well-known
    /// console path: input with read access, output and error with
    /// write access.
    pub fn open(namespace: &ObjectNamespace) -> Result<Self, KernelError> {
        let input = namespace.open::<ConsoleDevice>(&ObjectAttributes::new(
            DEFAULT_CONSOLE_PATH,
            AccessMask::GENERIC_READ,
        ))?;
        let output = namespace.open::<ConsoleDevice>(&ObjectAttributes::new(
            DEFAULT_CONSOLE_PATH,
            AccessMask::GENERIC_WRITE,
        ))?;
        let error = namespace.open::<ConsoleDevice>(&ObjectAttributes::new(
            DEFAULT_CONSOLE_PATH,
            AccessMask::GENERIC_WRITE,
        ))?;
        Ok(Self {
            input,
            output,
            error,
        })
    }

    pub fn input(&self) -> &Accessor<ConsoleDevice> {
        &self.input
    }

    pub fn output(&self) -> &Accessor<ConsoleDevice> {
        &self.output
    }

    pub fn error(&self) -> &Accessor<ConsoleDevice> {
        &self.error
    }

    /// Read available console input, blocking until at least one byte
    /// arrives.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, KernelError> {
        self.input.read(buf)
    }

    pub fn write(&self, s: &str) -> Result<usize, KernelError> {
        self.output.write(s.as_bytes())
    }

    pub fn write_error(&self, s: &str) -> Result<usize, KernelError> {
        self.error.write(s.as_bytes())
    }
}
