//! Thread kernel object
//!
//! A thread pairs an identity and scheduling state with the chip's
//! opaque saved-register context. The context is created on thread
//! construction (before the thread ever runs) and released on
//! termination; the scheduler guarantees it is never touched by two
//! processors at once by never dispatching the same thread twice
//! concurrently. The context slot's lock is only held long enough to
//! copy the shared handle out — never across a context switch, which
//! on hardware does not return.

use core::sync::atomic::{AtomicU64, Ordering};

use alloc::string::String;
use alloc::sync::Arc;
use spin::Mutex;

use crate::chip::{ChipControl, ThreadContext, ThreadEntry};
use crate::error::KernelError;
use crate::impl_kernel_object;
use crate::object::traits::KObjectId;

/// Thread scheduling states. `Terminated` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Created,
    Ready,
    Running,
    Blocked,
    Terminated,
}

/// Thread kernel object.
pub struct Thread {
    id: KObjectId,
    tid: u64,
    description: Option<String>,
    chip: &'static dyn ChipControl,
    state: Mutex<ThreadState>,
    exit_code: Mutex<Option<i32>>,
    context: Mutex<Option<Arc<ThreadContext>>>,
}

impl Thread {
    /// Create a thread with its chip context already allocated.
    pub fn new(
        chip: &'static dyn ChipControl,
        entry: ThreadEntry,
        stack_size: usize,
        description: Option<&str>,
    ) -> Arc<Self> {
        static NEXT_TID: AtomicU64 = AtomicU64::new(1);
        let context = chip.initialize_thread_context(entry, stack_size);
        Arc::new(Self {
            id: KObjectId::new(),
            tid: NEXT_TID.fetch_add(1, Ordering::Relaxed),
            description: description.map(String::from),
            chip,
            state: Mutex::new(ThreadState::Created),
            exit_code: Mutex::new(None),
            context: Mutex::new(Some(Arc::new(context))),
        })
    }

    pub fn tid(&self) -> u64 {
        self.tid
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn state(&self) -> ThreadState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: ThreadState) {
        *self.state.lock() = state;
    }

    pub fn exit_code(&self) -> Option<i32> {
        *self.exit_code.lock()
    }

    /// Run `f` with the thread's context, if the thread still owns
    /// one. The slot's lock is released before `f` runs: `f` is the
    /// dispatch path, and on hardware a context switch never returns
    /// to release anything.
    pub(crate) fn with_context<R>(&self, f: impl FnOnce(&ThreadContext) -> R) -> Option<R> {
        let context = self.context.lock().clone();
        context.map(|context| f(&context))
    }

    /// Created → Ready transition used by the scheduler on spawn.
    pub(crate) fn make_ready(&self) -> Result<(), KernelError> {
        let mut state = self.state.lock();
        if *state != ThreadState::Created {
            return Err(KernelError::InvalidState);
        }
        *state = ThreadState::Ready;
        Ok(())
    }

    /// Terminate the thread, record its exit code and release the chip
    /// context. Terminal; repeated termination is rejected.
    pub fn terminate(&self, code: i32) -> Result<(), KernelError> {
        {
            let mut state = self.state.lock();
            if *state == ThreadState::Terminated {
                return Err(KernelError::InvalidState);
            }
            *state = ThreadState::Terminated;
        }
        *self.exit_code.lock() = Some(code);
        if let Some(context) = self.context.lock().take() {
            self.chip.uninitialize_thread_context(&context);
        }
        Ok(())
    }
}

impl Drop for Thread {
    fn drop(&mut self) {
        // A thread destroyed without terminating still returns its
        // context to the chip.
        if let Some(context) = self.context.get_mut().take() {
            self.chip.uninitialize_thread_context(&context);
        }
    }
}

impl_kernel_object!(Thread, "Thread");
