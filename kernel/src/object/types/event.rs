//! Event kernel object
//!
//! A manual-reset event: `set` signals the event and releases every
//! waiter (broadcast); the event stays signaled until an explicit
//! `reset`, so a wait on an already-signaled event returns at once.
//! Waiters re-check the signaled state after every wake, which keeps
//! the edge-triggered producers honest — a wake is a hint, emptiness
//! must be re-observed before blocking again.

use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;

use crate::chip::InterruptScope;
use crate::error::KernelError;
use crate::impl_kernel_object;
use crate::object::traits::KObjectId;
use crate::object::types::thread::Thread;
use crate::sched::Scheduler;

/// Manual-reset event object.
pub struct Event {
    id: KObjectId,
    signaled: Mutex<bool>,
    waiters: Mutex<Vec<Arc<Thread>>>,
}

impl Event {
    pub fn new() -> Self {
        Self {
            id: KObjectId::new(),
            signaled: Mutex::new(false),
            waiters: Mutex::new(Vec::new()),
        }
    }

    pub fn is_signaled(&self) -> bool {
        *self.signaled.lock()
    }

    /// Signal the event and wake every waiter.
    pub fn set(&self, sched: &Scheduler) {
        let woken = {
            let _scope = InterruptScope::enter(sched.chip());
            *self.signaled.lock() = true;
            let mut waiters = self.waiters.lock();
            waiters.drain(..).collect::<Vec<_>>()
        };
        for thread in woken {
            sched.wake(&thread);
        }
    }

    /// Clear the signaled state. Threads already released stay
    /// released.
    pub fn reset(&self) {
        *self.signaled.lock() = false;
    }

    /// Block the calling thread until the event is signaled, or until
    /// `timeout` ticks elapse.
    ///
    /// Returns [`KernelError::Timeout`] on expiry. Callers running
    /// before the scheduler has a current thread spin-wait on the chip
    /// instead of blocking.
    pub fn wait_one(&self, sched: &Scheduler, timeout: Option<u64>) -> Result<(), KernelError> {
        let chip = sched.chip();
        let deadline = timeout.map(|t| chip.monotonic_ticks().saturating_add(t));
        let waiter = sched.current();

        loop {
            {
                let _scope = InterruptScope::enter(chip);
                if *self.signaled.lock() {
                    if let Some(thread) = &waiter {
                        self.remove_waiter(thread);
                        sched.resume(thread);
                    }
                    return Ok(());
                }
                if let Some(deadline) = deadline {
                    if chip.monotonic_ticks() >= deadline {
                        if let Some(thread) = &waiter {
                            self.remove_waiter(thread);
                            sched.resume(thread);
                        }
                        return Err(KernelError::Timeout);
                    }
                }
                if let Some(thread) = &waiter {
                    let mut waiters = self.waiters.lock();
                    if !waiters.iter().any(|w| Arc::ptr_eq(w, thread)) {
                        waiters.push(thread.clone());
                    }
                    drop(waiters);
                    sched.block_current(thread);
                }
            }
            // Leave the processor; when this thread runs again (or the
            // boot context is interrupted) the loop re-checks.
            match &waiter {
                Some(_) => sched.reschedule(),
                None => chip.wait_for_interrupt(),
            }
        }
    }

    fn remove_waiter(&self, thread: &Arc<Thread>) {
        self.waiters.lock().retain(|w| !Arc::ptr_eq(w, thread));
    }

    #[cfg(test)]
    fn waiter_count(&self) -> usize {
        self.waiters.lock().len()
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

impl_kernel_object!(Event, "Event");
