//! Emulated chip backend
//!
//! Hosted implementation of [`ChipControl`] used by the demo binary
//! and the test suite. Interrupt state is a software flag per emulated
//! processor, thread contexts are heap records, and the monotonic tick
//! counter advances whenever the emulated machine context-switches or
//! idles, so timer-driven behavior (time slices, wait timeouts) is
//! observable without hardware.

use core::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use spin::Mutex;

use super::{ChipControl, InterruptToken, ThreadContext, ThreadEntry};
use crate::config::DEFAULT_TIME_SLICE;

/// Chip-private saved state for one emulated thread.
pub struct EmulatedContext {
    id: u64,
    entry: ThreadEntry,
    stack_size: usize,
    started: AtomicBool,
}

impl EmulatedContext {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn entry(&self) -> ThreadEntry {
        self.entry
    }

    pub fn stack_size(&self) -> usize {
        self.stack_size
    }
}

struct EmulatedProcessor {
    interrupts_enabled: AtomicBool,
    pending_notifications: AtomicUsize,
}

/// Software rendition of the chip contract.
pub struct EmulatedChip {
    processors: Vec<EmulatedProcessor>,
    caller_processor: AtomicUsize,
    ticks: AtomicU64,
    armed_time_slice: AtomicU64,
    next_context_id: AtomicU64,
    live_contexts: AtomicUsize,
    last_dispatched: AtomicU64,
    debug_output: Mutex<String>,
}

impl EmulatedChip {
    pub fn new(processors: usize) -> Self {
        assert!(processors >= 1, "a platform has at least one processor");
        let mut cores = Vec::with_capacity(processors);
        for _ in 0..processors {
            cores.push(EmulatedProcessor {
                interrupts_enabled: AtomicBool::new(false),
                pending_notifications: AtomicUsize::new(0),
            });
        }
        Self {
            processors: cores,
            caller_processor: AtomicUsize::new(0),
            ticks: AtomicU64::new(0),
            armed_time_slice: AtomicU64::new(0),
            next_context_id: AtomicU64::new(1),
            live_contexts: AtomicUsize::new(0),
            last_dispatched: AtomicU64::new(0),
            debug_output: Mutex::new(String::new()),
        }
    }

    fn processor(&self) -> &EmulatedProcessor {
        &self.processors[self.current_processor_id()]
    }

    fn tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Move the emulated caller onto another processor. Tests use this
    /// to exercise cross-core paths.
    pub fn set_current_processor(&self, processor: usize) {
        assert!(processor < self.processors.len());
        self.caller_processor.store(processor, Ordering::Relaxed);
    }

    /// Advance the emulated clock without a context switch, as an
    /// interrupt-driven timer would.
    pub fn advance_ticks(&self, ticks: u64) {
        self.ticks.fetch_add(ticks, Ordering::Relaxed);
    }

    /// Time slice the kernel armed the system timer with, if any.
    pub fn armed_time_slice(&self) -> Option<u64> {
        match self.armed_time_slice.load(Ordering::Relaxed) {
            0 => None,
            slice => Some(slice),
        }
    }

    /// Context id most recently handed to `restore_context` or
    /// `start_schedule`.
    pub fn last_dispatched(&self) -> Option<u64> {
        match self.last_dispatched.load(Ordering::Relaxed) {
            0 => None,
            id => Some(id),
        }
    }

    /// Number of context blocks currently allocated.
    pub fn live_contexts(&self) -> usize {
        self.live_contexts.load(Ordering::Relaxed)
    }

    /// Consume one pending cross-core notification for `processor`.
    pub fn take_notification(&self, processor: usize) -> bool {
        let pending = &self.processors[processor].pending_notifications;
        pending
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Drain everything written through the debug sink so far.
    pub fn take_debug_output(&self) -> String {
        core::mem::take(&mut *self.debug_output.lock())
    }
}

impl Default for EmulatedChip {
    fn default() -> Self {
        Self::new(1)
    }
}

impl ChipControl for EmulatedChip {
    fn processors_count(&self) -> usize {
        self.processors.len()
    }

    fn current_processor_id(&self) -> usize {
        self.caller_processor.load(Ordering::Relaxed)
    }

    fn default_time_slice(&self) -> u64 {
        DEFAULT_TIME_SLICE
    }

    fn interrupts_enabled(&self) -> bool {
        self.processor().interrupts_enabled.load(Ordering::Relaxed)
    }

    fn enable_interrupt(&self) {
        self.processor()
            .interrupts_enabled
            .store(true, Ordering::Release);
    }

    fn disable_interrupt(&self) -> InterruptToken {
        let processor = self.current_processor_id();
        let prior = self.processors[processor]
            .interrupts_enabled
            .swap(false, Ordering::AcqRel);
        InterruptToken::new(prior, processor)
    }

    fn restore_interrupt(&self, token: InterruptToken) {
        let core = &self.processors[token.processor()];
        core.interrupts_enabled
            .store(token.was_enabled(), Ordering::Release);
    }

    fn initialize_thread_context(&self, entry: ThreadEntry, stack_size: usize) -> ThreadContext {
        let id = self.next_context_id.fetch_add(1, Ordering::Relaxed);
        self.live_contexts.fetch_add(1, Ordering::Relaxed);
        ThreadContext::new(Box::new(EmulatedContext {
            id,
            entry,
            stack_size,
            started: AtomicBool::new(false),
        }))
    }

    fn uninitialize_thread_context(&self, context: &ThreadContext) {
        context
            .downcast_ref::<EmulatedContext>()
            .expect("foreign thread context handed to the emulated chip");
        self.live_contexts.fetch_sub(1, Ordering::Relaxed);
    }

    fn start_schedule(&self, context: &ThreadContext) {
        let ctx = context
            .downcast_ref::<EmulatedContext>()
            .expect("foreign thread context handed to the emulated chip");
        ctx.started.store(true, Ordering::Relaxed);
        self.last_dispatched.store(ctx.id, Ordering::Relaxed);
        self.enable_interrupt();
        self.tick();
        // On hardware this point is never reached; the emulated
        // platform halts back to the caller instead.
    }

    fn restore_context(&self, context: &ThreadContext) {
        let ctx = context
            .downcast_ref::<EmulatedContext>()
            .expect("foreign thread context handed to the emulated chip");
        ctx.started.store(true, Ordering::Relaxed);
        self.last_dispatched.store(ctx.id, Ordering::Relaxed);
        self.tick();
    }

    fn setup_system_timer(&self, time_slice: u64) {
        assert!(time_slice > 0, "system timer needs a non-zero period");
        self.armed_time_slice.store(time_slice, Ordering::Relaxed);
    }

    fn monotonic_ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    fn raise_core_notification(&self, processor: usize) {
        self.processors[processor]
            .pending_notifications
            .fetch_add(1, Ordering::Relaxed);
    }

    fn wait_for_interrupt(&self) {
        self.tick();
    }

    fn debug_write(&self, s: &str) {
        self.debug_output.lock().push_str(s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() {}

    #[test]
    fn context_lifecycle_is_balanced() {
        let chip = EmulatedChip::new(1);
        let a = chip.initialize_thread_context(noop, 4096);
        let b = chip.initialize_thread_context(noop, 4096);
        assert_eq!(chip.live_contexts(), 2);

        chip.uninitialize_thread_context(&a);
        chip.uninitialize_thread_context(&b);
        assert_eq!(chip.live_contexts(), 0);
    }

    #[test]
    fn restore_context_advances_clock_and_records_dispatch() {
        let chip = EmulatedChip::new(1);
        let ctx = chip.initialize_thread_context(noop, 4096);
        let before = chip.monotonic_ticks();

        chip.restore_context(&ctx);
        assert!(chip.monotonic_ticks() > before);
        assert_eq!(chip.last_dispatched(), Some(1));
        chip.uninitialize_thread_context(&ctx);
    }

    #[test]
    fn notifications_are_counted_per_processor() {
        let chip = EmulatedChip::new(2);
        chip.raise_core_notification(1);
        chip.raise_core_notification(1);

        assert!(!chip.take_notification(0));
        assert!(chip.take_notification(1));
        assert!(chip.take_notification(1));
        assert!(!chip.take_notification(1));
    }

    #[test]
    fn interrupt_state_is_per_processor() {
        let chip = EmulatedChip::new(2);
        chip.enable_interrupt(); // processor 0

        chip.set_current_processor(1);
        assert!(!chip.interrupts_enabled());
        chip.set_current_processor(0);
        assert!(chip.interrupts_enabled());
    }
}
