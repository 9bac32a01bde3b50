//! Chip abstraction layer
//!
//! Everything the kernel needs from the underlying platform goes
//! through the flat [`ChipControl`] contract: interrupt masking,
//! thread-context lifecycle, the system timer and cross-core
//! notification. It is implemented once per target chip or emulator
//! and selected at boot; the rest of the kernel is identical across
//! targets.
//!
//! Failure semantics: these operations are a precondition of correct
//! operation, not a best-effort service. An implementation that cannot
//! satisfy the contract must halt the kernel (panic) rather than
//! return an error, so no surface here is fallible.

pub mod emulator;

use core::any::Any;

use alloc::boxed::Box;

/// Entry point of a kernel thread.
pub type ThreadEntry = fn();

/// Opaque saved state the chip restores when switching to a thread.
///
/// Owned by exactly one thread, created before the thread ever runs
/// and released on termination. The kernel never looks inside; only
/// the chip implementation that produced it may downcast the payload.
pub struct ThreadContext {
    raw: Box<dyn Any + Send + Sync>,
}

impl ThreadContext {
    /// Wrap a chip-private state block.
    pub fn new(raw: Box<dyn Any + Send + Sync>) -> Self {
        Self { raw }
    }

    /// Downcast to the chip-private representation.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.raw.downcast_ref::<T>()
    }
}

/// Saved interrupt-enable state returned by
/// [`ChipControl::disable_interrupt`].
///
/// Each disable captures the prior state of the current processor and
/// must be restored exactly once, in reverse nesting order. Restoring
/// by token chaining keeps nested critical sections symmetric; there
/// is deliberately no counter that an asynchronous restore could
/// corrupt.
#[derive(Debug)]
#[must_use = "dropping a token leaks a disabled-interrupt state"]
pub struct InterruptToken {
    enabled: bool,
    processor: usize,
}

impl InterruptToken {
    /// Capture a prior interrupt-enable state. Chip implementations
    /// build tokens with this; the kernel only passes them back.
    pub fn new(enabled: bool, processor: usize) -> Self {
        Self { enabled, processor }
    }

    /// Whether interrupts were enabled when the token was taken.
    pub fn was_enabled(&self) -> bool {
        self.enabled
    }

    /// Processor the token was taken on.
    pub fn processor(&self) -> usize {
        self.processor
    }
}

/// The per-platform chip contract.
pub trait ChipControl: Send + Sync {
    // ----- platform facts -----

    /// Number of processors on this platform.
    fn processors_count(&self) -> usize;

    /// Identifier of the processor executing the caller.
    fn current_processor_id(&self) -> usize;

    /// Default scheduler time slice, in timer ticks.
    fn default_time_slice(&self) -> u64;

    // ----- interrupt masking -----

    /// Whether interrupts are currently enabled on this processor.
    fn interrupts_enabled(&self) -> bool;

    /// Enable interrupt delivery on the current processor.
    fn enable_interrupt(&self);

    /// Disable interrupt delivery on the current processor, returning
    /// a token that captures the prior state.
    fn disable_interrupt(&self) -> InterruptToken;

    /// Reverse one prior [`disable_interrupt`](Self::disable_interrupt).
    /// Must be called exactly once per token, innermost first.
    fn restore_interrupt(&self, token: InterruptToken);

    // ----- thread contexts -----

    /// Allocate the saved-state block for a thread that has not run
    /// yet.
    fn initialize_thread_context(&self, entry: ThreadEntry, stack_size: usize) -> ThreadContext;

    /// Release the platform resources behind a saved-state block.
    fn uninitialize_thread_context(&self, context: &ThreadContext);

    /// Transfer control to `context` for the first time on the calling
    /// processor. On hardware this never returns; the emulator returns
    /// only once the emulated platform halts.
    fn start_schedule(&self, context: &ThreadContext);

    /// Context-switch into an already-started thread. The caller must
    /// have interrupts disabled on the current processor.
    fn restore_context(&self, context: &ThreadContext);

    // ----- timer and cross-core signaling -----

    /// Arm the periodic system timer. On firing the chip enters the
    /// scheduler's tick path.
    fn setup_system_timer(&self, time_slice: u64);

    /// Monotonic tick counter driving wait timeouts.
    fn monotonic_ticks(&self) -> u64;

    /// Post an inter-processor signal making `processor` re-enter its
    /// scheduler. Delivery is at-least-once; receivers tolerate
    /// spurious wakes.
    fn raise_core_notification(&self, processor: usize);

    /// Idle the current processor until the next interrupt.
    fn wait_for_interrupt(&self);

    // ----- debug sink -----

    /// Early/debug text output used by the kernel logger.
    fn debug_write(&self, _s: &str) {}
}

/// RAII interrupt-disabled critical section.
///
/// Disables interrupts on entry and restores the captured state on
/// every exit path, early returns included.
pub struct InterruptScope<'a> {
    chip: &'a dyn ChipControl,
    token: Option<InterruptToken>,
}

impl<'a> InterruptScope<'a> {
    pub fn enter(chip: &'a dyn ChipControl) -> Self {
        let token = chip.disable_interrupt();
        Self {
            chip,
            token: Some(token),
        }
    }
}

impl Drop for InterruptScope<'_> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            self.chip.restore_interrupt(token);
        }
    }
}
