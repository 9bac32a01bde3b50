//! Console device
//!
//! A concrete device kind layering a bounded event ring over the
//! device framework. The producer side (driver or interrupt context)
//! posts [`ConsoleEvent`]s and never blocks: a full ring evicts its
//! oldest unread event. The consumer side drains events FIFO, decoding
//! key-down characters into the caller's byte buffer, and blocks on
//! the `data_available` event while the ring is empty. The signal is
//! edge-triggered — raised only on the empty to non-empty transition —
//! so readers re-check emptiness after every wake.

use alloc::sync::Arc;
use heapless::Deque;
use spin::Mutex;

use super::{DeviceDescription, Driver};
use crate::chip::InterruptScope;
use crate::config::{CONSOLE_RING_CAPACITY, DEFAULT_CONSOLE_PATH};
use crate::console::HostIo;
use crate::error::KernelError;
use crate::object::namespace::ObjectNamespace;
use crate::object::traits::{AccessMask, KObjectId, KernelObject};
use crate::object::types::Event;
use crate::sched::Scheduler;

/// Fixed-layout console input record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleEvent {
    Invalid,
    Key { down: bool, ch: char },
}

impl ConsoleEvent {
    pub fn key_down(ch: char) -> Self {
        ConsoleEvent::Key { down: true, ch }
    }

    pub fn key_up(ch: char) -> Self {
        ConsoleEvent::Key { down: false, ch }
    }
}

/// Ring-buffered console device.
pub struct ConsoleDevice {
    id: KObjectId,
    ring: Mutex<Deque<ConsoleEvent, CONSOLE_RING_CAPACITY>>,
    /// Tail bytes of a character that did not fit the previous
    /// reader's buffer; delivered before the next event is consumed.
    stash: Mutex<heapless::Vec<u8, 4>>,
    data_available: Event,
    sched: Arc<Scheduler>,
    host: Arc<dyn HostIo>,
}

impl ConsoleDevice {
    pub fn new(sched: Arc<Scheduler>, host: Arc<dyn HostIo>) -> Self {
        Self {
            id: KObjectId::new(),
            ring: Mutex::new(Deque::new()),
            stash: Mutex::new(heapless::Vec::new()),
            data_available: Event::new(),
            sched,
            host,
        }
    }

    #[cfg(test)]
    pub(crate) fn scheduler(&self) -> &Arc<Scheduler> {
        &self.sched
    }

    /// Producer path. Safe from interrupt context: bounded, lossy
    /// under overload, never blocks.
    pub fn post_event(&self, event: ConsoleEvent) {
        let was_empty = {
            let _scope = InterruptScope::enter(self.sched.chip());
            let mut ring = self.ring.lock();
            let was_empty = ring.is_empty();
            if ring.is_full() {
                // Evict the oldest unread event.
                ring.pop_front();
            }
            let _ = ring.push_back(event);
            was_empty
        };
        if was_empty {
            self.data_available.set(&self.sched);
        }
    }

    /// Pop the oldest unread event, if any.
    pub fn read_event(&self) -> Option<ConsoleEvent> {
        let _scope = InterruptScope::enter(self.sched.chip());
        let mut ring = self.ring.lock();
        let event = ring.pop_front();
        if ring.is_empty() {
            self.data_available.reset();
        }
        event
    }

    /// Number of unread events.
    pub fn pending_events(&self) -> usize {
        self.ring.lock().len()
    }

    /// Drain key-down characters into `buf`; key-up and invalid
    /// events are consumed silently. A character whose encoding only
    /// partially fits is split: the fitting prefix is delivered now,
    /// the tail goes to the stash for the next call, so a non-empty
    /// buffer always makes progress. Returns the bytes written.
    fn drain_into(&self, buf: &mut [u8]) -> usize {
        let _scope = InterruptScope::enter(self.sched.chip());
        let mut ring = self.ring.lock();
        let mut stash = self.stash.lock();
        let mut n = 0;

        while n < buf.len() && !stash.is_empty() {
            buf[n] = stash.remove(0);
            n += 1;
        }

        while n < buf.len() {
            let event = match ring.pop_front() {
                Some(event) => event,
                None => break,
            };
            if let ConsoleEvent::Key { down: true, ch } = event {
                let mut utf8 = [0u8; 4];
                let encoded = ch.encode_utf8(&mut utf8).as_bytes();
                let fits = encoded.len().min(buf.len() - n);
                buf[n..n + fits].copy_from_slice(&encoded[..fits]);
                n += fits;
                if fits < encoded.len() {
                    let _ = stash.extend_from_slice(&encoded[fits..]);
                    break;
                }
            }
        }
        if ring.is_empty() {
            self.data_available.reset();
        }
        n
    }
}

impl KernelObject for ConsoleDevice {
    fn type_name(&self) -> &'static str {
        "ConsoleDevice"
    }

    fn id(&self) -> KObjectId {
        self.id
    }

    fn allowed_access(&self) -> AccessMask {
        AccessMask::GENERIC_READ | AccessMask::GENERIC_WRITE
    }

    fn as_any(&self) -> &dyn core::any::Any {
        self
    }
}

impl super::Device for ConsoleDevice {
    fn can_read(&self) -> bool {
        true
    }

    fn can_write(&self) -> bool {
        true
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize, KernelError> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let n = self.drain_into(buf);
            if n > 0 {
                return Ok(n);
            }
            // Empty ring: block until the producer signals, then
            // re-check. A wake with nothing to read loops back here.
            self.data_available.wait_one(&self.sched, None)?;
        }
    }

    fn write(&self, buf: &[u8]) -> Result<usize, KernelError> {
        Ok(self.host.write(self.host.standard_output(), buf))
    }
}

/// Driver installing one [`ConsoleDevice`] at the default console
/// path. The device blocks and wakes against the scheduler handed in
/// at installation, so readers park on the queue the kernel's timer
/// actually drives.
pub struct ConsoleDriver {
    host: Arc<dyn HostIo>,
}

impl ConsoleDriver {
    pub fn new(host: Arc<dyn HostIo>) -> Self {
        Self { host }
    }
}

impl Driver for ConsoleDriver {
    fn name(&self) -> &'static str {
        "console"
    }

    fn is_compatible(&self, description: &DeviceDescription) -> bool {
        description.kind() == "console"
    }

    fn install_device(
        &self,
        _description: &DeviceDescription,
        namespace: &ObjectNamespace,
        sched: &Arc<Scheduler>,
    ) -> Result<(), KernelError> {
        let device = Arc::new(ConsoleDevice::new(sched.clone(), self.host.clone()));
        namespace.install(DEFAULT_CONSOLE_PATH, device)
    }
}
