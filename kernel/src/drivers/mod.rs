//! Device/driver framework
//!
//! Hardware (or emulated hardware) is described by a
//! [`DeviceDescription`]; drivers registered with the
//! [`DriverRegistry`] are matched against descriptions in registration
//! order, and the first compatible driver installs exactly one device
//! into the object namespace. Devices are kernel objects opened
//! through the object manager like everything else.

pub mod console;

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use spin::Mutex;

use crate::error::KernelError;
use crate::object::accessor::Accessor;
use crate::object::namespace::ObjectNamespace;
use crate::object::traits::{AccessMask, KernelObject};
use crate::sched::Scheduler;

/// Description record matched against drivers: a composite
/// "provider, kind" tag identifying a piece of hardware or emulated
/// hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescription {
    provider: String,
    kind: String,
}

impl DeviceDescription {
    pub fn new(provider: &str, kind: &str) -> Self {
        Self {
            provider: String::from(provider),
            kind: String::from(kind),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The composite matching key drivers consume.
    pub fn matching_key(&self) -> String {
        let mut key = String::from(self.provider.as_str());
        key.push(',');
        key.push_str(&self.kind);
        key
    }
}

impl fmt::Display for DeviceDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.provider, self.kind)
    }
}

/// A device kernel object with a byte-stream I/O surface.
///
/// A device advertises the directions it supports; invoking the other
/// direction fails with [`KernelError::UnsupportedDirection`] rather
/// than silently doing nothing.
pub trait Device: KernelObject {
    fn can_read(&self) -> bool;
    fn can_write(&self) -> bool;

    fn read(&self, buf: &mut [u8]) -> Result<usize, KernelError>;
    fn write(&self, buf: &[u8]) -> Result<usize, KernelError>;
}

/// Accessor-mediated I/O surface: rights recorded at open time gate
/// every transfer.
impl<T: Device> Accessor<T> {
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, KernelError> {
        self.check_access(AccessMask::GENERIC_READ)?;
        self.object()?.read(buf)
    }

    pub fn write(&self, buf: &[u8]) -> Result<usize, KernelError> {
        self.check_access(AccessMask::GENERIC_WRITE)?;
        self.object()?.write(buf)
    }
}

/// A driver: a stateless (or configuration-only) matcher plus device
/// installer.
pub trait Driver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Pure compatibility predicate, evaluated in registration order.
    fn is_compatible(&self, description: &DeviceDescription) -> bool;

    /// Construct the concrete device for `description` and register it
    /// with the object manager. Called at most once per matching
    /// description. Devices that block or wake readers do so against
    /// `sched` — the scheduler the kernel's interrupt paths drive.
    fn install_device(
        &self,
        description: &DeviceDescription,
        namespace: &ObjectNamespace,
        sched: &Arc<Scheduler>,
    ) -> Result<(), KernelError>;
}

/// Driver registration and dispatch.
pub struct DriverRegistry {
    drivers: Mutex<Vec<Arc<dyn Driver>>>,
}

impl DriverRegistry {
    pub const fn new() -> Self {
        Self {
            drivers: Mutex::new(Vec::new()),
        }
    }

    /// Append a driver. Registration order is the dispatch order.
    pub fn register(&self, driver: Arc<dyn Driver>) {
        log::info!("drivers: registered {}", driver.name());
        self.drivers.lock().push(driver);
    }

    pub fn len(&self) -> usize {
        self.drivers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.lock().is_empty()
    }

    /// Select the first compatible driver for `description` and have
    /// it install its device.
    ///
    /// A description no driver matches is reported as
    /// [`KernelError::NotFound`]; the platform continues without that
    /// device.
    pub fn bind(
        &self,
        description: &DeviceDescription,
        namespace: &ObjectNamespace,
        sched: &Arc<Scheduler>,
    ) -> Result<&'static str, KernelError> {
        let driver = {
            let drivers = self.drivers.lock();
            drivers
                .iter()
                .find(|d| d.is_compatible(description))
                .cloned()
        };
        match driver {
            Some(driver) => {
                driver.install_device(description, namespace, sched)?;
                log::info!("drivers: {} bound to {}", driver.name(), description);
                Ok(driver.name())
            }
            None => {
                log::warn!("drivers: no driver for {}", description);
                Err(KernelError::NotFound)
            }
        }
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::emulator::EmulatedChip;
    use crate::object::namespace::ObjectAttributes;
    use crate::object::traits::KObjectId;

    fn test_sched() -> Arc<Scheduler> {
        let chip: &'static EmulatedChip = Box::leak(Box::new(EmulatedChip::new(1)));
        Arc::new(Scheduler::new(chip))
    }

    /// Write-only sink used to exercise direction checks.
    struct SinkDevice {
        id: KObjectId,
    }

    impl SinkDevice {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                id: KObjectId::new(),
            })
        }
    }

    impl KernelObject for SinkDevice {
        fn type_name(&self) -> &'static str {
            "SinkDevice"
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

    impl Device for SinkDevice {
        fn can_read(&self) -> bool {
            false
        }

        fn can_write(&self) -> bool {
            true
        }

        fn read(&self, _buf: &mut [u8]) -> Result<usize, KernelError> {
            Err(KernelError::UnsupportedDirection)
        }

        fn write(&self, buf: &[u8]) -> Result<usize, KernelError> {
            Ok(buf.len())
        }
    }

    struct SinkDriver;

    impl Driver for SinkDriver {
        fn name(&self) -> &'static str {
            "sink"
        }

        fn is_compatible(&self, description: &DeviceDescription) -> bool {
            description.kind() == "sink"
        }

        fn install_device(
            &self,
            _description: &DeviceDescription,
            namespace: &ObjectNamespace,
            _sched: &Arc<Scheduler>,
        ) -> Result<(), KernelError> {
            namespace.install("/device/sink", SinkDevice::new())
        }
    }

    /// Greedy driver that claims everything; used to pin
    /// registration-order dispatch.
    struct CatchAllDriver;

    impl Driver for CatchAllDriver {
        fn name(&self) -> &'static str {
            "catch-all"
        }

        fn is_compatible(&self, _description: &DeviceDescription) -> bool {
            true
        }

        fn install_device(
            &self,
            _description: &DeviceDescription,
            namespace: &ObjectNamespace,
            _sched: &Arc<Scheduler>,
        ) -> Result<(), KernelError> {
            namespace.install("/device/any", SinkDevice::new())
        }
    }

    #[test]
    fn matching_key_is_the_composite_tag() {
        let desc = DeviceDescription::new("emulator", "console");
        assert_eq!(desc.matching_key(), "emulator,console");
    }

    #[test]
    fn first_registered_compatible_driver_wins() {
        let registry = DriverRegistry::new();
        registry.register(Arc::new(SinkDriver));
        registry.register(Arc::new(CatchAllDriver));

        let desc = DeviceDescription::new("emulator", "sink");
        let sched = test_sched();
        // Both match; registration order decides, deterministically.
        for _ in 0..3 {
            let chosen = registry
                .bind(&desc, &ObjectNamespace::new(), &sched)
                .unwrap();
            assert_eq!(chosen, "sink");
        }
    }

    #[test]
    fn later_driver_matches_what_earlier_ones_decline() {
        let registry = DriverRegistry::new();
        registry.register(Arc::new(SinkDriver));
        registry.register(Arc::new(CatchAllDriver));

        let ns = ObjectNamespace::new();
        let chosen = registry
            .bind(&DeviceDescription::new("emulator", "netif"), &ns, &test_sched())
            .unwrap();
        assert_eq!(chosen, "catch-all");
        assert!(ns.contains("/device/any"));
    }

    #[test]
    fn unmatched_description_is_reported_not_fatal() {
        let registry = DriverRegistry::new();
        registry.register(Arc::new(SinkDriver));

        let ns = ObjectNamespace::new();
        let err = registry
            .bind(&DeviceDescription::new("emulator", "netif"), &ns, &test_sched())
            .unwrap_err();
        assert_eq!(err, KernelError::NotFound);
        assert!(ns.is_empty());
    }

    #[test]
    fn read_on_a_write_only_device_is_unsupported_direction() {
        let ns = ObjectNamespace::new();
        SinkDriver
            .install_device(&DeviceDescription::new("emulator", "sink"), &ns, &test_sched())
            .unwrap();

        let accessor = ns
            .open::<SinkDevice>(&ObjectAttributes::new(
                "/device/sink",
                AccessMask::GENERIC_READ | AccessMask::GENERIC_WRITE,
            ))
            .unwrap();
        assert!(!accessor.object().unwrap().can_read());

        let mut buf = [0u8; 4];
        assert_eq!(
            accessor.read(&mut buf).unwrap_err(),
            KernelError::UnsupportedDirection
        );
        assert_eq!(accessor.write(b"ok").unwrap(), 2);
    }

    #[test]
    fn accessor_rights_gate_io_before_the_device_sees_it() {
        let ns = ObjectNamespace::new();
        SinkDriver
            .install_device(&DeviceDescription::new("emulator", "sink"), &ns, &test_sched())
            .unwrap();

        let read_only = ns
            .open::<SinkDevice>(&ObjectAttributes::new(
                "/device/sink",
                AccessMask::GENERIC_READ,
            ))
            .unwrap();
        assert_eq!(
            read_only.write(b"nope").unwrap_err(),
            KernelError::AccessDenied
        );
    }
}
