//! Kernel composition root
//!
//! One `Kernel` object owns the chip, the object namespace, the
//! scheduler, the driver registry and the console host service. It is
//! constructed once at boot and published through a single-assignment
//! cell; there are no other global singletons.

use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Once;

use crate::chip::ChipControl;
use crate::console::{ConsoleHostService, MemoryStats, NoMemoryStats};
use crate::drivers::{DeviceDescription, Driver, DriverRegistry};
use crate::object::namespace::ObjectNamespace;
use crate::sched::Scheduler;

/// Everything the boot path hands to [`init`].
pub struct BootConfig {
    pub chip: &'static dyn ChipControl,
    pub drivers: Vec<Arc<dyn Driver>>,
    pub devices: Vec<DeviceDescription>,
    pub memory: &'static dyn MemoryStats,
}

impl BootConfig {
    pub fn new(chip: &'static dyn ChipControl) -> Self {
        static NO_STATS: NoMemoryStats = NoMemoryStats;
        Self {
            chip,
            drivers: Vec::new(),
            devices: Vec::new(),
            memory: &NO_STATS,
        }
    }
}

/// The top-level kernel object.
pub struct Kernel {
    chip: &'static dyn ChipControl,
    namespace: ObjectNamespace,
    scheduler: Arc<Scheduler>,
    drivers: DriverRegistry,
    console: Once<ConsoleHostService>,
}

static KERNEL: Once<Kernel> = Once::new();

impl Kernel {
    pub fn chip(&self) -> &'static dyn ChipControl {
        self.chip
    }

    pub fn namespace(&self) -> &ObjectNamespace {
        &self.namespace
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn drivers(&self) -> &DriverRegistry {
        &self.drivers
    }

    /// The console host service, once boot wiring opened it.
    pub fn console(&self) -> Option<&ConsoleHostService> {
        self.console.get()
    }

    /// Entry point for the periodic system timer interrupt.
    pub fn timer_interrupt(&self) {
        self.scheduler.timer_tick();
    }

    /// Entry point for a cross-core notification.
    pub fn core_notification(&self) {
        self.scheduler.core_notified();
    }
}

/// Boot the kernel: logger, driver registration, device discovery,
/// system timer, console host service. The first call constructs the
/// kernel; it is single-assignment, so later calls return the existing
/// instance untouched.
pub fn init(config: BootConfig) -> &'static Kernel {
    KERNEL.call_once(|| {
        let chip = config.chip;
        crate::logging::init(chip);
        log::info!(
            "{} {} booting on {} processor(s)",
            crate::KERNEL_NAME,
            crate::VERSION,
            chip.processors_count()
        );
        log::info!(
            "memory: {} bytes used, {} bytes free",
            config.memory.used_bytes(),
            config.memory.free_bytes()
        );

        let kernel = Kernel {
            chip,
            namespace: ObjectNamespace::new(),
            scheduler: Arc::new(Scheduler::new(chip)),
            drivers: DriverRegistry::new(),
            console: Once::new(),
        };

        for driver in config.drivers {
            kernel.drivers.register(driver);
        }

        // Device discovery: a description nobody matches is reported
        // and skipped, the platform boots without that device. Devices
        // block and wake against the kernel's own scheduler.
        for description in &config.devices {
            if let Err(err) =
                kernel
                    .drivers
                    .bind(description, &kernel.namespace, &kernel.scheduler)
            {
                log::warn!("boot: continuing without {} ({})", description, err);
            }
        }

        chip.setup_system_timer(chip.default_time_slice());

        match ConsoleHostService::open(&kernel.namespace) {
            Ok(service) => {
                kernel.console.call_once(|| service);
                log::info!("console host service ready");
            }
            Err(err) => log::warn!("console host service unavailable: {}", err),
        }

        log::info!("kernel initialization complete");
        kernel
    })
}

/// The booted kernel. Panics before [`init`].
pub fn get() -> &'static Kernel {
    KERNEL.get().expect("kernel has not been initialized")
}

/// The booted kernel, if any.
pub fn try_get() -> Option<&'static Kernel> {
    KERNEL.get()
}
