//! Hosted demonstration of the kernel substrate.
//!
//! Boots the kernel on the emulated chip, wires the console driver to
//! an in-memory host, feeds a few key events through the console ring
//! and echoes what came out the other side.

use std::sync::Arc;

use vireo_kernel::chip::emulator::EmulatedChip;
use vireo_kernel::console::BufferedHostIo;
use vireo_kernel::drivers::console::{ConsoleDriver, ConsoleEvent};
use vireo_kernel::drivers::DeviceDescription;
use vireo_kernel::kernel::{self, BootConfig};
use vireo_kernel::object::types::Thread;

fn main() {
    let chip: &'static EmulatedChip = Box::leak(Box::new(EmulatedChip::new(2)));
    let host = Arc::new(BufferedHostIo::new());

    let mut config = BootConfig::new(chip);
    config
        .drivers
        .push(Arc::new(ConsoleDriver::new(host.clone())));
    config
        .devices
        .push(DeviceDescription::new("emulator", "console"));
    // Nobody drives this one; boot reports it and carries on.
    config
        .devices
        .push(DeviceDescription::new("emulator", "netif"));

    let kernel = kernel::init(config);

    let console = kernel
        .console()
        .expect("console device was installed at boot");

    // Inject key events the way an interrupt handler would, then read
    // the decoded bytes back through the host service.
    let device = console.input().object().expect("input accessor is open");
    for ch in "vireo".chars() {
        device.post_event(ConsoleEvent::key_down(ch));
        device.post_event(ConsoleEvent::key_up(ch));
    }

    let mut line = [0u8; 64];
    let n = console.read(&mut line).expect("console read");
    println!("console input : {}", String::from_utf8_lossy(&line[..n]));

    console.write("hello from vireo\n").expect("console write");
    println!(
        "console output: {}",
        String::from_utf8_lossy(&host.take_output())
    );

    // A couple of threads through the scheduler, for flavor.
    fn worker() {}
    let a = Thread::new(chip, worker, vireo_kernel::config::DEFAULT_STACK_SIZE, Some("worker-a"));
    let b = Thread::new(chip, worker, vireo_kernel::config::DEFAULT_STACK_SIZE, Some("worker-b"));
    kernel.scheduler().spawn(&a).expect("spawn a");
    kernel.scheduler().spawn(&b).expect("spawn b");
    kernel.scheduler().start();
    for _ in 0..4 {
        kernel.timer_interrupt();
    }
    if let Some(current) = kernel.scheduler().current() {
        println!("running thread : {}", current.description().unwrap_or("?"));
    }

    // Exercise the namespace from the outside, like a service would.
    let attrs = vireo_kernel::object::namespace::ObjectAttributes::new(
        vireo_kernel::config::DEFAULT_CONSOLE_PATH,
        vireo_kernel::object::AccessMask::GENERIC_READ,
    );
    let accessor = kernel
        .namespace()
        .open::<vireo_kernel::drivers::console::ConsoleDevice>(&attrs)
        .expect("console is installed");
    println!(
        "namespace open : {} ({} pending events)",
        vireo_kernel::config::DEFAULT_CONSOLE_PATH,
        accessor.object().expect("open").pending_events()
    );
    drop(accessor);

    println!("--- chip debug log ---");
    print!("{}", chip.take_debug_output());
}
