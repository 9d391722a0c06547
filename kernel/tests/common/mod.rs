/*!
 * Shared helpers for kernel integration tests
 */

#![allow(dead_code)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use teachos_kernel::core::sync::SpinLock;
use teachos_kernel::{Channel, CurrentProc, Kernel, KernelBuilder};

/// Upper bound for anything a test waits on
pub const TIMEOUT: Duration = Duration::from_secs(10);

/// Build and boot a kernel whose main process runs `main`
pub fn boot<F>(builder: KernelBuilder, main: F) -> Kernel
where
    F: FnOnce(&CurrentProc) + Send + 'static,
{
    let mut kernel = builder.build().expect("valid configuration");
    kernel.boot(main).expect("boot");
    kernel
}

/// Deliver ticks until `done` returns a value or the timeout passes
pub fn tick_until<T>(kernel: &Kernel, mut done: impl FnMut() -> Option<T>) -> T {
    let deadline = Instant::now() + TIMEOUT;
    loop {
        if let Some(value) = done() {
            return value;
        }
        assert!(Instant::now() < deadline, "timed out while ticking");
        kernel.tick();
        thread::sleep(Duration::from_millis(1));
    }
}

/// Poll until the kernel halts
pub fn await_halt(kernel: &Kernel) -> Option<String> {
    let deadline = Instant::now() + TIMEOUT;
    while !kernel.is_halted() {
        assert!(Instant::now() < deadline, "kernel never halted");
        thread::sleep(Duration::from_millis(1));
    }
    kernel.halt_reason()
}

/// A barrier processes sleep on until the test opens it
pub type Gate = Arc<SpinLock<bool>>;

pub fn gate() -> Gate {
    Arc::new(SpinLock::new(false, "gate"))
}

/// Sleep until the gate is open
pub fn pass(current: &CurrentProc, gate: &SpinLock<bool>) {
    let mut open = gate.lock();
    while !*open {
        open = current.sleep(Channel::of(gate), open);
    }
}

/// Open the gate and wake everyone waiting at it
pub fn open(kernel: &Kernel, gate: &SpinLock<bool>) {
    let mut flag = gate.lock();
    *flag = true;
    kernel.wakeup(Channel::of(gate));
}
