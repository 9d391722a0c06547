/*!
 * Kernel
 *
 * State shared by every CPU and process thread, the fatal/halt path, the
 * timer interrupt, and the public `Kernel` handle that boots and observes it.
 */

mod builder;
mod handle;

pub use builder::KernelBuilder;
pub use handle::Kernel;

use crate::core::config::KernelConfig;
use crate::core::sync::SpinLock;
use crate::core::types::{SlotId, Ticks};
use crate::process::{Channel, Platform, ProcTable, SlotMirror};
use parking_lot::Condvar;
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{error, info};

/// Unwind payload used to retire a process thread
///
/// Raised when a process exits, when its slot is released before it ever
/// ran, and when the kernel halts. Caught at the top of the process thread.
pub(crate) struct Unwound;

/// Leave the current process thread without running any more of its code
pub(crate) fn unwind() -> ! {
    panic::resume_unwind(Box::new(Unwound))
}

pub(crate) struct KernelShared {
    pub(crate) ptable: SpinLock<ProcTable>,
    /// Per-slot resume signal, bound to the table lock
    pub(crate) resume: Box<[Condvar]>,
    /// Per-CPU return signal, bound to the table lock
    pub(crate) cpu_return: Box<[Condvar]>,
    /// Idle CPUs park here until something becomes runnable
    pub(crate) idle: Condvar,
    pub(crate) clock: SpinLock<Ticks>,
    pub(crate) mirror: Arc<[SlotMirror]>,
    pub(crate) platform: Arc<dyn Platform>,
    pub(crate) config: KernelConfig,
    pub(crate) idle_poll: Duration,
    pub(crate) init: OnceLock<SlotId>,
    halt_reason: OnceLock<String>,
    halted: AtomicBool,
}

impl KernelShared {
    pub(crate) fn new(config: KernelConfig, platform: Arc<dyn Platform>) -> Self {
        let sched = crate::scheduler::SchedConfig::from_raw(config.policy, config.feedback_mode);
        let table = ProcTable::new(config.nproc, config.cpus, sched);
        let mirror = table.mirror();
        Self {
            ptable: SpinLock::new(table, "ptable"),
            resume: (0..config.nproc).map(|_| Condvar::new()).collect(),
            cpu_return: (0..config.cpus).map(|_| Condvar::new()).collect(),
            idle: Condvar::new(),
            clock: SpinLock::new(0, "time"),
            mirror,
            platform,
            idle_poll: config.idle_poll(),
            config,
            init: OnceLock::new(),
            halt_reason: OnceLock::new(),
            halted: AtomicBool::new(false),
        }
    }

    #[inline]
    pub(crate) fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    pub(crate) fn halt_reason(&self) -> Option<String> {
        self.halt_reason.get().cloned()
    }

    /// Stop every CPU loop and retire every parked process thread
    pub(crate) fn halt(&self, reason: &str) {
        if self.halt_reason.set(reason.to_string()).is_ok() {
            info!(reason, "kernel halting");
        }
        self.halted.store(true, Ordering::Release);
        self.idle.notify_all();
        for condvar in self.resume.iter().chain(self.cpu_return.iter()) {
            condvar.notify_all();
        }
    }

    /// Contract violation: log, halt the whole kernel, and panic the caller
    pub(crate) fn fatal(&self, reason: &str) -> ! {
        error!(reason, "kernel panic");
        self.halt(reason);
        panic!("{reason}");
    }

    /// One timer period: advance the clock, charge accounting, expire
    /// quanta and wake clock sleepers
    pub(crate) fn timer_interrupt(&self) -> Ticks {
        let mut clock = self.clock.lock();
        *clock += 1;
        let now = *clock;

        let mut table = self.ptable.lock();
        table.charge_tick(now);
        table.expire_quanta();
        self.wakeup_locked(&mut table, Channel::Ticks);
        now
    }

    #[inline]
    pub(crate) fn uptime(&self) -> Ticks {
        *self.clock.lock()
    }
}
