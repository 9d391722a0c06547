/*!
 * Current Process
 *
 * Handle given to the code running inside a process. Every method acts on
 * behalf of that process, so the slot it refers to stays live for as long as
 * the handle can be used.
 */

use super::lifecycle::WaitFor;
use super::types::{Channel, Proc, ProcTimes, Reaped, TrapFrame};
use crate::core::errors::{ProcessError, ProcessResult};
use crate::core::sync::SpinGuard;
use crate::core::types::{Pid, Priority, QueueNumber, SlotId, Ticks};
use crate::kernel::{unwind, KernelShared};
use std::sync::Arc;
use tracing::{debug, info};

/// Code a process runs once it is first dispatched
pub type ProcEntry = Box<dyn FnOnce(&CurrentProc) + Send + 'static>;

pub struct CurrentProc {
    pub(crate) shared: Arc<KernelShared>,
    slot: SlotId,
}

impl CurrentProc {
    pub(crate) fn new(shared: Arc<KernelShared>, slot: SlotId) -> Self {
        Self { shared, slot }
    }

    #[inline]
    #[must_use]
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    /// Read a field of this process's PCB under the table lock
    pub(crate) fn with<R>(&self, f: impl FnOnce(&Proc) -> R) -> R {
        self.guard_halt();
        let guard = self.shared.ptable.lock();
        f(guard.at(self.slot.index))
    }

    /// Update this process's PCB under the table lock
    pub(crate) fn with_mut<R>(&self, f: impl FnOnce(&mut Proc) -> R) -> R {
        self.guard_halt();
        let mut guard = self.shared.ptable.lock();
        f(guard.at_mut(self.slot.index))
    }

    /// Retire this thread if the kernel has halted
    #[inline]
    pub(crate) fn guard_halt(&self) {
        if self.shared.is_halted() {
            unwind();
        }
    }

    #[must_use]
    pub fn pid(&self) -> Pid {
        self.with(|p| p.pid)
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.with(|p| p.name.to_string())
    }

    #[must_use]
    pub fn trap_frame(&self) -> TrapFrame {
        self.with(|p| p.trap_frame)
    }

    #[must_use]
    pub fn killed(&self) -> bool {
        self.with(|p| p.killed)
    }

    #[must_use]
    pub fn priority(&self) -> Priority {
        self.with(|p| p.priority)
    }

    #[must_use]
    pub fn queue(&self) -> QueueNumber {
        self.with(|p| p.queue)
    }

    #[must_use]
    pub fn times(&self) -> ProcTimes {
        self.with(|p| p.times)
    }

    /// Size of the process image in bytes
    #[must_use]
    pub fn size(&self) -> usize {
        self.with(|p| p.size)
    }

    /// Ticks since boot
    #[must_use]
    pub fn uptime(&self) -> Ticks {
        self.guard_halt();
        self.shared.uptime()
    }

    /// Create a child that starts by running `entry`
    pub fn fork<F>(&self, entry: F) -> ProcessResult<Pid>
    where
        F: FnOnce(&CurrentProc) + Send + 'static,
    {
        self.guard_halt();
        self.shared.fork(self.slot, Box::new(entry))
    }

    /// Reap one zombie child, blocking until one exists
    pub fn wait(&self) -> ProcessResult<Reaped> {
        self.guard_halt();
        self.shared.wait(self.slot, WaitFor::Children)
    }

    /// Mark another process killed
    pub fn kill(&self, pid: Pid) -> ProcessResult<()> {
        self.guard_halt();
        self.shared.kill(pid)
    }

    /// Terminate this process
    pub fn exit(&self) -> ! {
        self.shared.exit_current(self.slot)
    }

    /// Give up the CPU for one round
    pub fn r#yield(&self) {
        self.guard_halt();
        self.shared.yield_cpu(self.slot);
    }

    /// Release `guard` and sleep on `chan`; `guard` is re-taken before returning
    pub fn sleep<'a, T>(&self, chan: Channel, guard: SpinGuard<'a, T>) -> SpinGuard<'a, T> {
        self.guard_halt();
        let guard = self.shared.sleep(self.slot, chan, guard);
        self.guard_halt();
        guard
    }

    /// Wake every process sleeping on `chan`
    pub fn wakeup(&self, chan: Channel) {
        self.guard_halt();
        self.shared.wakeup(chan);
    }

    /// Sleep for `n` clock ticks
    ///
    /// Fails with `Killed` if the process is killed before the time is up.
    pub fn sleep_ticks(&self, n: Ticks) -> ProcessResult<()> {
        self.guard_halt();
        let mut clock = self.shared.clock.lock();
        let start = *clock;
        while *clock - start < n {
            let (killed, pid) = {
                let table = self.shared.ptable.lock();
                let p = table.at(self.slot.index);
                (p.killed, p.pid)
            };
            if killed {
                return Err(ProcessError::Killed(pid));
            }
            clock = self.sleep(Channel::Ticks, clock);
        }
        Ok(())
    }

    /// Grow (or shrink, for negative `n`) the process image; returns the old size
    pub fn grow(&self, n: isize) -> ProcessResult<usize> {
        self.guard_halt();
        self.shared.grow(self.slot, n)
    }

    /// Safe point: exit if killed, yield if the timer asked for the CPU
    pub fn checkpoint(&self) {
        let (killed, resched) = self.with(|p| (p.killed, p.need_resched));
        if killed {
            debug!(slot = %self.slot, "exiting at checkpoint: killed");
            self.exit();
        }
        if resched {
            self.r#yield();
            if self.killed() {
                self.exit();
            }
        }
    }

    /// Block until orphans are handed over and reap them; never returns
    ///
    /// The loop run by the root process. It only stops when the process is
    /// killed, and the root exiting is fatal.
    pub fn reap_orphans(&self) -> ! {
        loop {
            match self.shared.wait(self.slot, WaitFor::Orphans) {
                Ok(reaped) => debug!(pid = reaped.pid, "reaped orphan"),
                Err(err) => {
                    info!(error = %err, "reaper stopping");
                    self.exit();
                }
            }
        }
    }
}
