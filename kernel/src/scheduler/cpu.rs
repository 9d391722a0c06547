/*!
 * Per-CPU Dispatch
 *
 * Each virtual CPU runs `scheduler` on its own thread. A dispatch hands the
 * table lock to the chosen process thread and parks the CPU until that
 * process transfers back with `sched`; the lock is held by whichever side is
 * awake, so the handoff is atomic with respect to every other CPU.
 */

use super::select::{self, Cursors, Pick};
use crate::core::sync::intr;
use crate::core::types::{CpuId, SlotId};
use crate::kernel::{unwind, KernelShared};
use crate::process::{ProcState, ProcTable, TableGuard};
use tracing::{debug, info, trace};

/// Scheduler-side state of one CPU, kept in the process table
#[derive(Debug, Clone, Default)]
pub struct CpuState {
    /// Process dispatched on this CPU
    pub current: Option<SlotId>,
    /// The current process has transferred back
    pub returned: bool,
    pub cursors: Cursors,
    pub dispatches: u64,
}

impl CpuState {
    /// Process actively running here, ignoring one that already transferred back
    #[inline]
    #[must_use]
    pub fn running(&self) -> Option<SlotId> {
        self.current.filter(|_| !self.returned)
    }
}

impl KernelShared {
    /// Dispatch loop for one CPU; returns once the kernel halts
    pub(crate) fn scheduler(&self, cpu: CpuId) {
        info!(cpu, "cpu online");
        loop {
            intr::intr_on();
            let mut guard = self.ptable.lock();
            if self.is_halted() {
                break;
            }

            let config = guard.sched;
            let mut cursors = guard.cpus[cpu].cursors;
            let pick = select::pick(&guard, config, &mut cursors);
            guard.cpus[cpu].cursors = cursors;

            match pick {
                Some(pick) => self.dispatch(cpu, &mut guard, pick),
                None => {
                    guard.wait_for(&self.idle, self.idle_poll);
                }
            }
        }
        info!(cpu, "cpu halted");
    }

    /// Run `pick` on `cpu` until it transfers back
    fn dispatch(&self, cpu: CpuId, guard: &mut TableGuard<'_>, pick: Pick) {
        let index = pick.slot.index;
        let quantum = self.config.quantum;

        let p = guard.at_mut(index);
        p.current_slice = if pick.quantum { quantum } else { 0 };
        p.quantum_dispatch = pick.quantum;
        p.need_resched = false;
        p.context.cpu = Some(cpu);
        p.context.resume = true;
        let pid = p.pid;

        self.platform.switch_uvm(cpu, p.space.as_ref());
        guard.set_state(index, ProcState::Running);
        let state = &mut guard.cpus[cpu];
        state.current = Some(pick.slot);
        state.returned = false;
        state.dispatches += 1;
        trace!(cpu, pid, slot = %pick.slot, tier = ?pick.tier, "dispatch");

        self.resume[index].notify_all();
        while !guard.cpus[cpu].returned {
            if self.is_halted() {
                return;
            }
            guard.wait_for(&self.cpu_return[cpu], self.idle_poll);
        }

        let state = &mut guard.cpus[cpu];
        state.returned = false;
        state.current = None;
        self.platform.switch_kvm(cpu);
    }

    /// Fatal unless `slot` may transfer away from its CPU right now
    ///
    /// The caller must hold exactly the table lock, with interrupts off, and
    /// must already have moved the process out of Running.
    pub(crate) fn check_transfer(&self, guard: &TableGuard<'_>, slot: SlotId) -> CpuId {
        if intr::depth() != 1 {
            self.fatal("sched locks");
        }
        let p = guard.at(slot.index);
        if p.state() == ProcState::Running {
            self.fatal("sched running");
        }
        if intr::intr_get() {
            self.fatal("sched interruptible");
        }
        let Some(cpu) = p.context.cpu else {
            self.fatal("sched no cpu");
        };
        if guard.cpus[cpu].running() != Some(slot) {
            self.fatal("sched double transfer");
        }
        cpu
    }

    /// Hand the CPU back to its dispatch loop without waiting to be resumed
    pub(crate) fn switch_out(&self, guard: &mut TableGuard<'_>, slot: SlotId) {
        let cpu = self.check_transfer(guard, slot);
        guard.at_mut(slot.index).context.cpu = None;
        guard.cpus[cpu].returned = true;
        self.cpu_return[cpu].notify_all();
    }

    /// Park the calling process thread until a CPU dispatches it
    ///
    /// Returns holding the table lock handed over by the dispatcher. Unwinds
    /// the thread if the kernel halts or the slot is released meanwhile.
    pub(crate) fn await_resume(&self, guard: &mut TableGuard<'_>, slot: SlotId) {
        loop {
            if self.is_halted() || !guard.is_live(slot) {
                unwind();
            }
            let context = &mut guard.at_mut(slot.index).context;
            if context.resume {
                context.resume = false;
                return;
            }
            guard.wait_for(&self.resume[slot.index], self.idle_poll);
        }
    }

    /// Transfer from the calling process to its CPU's dispatch loop and back
    pub(crate) fn sched(&self, guard: &mut TableGuard<'_>, slot: SlotId) {
        let intena = intr::intena();
        self.switch_out(guard, slot);
        self.await_resume(guard, slot);
        intr::set_intena(intena);
    }

    /// Give up the CPU for one scheduling round
    pub(crate) fn yield_cpu(&self, slot: SlotId) {
        let mut guard = self.ptable.lock();
        guard.at_mut(slot.index).need_resched = false;
        guard.set_state(slot.index, ProcState::Runnable);
        self.sched(&mut guard, slot);
        debug!(slot = %slot, "resumed after yield");
    }
}

impl ProcTable {
    /// Timer half of preemption
    ///
    /// Quantum-dispatched processes lose one tick of their slice and are asked
    /// to reschedule when it runs out; everything else running is asked every
    /// tick.
    pub(crate) fn expire_quanta(&mut self) {
        for index in 0..self.capacity() {
            let p = self.at_mut(index);
            if p.state() != ProcState::Running {
                continue;
            }
            if p.quantum_dispatch {
                p.current_slice = p.current_slice.saturating_sub(1);
                if p.current_slice == 0 {
                    p.need_resched = true;
                }
            } else {
                p.need_resched = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::SchedConfig;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_quantum_counts_down_before_resched() {
        let mut table = ProcTable::new(2, 1, SchedConfig::default());
        let slot = table.stage(3, 1);
        table.set_state(slot.index, ProcState::Running);
        let p = table.at_mut(slot.index);
        p.quantum_dispatch = true;
        p.current_slice = 2;

        table.expire_quanta();
        assert!(!table.at(slot.index).need_resched);
        assert_eq!(table.at(slot.index).current_slice, 1);

        table.expire_quanta();
        assert!(table.at(slot.index).need_resched);
    }

    #[test]
    fn test_plain_dispatch_reschedules_every_tick() {
        let mut table = ProcTable::new(2, 1, SchedConfig::default());
        let running = table.stage(3, 1);
        let waiting = table.stage(3, 1);
        table.set_state(running.index, ProcState::Running);

        table.expire_quanta();
        assert!(table.at(running.index).need_resched);
        assert!(!table.at(waiting.index).need_resched);
    }

    #[test]
    fn test_returned_cpu_has_no_running_process() {
        let mut state = CpuState {
            current: Some(SlotId::new(3, 0)),
            ..CpuState::default()
        };
        assert_eq!(state.running(), Some(SlotId::new(3, 0)));
        state.returned = true;
        assert_eq!(state.running(), None);
    }
}
