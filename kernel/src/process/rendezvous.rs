/*!
 * Sleep / Wakeup
 *
 * Sleeping and waking both happen under the table lock, and a sleeper holds
 * it from the moment it checks its condition until it is marked Sleeping, so
 * a wakeup can never fall into that gap. Wakeups are broadcasts; sleepers
 * re-check their condition after resuming.
 */

use super::table::{ProcTable, TableGuard};
use super::types::{Channel, ProcState};
use crate::core::sync::{SpinGuard, SpinLock};
use crate::core::types::SlotId;
use crate::kernel::KernelShared;
use tracing::trace;

impl ProcTable {
    /// Make every process sleeping on `chan` runnable; returns how many woke
    pub(crate) fn wake_channel(&mut self, chan: Channel) -> usize {
        let mut woken = 0;
        for index in 0..self.capacity() {
            let p = self.at(index);
            if p.state() == ProcState::Sleeping && p.channel == Some(chan) {
                self.set_state(index, ProcState::Runnable);
                woken += 1;
            }
        }
        woken
    }
}

impl KernelShared {
    /// Wake sleepers on `chan`; the caller holds the table lock
    pub(crate) fn wakeup_locked(&self, table: &mut ProcTable, chan: Channel) {
        let woken = table.wake_channel(chan);
        if woken > 0 {
            trace!(?chan, woken, "wakeup");
            self.idle.notify_all();
        }
    }

    pub(crate) fn wakeup(&self, chan: Channel) {
        let mut guard = self.ptable.lock();
        self.wakeup_locked(&mut guard, chan);
    }

    /// Sleep on `chan` while already holding the table lock
    pub(crate) fn sleep_locked(&self, guard: &mut TableGuard<'_>, slot: SlotId, chan: Channel) {
        guard.at_mut(slot.index).channel = Some(chan);
        guard.set_state(slot.index, ProcState::Sleeping);
        self.sched(guard, slot);
        guard.at_mut(slot.index).channel = None;
    }

    /// Atomically release `lock` and sleep on `chan`; reacquires `lock` before returning
    pub(crate) fn sleep<'a, T>(
        &self,
        slot: SlotId,
        chan: Channel,
        lock: SpinGuard<'a, T>,
    ) -> SpinGuard<'a, T> {
        // Take the table lock before letting go of the caller's lock so a
        // wakeup issued in between still finds this process Sleeping.
        let mut table = self.ptable.lock();
        let lock = SpinGuard::unlock(lock);
        self.sleep_locked(&mut table, slot, chan);
        drop(table);
        SpinLock::lock(lock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::SchedConfig;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wake_channel_is_a_broadcast() {
        let mut table = ProcTable::new(4, 1, SchedConfig::default());
        let key = Channel::Addr(0x40);
        let mut sleepers = Vec::new();
        for _ in 0..3 {
            let slot = table.stage(3, 1);
            table.at_mut(slot.index).channel = Some(key);
            table.set_state(slot.index, ProcState::Sleeping);
            sleepers.push(slot);
        }
        table.at_mut(sleepers[2].index).channel = Some(Channel::Ticks);

        assert_eq!(table.wake_channel(key), 2);
        assert_eq!(table.at(sleepers[0].index).state(), ProcState::Runnable);
        assert_eq!(table.at(sleepers[1].index).state(), ProcState::Runnable);
        assert_eq!(table.at(sleepers[2].index).state(), ProcState::Sleeping);
        assert_eq!(table.wake_channel(key), 0);
    }

    #[test]
    fn test_wake_ignores_runnable_with_stale_channel() {
        let mut table = ProcTable::new(2, 1, SchedConfig::default());
        let slot = table.stage(3, 1);
        table.at_mut(slot.index).channel = Some(Channel::Ticks);
        assert_eq!(table.wake_channel(Channel::Ticks), 0);
    }
}
