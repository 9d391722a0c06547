/*!
 * Accounting
 * Per-tick bookkeeping of time spent running, ready and sleeping
 */

use super::table::ProcTable;
use super::types::ProcState;
use crate::core::types::Ticks;

impl ProcTable {
    /// Charge one tick to every PCB according to its current state
    ///
    /// Counters only grow; they are read by `wait` and reset when the slot
    /// is cleared.
    pub(crate) fn charge_tick(&mut self, now: Ticks) {
        self.set_now(now);
        for index in 0..self.capacity() {
            let p = self.at_mut(index);
            match p.state() {
                ProcState::Running => p.times.running += 1,
                ProcState::Runnable => p.times.ready += 1,
                ProcState::Sleeping => p.times.sleeping += 1,
                ProcState::Unused | ProcState::Embryo | ProcState::Zombie => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::types::ProcTimes;
    use crate::scheduler::SchedConfig;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_each_state_charges_its_counter() {
        let mut t = ProcTable::new(4, 1, SchedConfig::default());
        let running = t.stage(3, 1);
        let ready = t.stage(3, 1);
        let sleeping = t.stage(3, 1);
        let embryo = t.claim().unwrap();
        t.set_state(running.index, ProcState::Running);
        t.set_state(sleeping.index, ProcState::Sleeping);

        t.charge_tick(1);
        t.charge_tick(2);

        assert_eq!(t.now(), 2);
        assert_eq!(t.at(running.index).times.running, 2);
        assert_eq!(t.at(ready.index).times.ready, 2);
        assert_eq!(t.at(sleeping.index).times.sleeping, 2);
        assert_eq!(t.at(embryo.index).times, ProcTimes::default());
    }

    #[test]
    fn test_lifetime_statistics() {
        // T1 = 3 running, T2 = 2 ready, T3 = 4 sleeping
        let mut t = ProcTable::new(1, 1, SchedConfig::default());
        let slot = t.stage(3, 1);
        let mut now = 0;
        for (state, ticks) in [
            (ProcState::Runnable, 2),
            (ProcState::Running, 3),
            (ProcState::Sleeping, 4),
        ] {
            t.set_state(slot.index, state);
            for _ in 0..ticks {
                now += 1;
                t.charge_tick(now);
            }
        }
        t.set_state(slot.index, ProcState::Zombie);
        t.charge_tick(now + 1);

        let times = t.at(slot.index).times;
        assert_eq!(times.burst(), 3);
        assert_eq!(times.waiting(), 2 + 4);
        assert_eq!(times.turnaround(), 3 + 2 + 4);
    }
}
