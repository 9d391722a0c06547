/*!
 * Process Table
 *
 * Fixed-capacity arena of PCBs indexed by slot. The whole table sits behind
 * one kernel lock (`KernelShared::ptable`); every method here assumes the
 * caller holds it.
 *
 * Each slot carries a generation that is bumped when the slot is cleared, so
 * a `SlotId` held across a reap never resolves to the slot's next occupant.
 * State changes are mirrored into atomics that the debug dump reads without
 * taking the lock.
 */

use super::types::{Proc, ProcInfo, ProcState};
use crate::core::limits::{DEFAULT_PRIORITY, DEFAULT_QUEUE};
use crate::core::sync::SpinGuard;
use crate::core::types::{Pid, SlotId, Ticks};
use crate::scheduler::{CpuState, SchedConfig};
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

/// Guard over the locked process table
pub type TableGuard<'a> = SpinGuard<'a, ProcTable>;

/// Lock-free copy of a slot's pid and state
#[derive(Debug, Default)]
pub struct SlotMirror {
    pid: AtomicU32,
    state: AtomicU8,
}

impl SlotMirror {
    #[inline]
    #[must_use]
    pub fn pid(&self) -> Pid {
        self.pid.load(Ordering::Relaxed)
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> ProcState {
        ProcState::from_u8(self.state.load(Ordering::Relaxed))
    }

    fn store(&self, pid: Pid, state: ProcState) {
        self.pid.store(pid, Ordering::Relaxed);
        self.state.store(state.as_u8(), Ordering::Relaxed);
    }
}

pub struct ProcTable {
    procs: Box<[Proc]>,
    generations: Box<[u32]>,
    mirror: Arc<[SlotMirror]>,
    next_pid: Pid,
    now: Ticks,
    pub(crate) cpus: Vec<CpuState>,
    pub(crate) sched: SchedConfig,
}

impl ProcTable {
    pub fn new(capacity: usize, cpus: usize, sched: SchedConfig) -> Self {
        Self {
            procs: (0..capacity).map(|_| Proc::default()).collect(),
            generations: vec![0; capacity].into_boxed_slice(),
            mirror: (0..capacity).map(|_| SlotMirror::default()).collect(),
            next_pid: 1,
            now: 0,
            cpus: (0..cpus).map(|_| CpuState::default()).collect(),
            sched,
        }
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.procs.len()
    }

    /// Shared handle to the lock-free mirror
    #[must_use]
    pub fn mirror(&self) -> Arc<[SlotMirror]> {
        Arc::clone(&self.mirror)
    }

    /// Last tick seen by accounting
    #[inline]
    #[must_use]
    pub fn now(&self) -> Ticks {
        self.now
    }

    #[inline]
    pub(crate) fn set_now(&mut self, now: Ticks) {
        self.now = now;
    }

    #[inline]
    #[must_use]
    pub fn slot_id(&self, index: usize) -> SlotId {
        SlotId::new(index, self.generations[index])
    }

    /// Direct slot access
    ///
    /// # Panics
    /// Panics if `index` is out of range.
    #[inline]
    #[must_use]
    pub fn at(&self, index: usize) -> &Proc {
        &self.procs[index]
    }

    #[inline]
    pub fn at_mut(&mut self, index: usize) -> &mut Proc {
        &mut self.procs[index]
    }

    /// Resolve a slot reference, failing if the slot was cleared since
    #[inline]
    #[must_use]
    pub fn get(&self, slot: SlotId) -> Option<&Proc> {
        self.is_live(slot).then(|| &self.procs[slot.index])
    }

    #[inline]
    pub fn get_mut(&mut self, slot: SlotId) -> Option<&mut Proc> {
        if self.is_live(slot) {
            Some(&mut self.procs[slot.index])
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub fn is_live(&self, slot: SlotId) -> bool {
        self.generations
            .get(slot.index)
            .is_some_and(|generation| *generation == slot.generation)
    }

    /// Iterate over `(index, proc)` in scan order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Proc)> {
        self.procs.iter().enumerate()
    }

    /// Slot of the occupied PCB with `pid`
    #[must_use]
    pub fn find_pid(&self, pid: Pid) -> Option<SlotId> {
        if pid == 0 {
            return None;
        }
        self.iter()
            .find(|(_, p)| p.pid == pid && !p.is_unused())
            .map(|(index, _)| self.slot_id(index))
    }

    /// Claim the first unused slot as an embryo with a fresh pid
    pub fn claim(&mut self) -> Option<SlotId> {
        let index = self.procs.iter().position(Proc::is_unused)?;
        let pid = self.next_pid;
        self.next_pid += 1;

        let now = self.now;
        let p = &mut self.procs[index];
        p.pid = pid;
        p.priority = DEFAULT_PRIORITY;
        p.queue = DEFAULT_QUEUE;
        p.times.creation = now;
        self.set_state(index, ProcState::Embryo);
        Some(self.slot_id(index))
    }

    /// The only way a PCB changes state
    pub fn set_state(&mut self, index: usize, state: ProcState) {
        let p = &mut self.procs[index];
        p.state = state;
        self.mirror[index].store(p.pid, state);
    }

    /// Reset a slot to unused and retire every reference to it
    ///
    /// Collaborator handles must already have been taken out and released.
    pub fn clear(&mut self, index: usize) {
        self.procs[index] = Proc::default();
        self.generations[index] = self.generations[index].wrapping_add(1);
        self.mirror[index].store(0, ProcState::Unused);
    }

    /// Number of slots not Unused
    #[must_use]
    pub fn occupancy(&self) -> usize {
        self.procs.iter().filter(|p| !p.is_unused()).count()
    }

    /// Serializable view of slot `index`
    #[must_use]
    pub fn info(&self, index: usize) -> ProcInfo {
        let p = &self.procs[index];
        ProcInfo {
            slot: index,
            pid: p.pid,
            name: p.name.to_string(),
            state: p.state,
            priority: p.priority,
            queue: p.queue,
            parent: p
                .parent
                .and_then(|parent| self.get(parent))
                .map(|parent| parent.pid),
            killed: p.killed,
            times: p.times,
            cpu: p.context.cpu,
        }
    }

    /// Put a runnable PCB in place without a backing thread
    #[cfg(test)]
    pub(crate) fn stage(&mut self, priority: u8, queue: u8) -> SlotId {
        let slot = self.claim().expect("table full");
        let p = &mut self.procs[slot.index];
        p.priority = priority;
        p.queue = queue;
        self.set_state(slot.index, ProcState::Runnable);
        slot
    }
}
