/*!
 * Process Syscalls
 * fork, exit, wait, kill, getpid, sbrk and the family queries
 */

use super::types::Syscall;
use crate::core::limits::NSYSCALL;
use crate::core::types::Pid;
use crate::process::CurrentProc;

/// Encode child pids in scan order, child k contributing `pid * 100^k`
///
/// Wraps like the 32-bit register it is returned in.
#[must_use]
pub fn pack_children<I>(pids: I) -> i32
where
    I: IntoIterator<Item = Pid>,
{
    let mut packed: i32 = 0;
    let mut scale: i32 = 1;
    for pid in pids {
        packed = packed.wrapping_add((pid as i32).wrapping_mul(scale));
        scale = scale.wrapping_mul(100);
    }
    packed
}

impl CurrentProc {
    pub fn sys_fork<F>(&self, entry: F) -> i32
    where
        F: FnOnce(&CurrentProc) + Send + 'static,
    {
        self.syscall(Syscall::Fork, |p| {
            p.fork(entry).map_or(-1, |pid| pid as i32)
        })
    }

    pub fn sys_exit(&self) -> ! {
        self.enter_syscall(Syscall::Exit);
        self.exit()
    }

    /// Reap a child; statistics are written only under accounting-aware scheduling
    pub fn sys_wait(&self, burst: &mut i32, turnaround: &mut i32, waiting: &mut i32) -> i32 {
        self.syscall(Syscall::Wait, |p| match p.wait() {
            Ok(reaped) => {
                if let Some((b, t, w)) = reaped.statistics() {
                    *burst = b as i32;
                    *turnaround = t as i32;
                    *waiting = w as i32;
                }
                reaped.identifier()
            }
            Err(_) => -1,
        })
    }

    pub fn sys_kill(&self, pid: i32) -> i32 {
        self.syscall(Syscall::Kill, |p| match Pid::try_from(pid) {
            Ok(pid) if p.kill(pid).is_ok() => 0,
            _ => -1,
        })
    }

    pub fn sys_getpid(&self) -> i32 {
        self.syscall(Syscall::Getpid, |p| p.pid() as i32)
    }

    /// Grow memory by `n` bytes; returns the old break
    pub fn sys_sbrk(&self, n: i32) -> i32 {
        self.syscall(Syscall::Sbrk, |p| {
            p.grow(n as isize).map_or(-1, |old| old as i32)
        })
    }

    /// Parent's pid, or 0 for the root process
    pub fn sys_get_parent_pid(&self) -> i32 {
        self.syscall(Syscall::GetParentId, |p| p.parent_pid().map_or(0, |pid| pid as i32))
    }

    pub fn sys_get_children(&self) -> i32 {
        self.syscall(Syscall::GetChildren, |p| pack_children(p.children()))
    }

    /// Times syscall `n` (1-based) was invoked by the caller; -1 if out of range
    pub fn sys_get_syscall_counter(&self, n: i32) -> i32 {
        self.syscall(Syscall::GetSyscallCounter, |p| {
            p.syscall_count(n).map_or(-1, |count| count as i32)
        })
    }

    /// Pid of the parent
    #[must_use]
    pub fn parent_pid(&self) -> Option<Pid> {
        let slot = self.slot();
        self.guard_halt();
        let table = self.shared.ptable.lock();
        table
            .at(slot.index)
            .parent
            .and_then(|parent| table.get(parent))
            .map(|parent| parent.pid)
    }

    /// Pids of every child, in table scan order
    #[must_use]
    pub fn children(&self) -> Vec<Pid> {
        let slot = self.slot();
        self.guard_halt();
        let table = self.shared.ptable.lock();
        table
            .iter()
            .filter(|(_, p)| !p.is_unused() && p.parent == Some(slot))
            .map(|(_, p)| p.pid)
            .collect()
    }

    /// Invocation count of syscall number `n`
    #[must_use]
    pub fn syscall_count(&self, n: i32) -> Option<u32> {
        let index = usize::try_from(n).ok()?.checked_sub(1)?;
        if index >= NSYSCALL {
            return None;
        }
        Some(self.with(|p| p.syscalls[index]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_pack_children_scales_by_hundreds() {
        assert_eq!(pack_children([]), 0);
        assert_eq!(pack_children([7]), 7);
        assert_eq!(pack_children([4, 5]), 4 + 500);
        assert_eq!(pack_children([4, 5, 6]), 4 + 500 + 60_000);
    }

    proptest! {
        #[test]
        fn prop_small_pids_decode_back(pids in prop::collection::vec(1u32..100, 0..5)) {
            let mut packed = pack_children(pids.iter().copied());
            let mut decoded = Vec::new();
            for _ in 0..pids.len() {
                decoded.push((packed % 100) as u32);
                packed /= 100;
            }
            prop_assert_eq!(decoded, pids);
        }
    }
}
