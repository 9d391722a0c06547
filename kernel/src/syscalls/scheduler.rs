/*!
 * Scheduler Syscalls
 * Priority, queue, policy and feedback-mode controls
 */

use super::types::Syscall;
use crate::core::types::{Pid, Priority, QueueNumber};
use crate::process::CurrentProc;
use crate::scheduler::{normalize_priority, normalize_queue, FeedbackMode, Policy};
use tracing::info;

impl CurrentProc {
    /// Set the caller's priority; out-of-range requests reset it to 5
    pub fn set_priority(&self, raw: i32) -> Priority {
        let priority = normalize_priority(raw);
        self.with_mut(|p| p.priority = priority);
        priority
    }

    /// Move the caller to a feedback queue; out-of-range requests pick queue 1
    pub fn set_queue(&self, raw: i32) -> QueueNumber {
        let queue = normalize_queue(raw);
        self.with_mut(|p| p.queue = queue);
        queue
    }

    /// Priority of the process with `pid`, if it exists
    #[must_use]
    pub fn priority_of(&self, pid: Pid) -> Option<Priority> {
        self.guard_halt();
        let table = self.shared.ptable.lock();
        let slot = table.find_pid(pid)?;
        table.get(slot).map(|p| p.priority)
    }

    /// Switch the flat policy for every CPU; returns the effective policy
    pub fn change_policy(&self, raw: i32) -> Policy {
        self.guard_halt();
        let policy = self.shared.ptable.lock().sched.set_policy(raw);
        info!(%policy, "scheduling policy changed");
        policy
    }

    /// Switch the feedback-queue mode; returns the effective mode
    pub fn change_feedback_mode(&self, raw: i32) -> FeedbackMode {
        self.guard_halt();
        let mode = self.shared.ptable.lock().sched.set_feedback(raw);
        info!(mode = mode.as_raw(), "feedback mode changed");
        mode
    }

    pub fn sys_set_priority(&self, priority: i32) -> i32 {
        self.syscall(Syscall::SetPriority, |p| i32::from(p.set_priority(priority)))
    }

    pub fn sys_get_priority(&self) -> i32 {
        self.syscall(Syscall::GetPriority, |p| i32::from(p.priority()))
    }

    /// -1 when no process has `pid`
    pub fn sys_get_priority_of_pid(&self, pid: i32) -> i32 {
        self.syscall(Syscall::GetPriorityOfPid, |p| {
            Pid::try_from(pid)
                .ok()
                .and_then(|pid| p.priority_of(pid))
                .map_or(-1, i32::from)
        })
    }

    pub fn sys_change_policy(&self, policy: i32) -> i32 {
        self.syscall(Syscall::ChangePolicy, |p| p.change_policy(policy).as_raw())
    }

    pub fn sys_set_queue_number(&self, queue: i32) -> i32 {
        self.syscall(Syscall::SetQueueNumber, |p| i32::from(p.set_queue(queue)))
    }

    pub fn sys_change_feedback_mode(&self, mode: i32) -> i32 {
        self.syscall(Syscall::ChangeFeedbackMode, |p| {
            p.change_feedback_mode(mode).as_raw()
        })
    }

    pub fn sys_yield(&self) -> i32 {
        self.syscall(Syscall::Yield, |p| {
            p.r#yield();
            0
        })
    }
}
