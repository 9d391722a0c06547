/*!
 * Syscalls Module
 *
 * Integer-ABI entry points on `CurrentProc`. Every call goes through the
 * same boundary: count it, trace it, run it, store the return value in the
 * trap frame, then act on a pending kill or reschedule before returning.
 * Typed errors collapse to -1 here.
 */

mod process;
mod scheduler;
mod time;
mod types;

// Re-export public API
pub use process::pack_children;
pub use types::Syscall;

use crate::core::types::Pid;
use crate::monitoring::SyscallSpan;
use crate::process::CurrentProc;

impl CurrentProc {
    /// Count the call and leave if already killed; returns the caller's pid
    fn enter_syscall(&self, call: Syscall) -> Pid {
        let (pid, killed) = self.with_mut(|p| {
            let counter = &mut p.syscalls[call.number() - 1];
            *counter = counter.wrapping_add(1);
            (p.pid, p.killed)
        });
        if killed {
            self.exit();
        }
        pid
    }

    fn syscall(&self, call: Syscall, body: impl FnOnce(&Self) -> i32) -> i32 {
        let pid = self.enter_syscall(call);
        let span = SyscallSpan::new(call.name(), pid);
        let ret = {
            let _entered = span.enter();
            body(self)
        };
        span.record_return(i64::from(ret));

        self.with_mut(|p| p.trap_frame.ret = ret);
        self.checkpoint();
        ret
    }
}
