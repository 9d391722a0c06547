/*!
 * Time Syscalls
 * sleep and uptime
 */

use super::types::Syscall;
use crate::process::CurrentProc;

impl CurrentProc {
    /// Sleep for `n` ticks; -1 if killed while sleeping
    pub fn sys_sleep(&self, n: i32) -> i32 {
        self.syscall(Syscall::Sleep, |p| {
            let ticks = u64::try_from(n).unwrap_or(0);
            match p.sleep_ticks(ticks) {
                Ok(()) => 0,
                Err(_) => -1,
            }
        })
    }

    /// Ticks since boot
    pub fn sys_uptime(&self) -> i32 {
        self.syscall(Syscall::Uptime, |p| p.uptime() as i32)
    }
}
