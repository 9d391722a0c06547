/*!
 * Syscall Types
 * Syscall numbers and names
 */

use serde::{Deserialize, Serialize};

/// System calls implemented by the process core
///
/// Numbers index the per-process counters (`number - 1`).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Syscall {
    Fork = 1,
    Exit = 2,
    Wait = 3,
    Kill = 6,
    Getpid = 11,
    Sbrk = 12,
    Sleep = 13,
    Uptime = 14,
    GetParentId = 22,
    GetChildren = 23,
    GetSyscallCounter = 24,
    SetPriority = 25,
    GetPriority = 26,
    ChangePolicy = 27,
    GetPriorityOfPid = 28,
    SetQueueNumber = 29,
    ChangeFeedbackMode = 30,
    Yield = 31,
}

impl Syscall {
    pub const ALL: [Syscall; 18] = [
        Syscall::Fork,
        Syscall::Exit,
        Syscall::Wait,
        Syscall::Kill,
        Syscall::Getpid,
        Syscall::Sbrk,
        Syscall::Sleep,
        Syscall::Uptime,
        Syscall::GetParentId,
        Syscall::GetChildren,
        Syscall::GetSyscallCounter,
        Syscall::SetPriority,
        Syscall::GetPriority,
        Syscall::ChangePolicy,
        Syscall::GetPriorityOfPid,
        Syscall::SetQueueNumber,
        Syscall::ChangeFeedbackMode,
        Syscall::Yield,
    ];

    #[inline]
    #[must_use]
    pub const fn number(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn from_number(number: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|call| call.number() == number)
    }

    #[inline(always)]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Syscall::Fork => "fork",
            Syscall::Exit => "exit",
            Syscall::Wait => "wait",
            Syscall::Kill => "kill",
            Syscall::Getpid => "getpid",
            Syscall::Sbrk => "sbrk",
            Syscall::Sleep => "sleep",
            Syscall::Uptime => "uptime",
            Syscall::GetParentId => "getParentID",
            Syscall::GetChildren => "getChildren",
            Syscall::GetSyscallCounter => "getSyscallCounter",
            Syscall::SetPriority => "setPriority",
            Syscall::GetPriority => "getPriority",
            Syscall::ChangePolicy => "changePolicy",
            Syscall::GetPriorityOfPid => "getPriorityOfPID",
            Syscall::SetQueueNumber => "setQueueNumber",
            Syscall::ChangeFeedbackMode => "changeFeedbackMode",
            Syscall::Yield => "yield",
        }
    }
}
