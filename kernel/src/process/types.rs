/*!
 * Process Types
 * Process control block, states, rendezvous keys and reaping results
 */

use super::traits::{AddressSpace, FileRef, InodeRef, KernelStack};
use crate::core::limits::{NOFILE, NSYSCALL, PROC_NAME_MAX};
use crate::core::types::{CpuId, Pid, Priority, QueueNumber, SlotId, Ticks};
use crate::scheduler::SchedConfig;
use serde::{Deserialize, Serialize};
use smartstring::alias::String as SmartString;
use std::fmt;

/// Process state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcState {
    /// Slot is free
    #[default]
    Unused,
    /// Slot claimed, process not yet fully built
    Embryo,
    /// Waiting for a rendezvous key
    Sleeping,
    /// Ready to be dispatched
    Runnable,
    /// Executing on a CPU
    Running,
    /// Terminated, waiting to be reaped by its parent
    Zombie,
}

impl ProcState {
    pub const ALL: [ProcState; 6] = [
        ProcState::Unused,
        ProcState::Embryo,
        ProcState::Sleeping,
        ProcState::Runnable,
        ProcState::Running,
        ProcState::Zombie,
    ];

    /// Fixed-width label used by the debug dump
    #[inline]
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            ProcState::Unused => "unused",
            ProcState::Embryo => "embryo",
            ProcState::Sleeping => "sleep ",
            ProcState::Runnable => "runble",
            ProcState::Running => "run   ",
            ProcState::Zombie => "zombie",
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decode a value stored by `as_u8`; anything else reads as `Unused`
    #[inline]
    #[must_use]
    pub const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ProcState::Embryo,
            2 => ProcState::Sleeping,
            3 => ProcState::Runnable,
            4 => ProcState::Running,
            5 => ProcState::Zombie,
            _ => ProcState::Unused,
        }
    }
}

impl fmt::Display for ProcState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label().trim_end())
    }
}

/// Rendezvous key a sleeping process waits on
///
/// Keys only compare for equality. `Proc` is the key a parent sleeps on while
/// waiting for its children; `Ticks` is the clock; `Addr` lets kernel code use
/// the address of any shared object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Proc(SlotId),
    Ticks,
    Addr(usize),
}

impl Channel {
    /// Key derived from the address of `value`
    #[inline]
    #[must_use]
    pub fn of<T>(value: &T) -> Self {
        Channel::Addr(value as *const T as usize)
    }
}

/// Per-process scheduling statistics, in ticks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcTimes {
    pub creation: Ticks,
    pub termination: Ticks,
    pub running: Ticks,
    pub ready: Ticks,
    pub sleeping: Ticks,
}

impl ProcTimes {
    /// Ticks spent on a CPU
    #[inline]
    #[must_use]
    pub const fn burst(&self) -> Ticks {
        self.running
    }

    #[inline]
    #[must_use]
    pub const fn turnaround(&self) -> Ticks {
        self.ready + self.sleeping + self.running
    }

    #[inline]
    #[must_use]
    pub const fn waiting(&self) -> Ticks {
        self.ready + self.sleeping
    }
}

/// Saved user registers that matter to the process core
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrapFrame {
    /// Return-value register
    pub ret: i32,
    /// User program counter
    pub pc: usize,
    /// User stack pointer
    pub sp: usize,
    /// Interrupts enabled when returning to user mode
    pub interrupts: bool,
}

/// Saved kernel execution context
///
/// `resume` is raised by the dispatcher and consumed by the process thread;
/// `cpu` names the CPU the process was dispatched on while it runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Context {
    pub cpu: Option<CpuId>,
    pub resume: bool,
}

/// Process control block
///
/// `state` is only changed through `ProcTable::set_state` so the lock-free
/// mirror read by the debug dump stays in step.
#[derive(Debug, Default)]
pub struct Proc {
    pub pid: Pid,
    pub(in crate::process) state: ProcState,
    pub name: SmartString,
    pub priority: Priority,
    pub queue: QueueNumber,
    /// Remaining quantum ticks
    pub current_slice: u32,
    /// Dispatched under quantum round robin
    pub quantum_dispatch: bool,
    /// Timer asked this process to give up its CPU
    pub need_resched: bool,
    pub parent: Option<SlotId>,
    pub channel: Option<Channel>,
    pub killed: bool,
    pub times: ProcTimes,
    pub syscalls: [u32; NSYSCALL],
    pub kstack: Option<KernelStack>,
    pub space: Option<AddressSpace>,
    /// Size of the process image in bytes
    pub size: usize,
    pub trap_frame: TrapFrame,
    pub files: [Option<FileRef>; NOFILE],
    pub cwd: Option<InodeRef>,
    pub context: Context,
}

impl Proc {
    #[inline]
    #[must_use]
    pub fn state(&self) -> ProcState {
        self.state
    }

    #[inline]
    #[must_use]
    pub fn is_unused(&self) -> bool {
        self.state == ProcState::Unused
    }

    /// Copy `name` in, keeping at most `PROC_NAME_MAX - 1` bytes
    pub fn set_name(&mut self, name: &str) {
        let mut end = name.len().min(PROC_NAME_MAX - 1);
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        self.name = name[..end].into();
    }
}

/// Serializable view of one occupied slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcInfo {
    pub slot: usize,
    pub pid: Pid,
    pub name: String,
    pub state: ProcState,
    pub priority: Priority,
    pub queue: QueueNumber,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Pid>,
    pub killed: bool,
    pub times: ProcTimes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuId>,
}

/// What `wait` learned about a child it reaped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reaped {
    pub pid: Pid,
    pub priority: Priority,
    pub queue: QueueNumber,
    pub times: ProcTimes,
    /// Scheduler configuration at the moment of reaping
    pub sched: SchedConfig,
}

impl Reaped {
    /// Identifier handed back by the wait syscall
    ///
    /// Queue number in feedback mode, priority under the priority policies,
    /// pid otherwise.
    #[must_use]
    pub fn identifier(&self) -> i32 {
        if self.sched.feedback.is_enabled() {
            i32::from(self.queue)
        } else if self.sched.policy.is_priority_based() {
            i32::from(self.priority)
        } else {
            self.pid as i32
        }
    }

    /// `(burst, turnaround, waiting)` when accounting-aware scheduling was active
    #[must_use]
    pub fn statistics(&self) -> Option<(Ticks, Ticks, Ticks)> {
        self.sched.accounting_aware().then(|| {
            (
                self.times.burst(),
                self.times.turnaround(),
                self.times.waiting(),
            )
        })
    }
}
