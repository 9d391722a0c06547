/*!
 * TeachOS Kernel Library
 * Process table and CPU scheduling core of a small teaching kernel,
 * hosted on ordinary threads
 */

pub mod core;
pub mod kernel;
pub mod monitoring;
pub mod process;
pub mod scheduler;
pub mod syscalls;

// Re-exports
pub use crate::core::{
    KernelConfig, KernelError, KernelResult, Pid, Priority, ProcessError, ProcessResult,
    QueueNumber, SlotId, Ticks,
};
pub use kernel::{Kernel, KernelBuilder};
pub use monitoring::init_tracing;
pub use process::{
    Channel, CurrentProc, Platform, ProcInfo, ProcState, ProcTimes, Reaped, SimPlatform, SimStats,
};
pub use scheduler::{FeedbackMode, Policy, SchedConfig};
pub use syscalls::{pack_children, Syscall};
