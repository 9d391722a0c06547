/*!
 * System Limits and Constants
 *
 * Centralized location for the kernel's fixed limits and defaults.
 * Grouped by domain: process table, scheduling, descriptors, timing.
 */

use crate::core::types::{Priority, QueueNumber};
use std::time::Duration;

// =============================================================================
// PROCESS TABLE
// =============================================================================

/// Default number of process table slots
pub const DEFAULT_NPROC: usize = 64;

/// Upper bound accepted for the process table capacity
pub const MAX_NPROC: usize = 1024;

/// Default number of virtual CPUs
pub const DEFAULT_NCPU: usize = 2;

/// Upper bound accepted for the virtual CPU count
pub const MAX_NCPU: usize = 64;

/// Longest process name kept in the PCB
pub const PROC_NAME_MAX: usize = 16;

/// Name given to the root process
pub const INIT_NAME: &str = "initcode";

/// Host stack size for each process thread
pub const PROC_THREAD_STACK: usize = 256 * 1024;

// =============================================================================
// SCHEDULING
// =============================================================================

/// Ticks granted per dispatch under quantum round robin
pub const DEFAULT_QUANTUM: u32 = 5;

/// Priority assigned by allocate
pub const DEFAULT_PRIORITY: Priority = 3;

/// Priority applied when a set request is out of range
pub const RESET_PRIORITY: Priority = 5;

pub const MIN_PRIORITY: Priority = 1;
pub const MAX_PRIORITY: Priority = 6;

/// Queue assigned by allocate and by out-of-range set requests
pub const DEFAULT_QUEUE: QueueNumber = 1;

pub const MIN_QUEUE: QueueNumber = 1;
pub const MAX_QUEUE: QueueNumber = 4;

// =============================================================================
// DESCRIPTORS AND SYSCALLS
// =============================================================================

/// Open files per process
pub const NOFILE: usize = 16;

/// Size of the per-process syscall counter array
pub const NSYSCALL: usize = 32;

/// Descriptors the root process starts with (stdin, stdout, stderr)
pub const STDIO_FDS: usize = 3;

/// Size of the root process image
pub const PGSIZE: usize = 4096;

// =============================================================================
// TIMING
// =============================================================================

/// How long an idle CPU or a parked thread waits before re-checking for halt
pub const DEFAULT_IDLE_POLL: Duration = Duration::from_millis(5);

/// How long the debug dump waits for the table lock before skipping names
pub const DUMP_LOCK_TIMEOUT: Duration = Duration::from_millis(20);
