/*!
 * Core Types
 * Common types used across the kernel
 */

use serde::{Deserialize, Serialize};

/// Process ID type (0 marks an unused slot)
pub type Pid = u32;

/// Scheduling priority (1..=6, lower is more urgent under the priority policy)
pub type Priority = u8;

/// Feedback queue number (1..=4)
pub type QueueNumber = u8;

/// Timer ticks since boot
pub type Ticks = u64;

/// Virtual CPU index
pub type CpuId = usize;

/// Reference to a process table slot
///
/// The generation is bumped every time the slot is reaped, so a stale
/// reference to a reused slot never compares equal to the new occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotId {
    pub index: usize,
    pub generation: u32,
}

impl SlotId {
    #[inline]
    #[must_use]
    pub const fn new(index: usize, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.index, self.generation)
    }
}
