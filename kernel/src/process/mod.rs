/*!
 * Process Module
 * Process table, lifecycle, sleep/wakeup and accounting
 */

mod accounting;
pub mod current;
pub(crate) mod lifecycle;
pub mod platform;
mod rendezvous;
pub mod table;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use current::{CurrentProc, ProcEntry};
pub use platform::{SimPlatform, SimStats};
pub use table::{ProcTable, SlotMirror, TableGuard};
pub use traits::{
    AddressSpace, FileRef, FileSystem, InodeRef, KernelStack, KernelStacks, Platform, UserTraps,
    VirtualMemory,
};
pub use types::{Channel, Proc, ProcInfo, ProcState, ProcTimes, Reaped, TrapFrame};
