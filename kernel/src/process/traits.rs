/*!
 * Process Traits
 * Collaborator interfaces consumed by the process core
 *
 * Virtual memory, kernel stacks, the file layer and user-mode trap setup are
 * owned elsewhere; the process table only holds opaque handles to them.
 */

use super::types::TrapFrame;
use crate::core::errors::ProcessResult;
use crate::core::types::CpuId;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, PartialEq, Eq, Hash)]
        pub struct $name {
            id: u64,
        }

        impl $name {
            #[inline]
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self { id }
            }

            #[inline]
            #[must_use]
            pub const fn id(&self) -> u64 {
                self.id
            }
        }
    };
}

handle!(
    /// User address space (page directory)
    AddressSpace
);
handle!(
    /// Kernel stack backing a process
    KernelStack
);
handle!(
    /// Reference to an open file
    FileRef
);
handle!(
    /// Reference to an inode (working directory)
    InodeRef
);

/// Address-space management
pub trait VirtualMemory: Send + Sync {
    /// Create the root process's address space
    fn setup_uvm(&self) -> ProcessResult<AddressSpace>;

    /// Duplicate `size` bytes of `space` into a fresh address space
    fn copy_uvm(&self, space: &AddressSpace, size: usize) -> ProcessResult<AddressSpace>;

    /// Grow from `old` to `new` bytes; returns the new size
    fn alloc_uvm(&self, space: &AddressSpace, old: usize, new: usize) -> ProcessResult<usize>;

    /// Shrink from `old` to `new` bytes; returns the new size
    fn dealloc_uvm(&self, space: &AddressSpace, old: usize, new: usize) -> usize;

    fn free_uvm(&self, space: AddressSpace);

    /// Install `space` on `cpu` before dispatch
    fn switch_uvm(&self, cpu: CpuId, space: Option<&AddressSpace>);

    /// Return `cpu` to the kernel-only address space
    fn switch_kvm(&self, cpu: CpuId);
}

/// Kernel stack allocator
pub trait KernelStacks: Send + Sync {
    fn alloc_kstack(&self) -> ProcessResult<KernelStack>;

    fn free_kstack(&self, stack: KernelStack);
}

/// File layer operations used at fork, exit and boot
pub trait FileSystem: Send + Sync {
    /// Open the console device for the root process's standard descriptors
    fn open_console(&self) -> ProcessResult<FileRef>;

    fn file_dup(&self, file: &FileRef) -> FileRef;

    fn file_close(&self, file: FileRef);

    /// Resolve a path to an inode
    fn namei(&self, path: &str) -> Option<InodeRef>;

    fn idup(&self, inode: &InodeRef) -> InodeRef;

    fn iput(&self, inode: InodeRef);
}

/// User-mode entry setup
pub trait UserTraps: Send + Sync {
    /// Prepare the root process's trap frame to start at address 0 with a
    /// stack at the top of its `size`-byte image
    fn init_user_frame(&self, frame: &mut TrapFrame, size: usize);
}

/// Everything the process core needs from the rest of the kernel
pub trait Platform: VirtualMemory + KernelStacks + FileSystem + UserTraps {}

impl<T> Platform for T where T: VirtualMemory + KernelStacks + FileSystem + UserTraps {}
