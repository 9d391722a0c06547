/*!
 * Simulated Platform
 *
 * In-memory implementation of the collaborator traits. Tracks every live
 * handle so tests can prove that reaping and failed forks release all
 * resources, and supports injecting allocation failures.
 */

use super::traits::{
    AddressSpace, FileRef, FileSystem, InodeRef, KernelStack, KernelStacks, UserTraps,
    VirtualMemory,
};
use super::types::TrapFrame;
use crate::core::errors::{ProcessError, ProcessResult};
use crate::core::types::CpuId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::trace;

/// Live resource counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimStats {
    pub address_spaces: usize,
    pub kernel_stacks: usize,
    /// Open file references, counting duplicates
    pub file_refs: usize,
    /// Inode references, counting duplicates
    pub inode_refs: usize,
    /// Total bytes mapped across all address spaces
    pub mapped_bytes: usize,
}

#[derive(Debug, Default)]
struct SimState {
    next_id: u64,
    spaces: HashMap<u64, usize>,
    stacks: usize,
    files: usize,
    inodes: usize,
    installed: HashMap<CpuId, Option<u64>>,
    fail_kstack: bool,
    fail_uvm_copy: bool,
    fail_uvm_alloc: bool,
    /// Largest image a single address space may grow to
    memory_limit: Option<usize>,
}

impl SimState {
    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Simulated virtual memory, stacks and file layer
#[derive(Debug, Default)]
pub struct SimPlatform {
    state: Mutex<SimState>,
}

impl SimPlatform {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every kernel stack allocation fail
    pub fn fail_kstack(&self, fail: bool) {
        self.state.lock().fail_kstack = fail;
    }

    /// Make every address-space copy fail
    pub fn fail_uvm_copy(&self, fail: bool) {
        self.state.lock().fail_uvm_copy = fail;
    }

    /// Make every address-space growth fail
    pub fn fail_uvm_alloc(&self, fail: bool) {
        self.state.lock().fail_uvm_alloc = fail;
    }

    /// Cap the size any address space may grow to
    pub fn set_memory_limit(&self, limit: Option<usize>) {
        self.state.lock().memory_limit = limit;
    }

    #[must_use]
    pub fn stats(&self) -> SimStats {
        let state = self.state.lock();
        SimStats {
            address_spaces: state.spaces.len(),
            kernel_stacks: state.stacks,
            file_refs: state.files,
            inode_refs: state.inodes,
            mapped_bytes: state.spaces.values().sum(),
        }
    }

    /// Address space currently installed on `cpu`
    #[must_use]
    pub fn installed(&self, cpu: CpuId) -> Option<u64> {
        self.state.lock().installed.get(&cpu).copied().flatten()
    }
}

impl VirtualMemory for SimPlatform {
    fn setup_uvm(&self) -> ProcessResult<AddressSpace> {
        let mut state = self.state.lock();
        let id = state.next();
        state.spaces.insert(id, 0);
        Ok(AddressSpace::new(id))
    }

    fn copy_uvm(&self, space: &AddressSpace, size: usize) -> ProcessResult<AddressSpace> {
        let mut state = self.state.lock();
        if state.fail_uvm_copy {
            return Err(ProcessError::AddressSpaceExhausted);
        }
        let id = state.next();
        state.spaces.insert(id, size);
        trace!(from = space.id(), to = id, size, "copied address space");
        Ok(AddressSpace::new(id))
    }

    fn alloc_uvm(&self, space: &AddressSpace, _old: usize, new: usize) -> ProcessResult<usize> {
        let mut state = self.state.lock();
        if state.fail_uvm_alloc || state.memory_limit.is_some_and(|limit| new > limit) {
            return Err(ProcessError::AddressSpaceExhausted);
        }
        state.spaces.insert(space.id(), new);
        Ok(new)
    }

    fn dealloc_uvm(&self, space: &AddressSpace, _old: usize, new: usize) -> usize {
        self.state.lock().spaces.insert(space.id(), new);
        new
    }

    fn free_uvm(&self, space: AddressSpace) {
        self.state.lock().spaces.remove(&space.id());
    }

    fn switch_uvm(&self, cpu: CpuId, space: Option<&AddressSpace>) {
        self.state
            .lock()
            .installed
            .insert(cpu, space.map(AddressSpace::id));
    }

    fn switch_kvm(&self, cpu: CpuId) {
        self.state.lock().installed.insert(cpu, None);
    }
}

impl KernelStacks for SimPlatform {
    fn alloc_kstack(&self) -> ProcessResult<KernelStack> {
        let mut state = self.state.lock();
        if state.fail_kstack {
            return Err(ProcessError::KernelStackExhausted);
        }
        state.stacks += 1;
        Ok(KernelStack::new(state.next()))
    }

    fn free_kstack(&self, _stack: KernelStack) {
        let mut state = self.state.lock();
        state.stacks = state.stacks.saturating_sub(1);
    }
}

impl FileSystem for SimPlatform {
    fn open_console(&self) -> ProcessResult<FileRef> {
        let mut state = self.state.lock();
        state.files += 1;
        Ok(FileRef::new(state.next()))
    }

    fn file_dup(&self, file: &FileRef) -> FileRef {
        self.state.lock().files += 1;
        FileRef::new(file.id())
    }

    fn file_close(&self, _file: FileRef) {
        let mut state = self.state.lock();
        state.files = state.files.saturating_sub(1);
    }

    fn namei(&self, path: &str) -> Option<InodeRef> {
        if !path.starts_with('/') {
            return None;
        }
        let mut state = self.state.lock();
        state.inodes += 1;
        Some(InodeRef::new(state.next()))
    }

    fn idup(&self, inode: &InodeRef) -> InodeRef {
        self.state.lock().inodes += 1;
        InodeRef::new(inode.id())
    }

    fn iput(&self, _inode: InodeRef) {
        let mut state = self.state.lock();
        state.inodes = state.inodes.saturating_sub(1);
    }
}

impl UserTraps for SimPlatform {
    fn init_user_frame(&self, frame: &mut TrapFrame, size: usize) {
        *frame = TrapFrame {
            ret: 0,
            pc: 0,
            sp: size,
            interrupts: true,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tracks_live_handles() {
        let platform = SimPlatform::new();
        let space = platform.setup_uvm().unwrap();
        let copy = platform.copy_uvm(&space, 4096).unwrap();
        let stack = platform.alloc_kstack().unwrap();
        let file = platform.open_console().unwrap();
        let dup = platform.file_dup(&file);

        assert_eq!(
            platform.stats(),
            SimStats {
                address_spaces: 2,
                kernel_stacks: 1,
                file_refs: 2,
                inode_refs: 0,
                mapped_bytes: 4096,
            }
        );

        platform.free_uvm(copy);
        platform.free_uvm(space);
        platform.free_kstack(stack);
        platform.file_close(dup);
        platform.file_close(file);
        assert_eq!(platform.stats(), SimStats::default());
    }

    #[test]
    fn test_injected_failures() {
        let platform = SimPlatform::new();
        let space = platform.setup_uvm().unwrap();

        platform.fail_kstack(true);
        assert_eq!(
            platform.alloc_kstack(),
            Err(ProcessError::KernelStackExhausted)
        );

        platform.fail_uvm_copy(true);
        assert_eq!(
            platform.copy_uvm(&space, 0),
            Err(ProcessError::AddressSpaceExhausted)
        );

        platform.set_memory_limit(Some(8192));
        assert_eq!(platform.alloc_uvm(&space, 0, 4096), Ok(4096));
        assert!(platform.alloc_uvm(&space, 4096, 16384).is_err());
    }

    #[test]
    fn test_switch_tracks_installed_space() {
        let platform = SimPlatform::new();
        let space = platform.setup_uvm().unwrap();
        platform.switch_uvm(1, Some(&space));
        assert_eq!(platform.installed(1), Some(space.id()));
        platform.switch_kvm(1);
        assert_eq!(platform.installed(1), None);
    }
}
