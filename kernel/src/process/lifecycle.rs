/*!
 * Process Lifecycle
 *
 * allocate → user_init / fork → exit → wait (reap), plus kill and memory
 * growth. Each process is backed by a host thread spawned at allocation; the
 * thread parks until a CPU dispatches the slot for the first time.
 */

use super::current::{CurrentProc, ProcEntry};
use super::table::{ProcTable, TableGuard};
use super::traits::FileRef;
use super::types::{Channel, ProcState, Reaped, TrapFrame};
use crate::core::errors::{ProcessError, ProcessResult};
use crate::core::limits::{INIT_NAME, NOFILE, PGSIZE, PROC_THREAD_STACK, STDIO_FDS};
use crate::core::types::{Pid, SlotId};
use crate::kernel::{unwind, KernelShared, Unwound};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::{mem, thread};
use tracing::{debug, error, info, warn};

/// Which children `wait` is prepared to block for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitFor {
    /// Existing children only; no children is an error
    Children,
    /// Keep sleeping even with no children, for orphans reparented later
    Orphans,
}

impl KernelShared {
    /// Claim a slot, give it a kernel stack and a parked host thread
    ///
    /// The slot is left as an embryo; the caller finishes building it and
    /// makes it runnable.
    pub(crate) fn allocate(self: &Arc<Self>, entry: ProcEntry) -> ProcessResult<SlotId> {
        let (slot, pid) = {
            let mut guard = self.ptable.lock();
            let capacity = guard.capacity();
            let slot = guard
                .claim()
                .ok_or(ProcessError::TableFull { capacity })?;
            (slot, guard.at(slot.index).pid)
        };

        let stack = match self.platform.alloc_kstack() {
            Ok(stack) => stack,
            Err(err) => {
                warn!(pid, error = %err, "kernel stack allocation failed");
                self.ptable.lock().clear(slot.index);
                return Err(err);
            }
        };
        self.ptable.lock().at_mut(slot.index).kstack = Some(stack);

        let shared = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(format!("proc-{pid}"))
            .stack_size(PROC_THREAD_STACK)
            .spawn(move || shared.proc_main(slot, entry));

        if let Err(err) = spawned {
            warn!(pid, error = %err, "failed to spawn process thread");
            let mut guard = self.ptable.lock();
            self.release(&mut guard, slot.index);
            return Err(ProcessError::KernelStackExhausted);
        }

        debug!(pid, slot = %slot, "allocated process");
        Ok(slot)
    }

    /// Body of every process thread
    fn proc_main(self: Arc<Self>, slot: SlotId, entry: ProcEntry) {
        let current = CurrentProc::new(Arc::clone(&self), slot);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            // First dispatch: the lock comes back from the scheduler and is
            // released before the process body runs.
            let mut guard = self.ptable.lock();
            self.await_resume(&mut guard, slot);
            drop(guard);

            entry(&current);
            current.exit();
        }));

        let Err(payload) = outcome else {
            return;
        };
        if payload.is::<Unwound>() || self.is_halted() {
            return;
        }

        error!(
            slot = %slot,
            message = panic_message(payload.as_ref()),
            "process panicked, exiting it"
        );
        let _ = panic::catch_unwind(AssertUnwindSafe(|| current.exit()));
    }

    /// Create the root process
    pub(crate) fn user_init(self: &Arc<Self>, entry: ProcEntry) -> ProcessResult<SlotId> {
        let slot = self.allocate(entry)?;

        let space = match self.platform.setup_uvm() {
            Ok(space) => space,
            Err(err) => {
                error!(error = %err, "userinit: out of memory?");
                let mut guard = self.ptable.lock();
                self.release(&mut guard, slot.index);
                return Err(err);
            }
        };

        let mut frame = TrapFrame::default();
        self.platform.init_user_frame(&mut frame, PGSIZE);
        let cwd = self.platform.namei("/");

        let mut guard = self.ptable.lock();
        let p = guard.at_mut(slot.index);
        p.space = Some(space);
        p.size = PGSIZE;
        p.trap_frame = frame;
        p.set_name(INIT_NAME);
        p.cwd = cwd;
        for fd in 0..STDIO_FDS {
            match self.platform.open_console() {
                Ok(file) => guard.at_mut(slot.index).files[fd] = Some(file),
                Err(err) => {
                    error!(error = %err, "userinit: cannot open console");
                    self.release(&mut guard, slot.index);
                    return Err(err);
                }
            }
        }
        let pid = guard.at(slot.index).pid;

        if self.init.set(slot).is_err() {
            drop(guard);
            self.fatal("userinit: root process already exists");
        }
        guard.set_state(slot.index, ProcState::Runnable);
        drop(guard);
        self.idle.notify_all();

        info!(pid, name = INIT_NAME, "root process created");
        Ok(slot)
    }

    /// Duplicate `parent` into a new runnable child that resumes into `entry`
    pub(crate) fn fork(self: &Arc<Self>, parent: SlotId, entry: ProcEntry) -> ProcessResult<Pid> {
        let child = self.allocate(entry)?;
        let mut guard = self.ptable.lock();

        let copied = {
            let p = guard.at(parent.index);
            match p.space.as_ref() {
                Some(space) => self.platform.copy_uvm(space, p.size),
                None => Err(ProcessError::AddressSpaceExhausted),
            }
        };
        let space = match copied {
            Ok(space) => space,
            Err(err) => {
                warn!(parent = %parent, error = %err, "fork: address space copy failed");
                self.release(&mut guard, child.index);
                return Err(err);
            }
        };

        let (size, frame, name, files, cwd) = {
            let p = guard.at(parent.index);
            let files: [Option<FileRef>; NOFILE] = std::array::from_fn(|fd| {
                p.files[fd].as_ref().map(|file| self.platform.file_dup(file))
            });
            (
                p.size,
                p.trap_frame,
                p.name.clone(),
                files,
                p.cwd.as_ref().map(|inode| self.platform.idup(inode)),
            )
        };

        let c = guard.at_mut(child.index);
        c.space = Some(space);
        c.size = size;
        c.trap_frame = TrapFrame { ret: 0, ..frame };
        c.set_name(&name);
        c.files = files;
        c.cwd = cwd;
        c.parent = Some(parent);
        let pid = c.pid;
        guard.set_state(child.index, ProcState::Runnable);
        drop(guard);
        self.idle.notify_all();

        debug!(parent = %parent, child = pid, "fork");
        Ok(pid)
    }

    /// Terminate the calling process; never returns
    pub(crate) fn exit_current(&self, slot: SlotId) -> ! {
        if self.is_halted() {
            unwind();
        }
        if self.init.get() == Some(&slot) {
            self.fatal("init exiting");
        }

        let (files, cwd) = {
            let mut guard = self.ptable.lock();
            let p = guard.at_mut(slot.index);
            (mem::take(&mut p.files), p.cwd.take())
        };
        for file in files.into_iter().flatten() {
            self.platform.file_close(file);
        }
        if let Some(cwd) = cwd {
            self.platform.iput(cwd);
        }

        let mut guard = self.ptable.lock();

        // Parent might be sleeping in wait().
        let parent = guard.at(slot.index).parent;
        if let Some(parent) = parent {
            self.wakeup_locked(&mut guard, Channel::Proc(parent));
        }

        let init = self.init.get().copied();
        let mut orphaned_zombie = false;
        for index in 0..guard.capacity() {
            let p = guard.at_mut(index);
            if p.parent == Some(slot) {
                p.parent = init;
                orphaned_zombie |= p.state() == ProcState::Zombie;
            }
        }
        if let (true, Some(init)) = (orphaned_zombie, init) {
            self.wakeup_locked(&mut guard, Channel::Proc(init));
        }

        let now = guard.now();
        let p = guard.at_mut(slot.index);
        p.times.termination = now;
        let pid = p.pid;
        guard.set_state(slot.index, ProcState::Zombie);
        debug!(pid, "exit");

        self.switch_out(&mut guard, slot);
        drop(guard);
        unwind()
    }

    /// Reap one zombie child of `slot`, sleeping until one exists
    pub(crate) fn wait(&self, slot: SlotId, mode: WaitFor) -> ProcessResult<Reaped> {
        let mut guard = self.ptable.lock();
        loop {
            let mut have_kids = false;
            let mut zombie = None;
            for (index, p) in guard.iter() {
                if p.parent != Some(slot) || p.is_unused() {
                    continue;
                }
                have_kids = true;
                if p.state() == ProcState::Zombie {
                    zombie = Some(index);
                    break;
                }
            }

            if let Some(index) = zombie {
                let reaped = self.reap(&mut guard, index);
                debug!(pid = reaped.pid, "reaped");
                return Ok(reaped);
            }

            let me = guard.at(slot.index);
            if me.killed {
                return Err(ProcessError::Killed(me.pid));
            }
            if !have_kids && mode == WaitFor::Children {
                return Err(ProcessError::NoChildren);
            }

            self.sleep_locked(&mut guard, slot, Channel::Proc(slot));
        }
    }

    /// Release a zombie's resources and clear its slot
    fn reap(&self, table: &mut ProcTable, index: usize) -> Reaped {
        let sched = table.sched;
        let p = table.at(index);
        let reaped = Reaped {
            pid: p.pid,
            priority: p.priority,
            queue: p.queue,
            times: p.times,
            sched,
        };
        self.release(table, index);
        reaped
    }

    /// Free every collaborator handle a slot still owns and clear it
    fn release(&self, table: &mut ProcTable, index: usize) {
        let p = table.at_mut(index);
        let stack = p.kstack.take();
        let space = p.space.take();
        let files = mem::take(&mut p.files);
        let cwd = p.cwd.take();

        if let Some(stack) = stack {
            self.platform.free_kstack(stack);
        }
        if let Some(space) = space {
            self.platform.free_uvm(space);
        }
        for file in files.into_iter().flatten() {
            self.platform.file_close(file);
        }
        if let Some(cwd) = cwd {
            self.platform.iput(cwd);
        }

        table.clear(index);
        // A thread still parked on this slot sees the new generation and retires.
        self.resume[index].notify_all();
    }

    /// Mark `pid` killed; a sleeping target is made runnable to notice it
    pub(crate) fn kill(&self, pid: Pid) -> ProcessResult<()> {
        let mut guard = self.ptable.lock();
        let slot = guard.find_pid(pid).ok_or(ProcessError::NotFound(pid))?;
        guard.at_mut(slot.index).killed = true;
        if guard.at(slot.index).state() == ProcState::Sleeping {
            guard.set_state(slot.index, ProcState::Runnable);
            self.idle.notify_all();
        }
        info!(pid, "killed");
        Ok(())
    }

    /// Grow or shrink the caller's image by `n` bytes; returns the old size
    pub(crate) fn grow(&self, slot: SlotId, n: isize) -> ProcessResult<usize> {
        let mut guard: TableGuard<'_> = self.ptable.lock();
        let p = guard.at_mut(slot.index);
        let old = p.size;
        let space = p
            .space
            .as_ref()
            .ok_or(ProcessError::AddressSpaceExhausted)?;

        let size = match n.cmp(&0) {
            std::cmp::Ordering::Greater => {
                let new = old
                    .checked_add(n.unsigned_abs())
                    .ok_or(ProcessError::AddressSpaceExhausted)?;
                self.platform.alloc_uvm(space, old, new)?
            }
            std::cmp::Ordering::Less => {
                let new = old.checked_sub(n.unsigned_abs()).ok_or_else(|| {
                    ProcessError::InvalidArgument(format!("cannot shrink {old} bytes by {}", n.unsigned_abs()))
                })?;
                self.platform.dealloc_uvm(space, old, new)
            }
            std::cmp::Ordering::Equal => old,
        };

        p.size = size;
        let cpu = p.context.cpu;
        if let Some(cpu) = cpu {
            let space = guard.at(slot.index).space.as_ref();
            self.platform.switch_uvm(cpu, space);
        }
        Ok(old)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic>")
}
