/*!
 * Kernel Handle
 *
 * Owns the CPU and timer threads of a booted kernel and exposes the
 * operations the host drives from outside any process: ticks, kills,
 * configuration, dumps and shutdown.
 */

use super::builder::KernelBuilder;
use super::KernelShared;
use crate::core::config::KernelConfig;
use crate::core::errors::{KernelError, KernelResult, ProcessResult};
use crate::core::limits::DUMP_LOCK_TIMEOUT;
use crate::core::types::{Pid, Ticks};
use crate::process::{Channel, CurrentProc, ProcEntry, ProcInfo, ProcState};
use crate::scheduler::{FeedbackMode, Policy, SchedConfig};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

struct Timer {
    stop: flume::Sender<()>,
    handle: JoinHandle<()>,
}

/// A process-table and scheduling core running on host threads
pub struct Kernel {
    shared: Arc<KernelShared>,
    cpus: Vec<JoinHandle<()>>,
    timer: Option<Timer>,
    booted: bool,
}

impl Kernel {
    pub(super) fn new(shared: Arc<KernelShared>) -> Self {
        Self {
            shared,
            cpus: Vec::new(),
            timer: None,
            booted: false,
        }
    }

    /// Create a new kernel builder
    pub fn builder() -> KernelBuilder {
        KernelBuilder::new()
    }

    #[must_use]
    pub fn config(&self) -> &KernelConfig {
        &self.shared.config
    }

    /// Create the root process and start every CPU
    ///
    /// The root process forks `main` as its first child and then reaps
    /// children and orphans for as long as the kernel runs.
    pub fn boot<F>(&mut self, main: F) -> KernelResult<()>
    where
        F: FnOnce(&CurrentProc) + Send + 'static,
    {
        if self.booted {
            return Err(KernelError::AlreadyBooted);
        }

        let init: ProcEntry = Box::new(move |init: &CurrentProc| {
            if let Err(err) = init.fork(main) {
                error!(error = %err, "failed to start the main process");
            }
            init.reap_orphans();
        });
        self.shared.user_init(init)?;
        self.booted = true;

        for cpu in 0..self.shared.config.cpus {
            let shared = Arc::clone(&self.shared);
            let spawned = thread::Builder::new()
                .name(format!("cpu-{cpu}"))
                .spawn(move || shared.scheduler(cpu));
            match spawned {
                Ok(handle) => self.cpus.push(handle),
                Err(source) => {
                    self.stop("cpu start failed");
                    return Err(KernelError::Spawn {
                        what: format!("cpu-{cpu}"),
                        source,
                    });
                }
            }
        }

        if let Some(interval) = self.shared.config.tick_interval() {
            let (stop, stopped) = flume::bounded::<()>(1);
            let shared = Arc::clone(&self.shared);
            let spawned = thread::Builder::new()
                .name("timer".into())
                .spawn(move || loop {
                    match stopped.recv_timeout(interval) {
                        Err(flume::RecvTimeoutError::Timeout) if !shared.is_halted() => {
                            shared.timer_interrupt();
                        }
                        _ => break,
                    }
                });
            match spawned {
                Ok(handle) => self.timer = Some(Timer { stop, handle }),
                Err(source) => {
                    self.stop("timer start failed");
                    return Err(KernelError::Spawn {
                        what: "timer".into(),
                        source,
                    });
                }
            }
        }

        info!(cpus = self.cpus.len(), timer = self.timer.is_some(), "kernel booted");
        Ok(())
    }

    /// Deliver one timer interrupt; returns the new tick count
    pub fn tick(&self) -> Ticks {
        self.shared.timer_interrupt()
    }

    /// Ticks since boot
    #[must_use]
    pub fn uptime(&self) -> Ticks {
        self.shared.uptime()
    }

    pub fn kill(&self, pid: Pid) -> ProcessResult<()> {
        self.shared.kill(pid)
    }

    /// Wake every process sleeping on `chan`
    pub fn wakeup(&self, chan: Channel) {
        self.shared.wakeup(chan);
    }

    #[must_use]
    pub fn sched_config(&self) -> SchedConfig {
        self.shared.ptable.lock().sched
    }

    /// Change the flat policy; out-of-range values snap to round robin
    pub fn set_policy(&self, raw: i32) -> Policy {
        self.shared.ptable.lock().sched.set_policy(raw)
    }

    /// Change the feedback mode; out-of-range values switch it off
    pub fn set_feedback_mode(&self, raw: i32) -> FeedbackMode {
        self.shared.ptable.lock().sched.set_feedback(raw)
    }

    /// Debug listing of every occupied slot: pid, state and name
    ///
    /// Pids and states come from the lock-free mirror. Names need the table
    /// lock; if it cannot be had quickly they are shown as `???`.
    #[must_use]
    pub fn procdump(&self) -> String {
        let names: Option<Vec<String>> = self
            .shared
            .ptable
            .try_lock_for(DUMP_LOCK_TIMEOUT)
            .map(|table| table.iter().map(|(_, p)| p.name.to_string()).collect());
        if names.is_none() {
            warn!("procdump: table lock busy, names omitted");
        }

        let mut out = String::new();
        for (index, slot) in self.shared.mirror.iter().enumerate() {
            let state = slot.state();
            if state == ProcState::Unused {
                continue;
            }
            let name = names
                .as_ref()
                .and_then(|names| names.get(index))
                .map_or("???", String::as_str);
            let _ = writeln!(out, "{} {} {}", slot.pid(), state.label(), name);
        }
        out
    }

    /// Consistent view of every occupied slot
    #[must_use]
    pub fn snapshot(&self) -> Vec<ProcInfo> {
        let table = self.shared.ptable.lock();
        table
            .iter()
            .filter(|(_, p)| !p.is_unused())
            .map(|(index, _)| table.info(index))
            .collect()
    }

    /// Number of occupied slots
    #[must_use]
    pub fn occupancy(&self) -> usize {
        self.shared.ptable.lock().occupancy()
    }

    /// Dispatch count of each CPU
    #[must_use]
    pub fn dispatches(&self) -> Vec<u64> {
        let table = self.shared.ptable.lock();
        table.cpus.iter().map(|cpu| cpu.dispatches).collect()
    }

    /// Poll snapshots until `done` holds or `timeout` passes
    pub fn wait_until(&self, timeout: Duration, done: impl Fn(&[ProcInfo]) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if done(&self.snapshot()) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Check the table's structural invariants under the lock
    ///
    /// Returns every violation found.
    pub fn check_invariants(&self) -> Result<(), Vec<String>> {
        let table = self.shared.ptable.lock();
        let mut violations = Vec::new();
        let mut pids = HashSet::new();

        if table.occupancy() > table.capacity() {
            violations.push(format!("occupancy {} exceeds capacity", table.occupancy()));
        }

        for (index, p) in table.iter() {
            let slot = table.slot_id(index);
            match p.state() {
                ProcState::Unused => {
                    if p.pid != 0 || p.kstack.is_some() || p.space.is_some() {
                        violations.push(format!("slot {index}: unused slot holds resources"));
                    }
                    continue;
                }
                ProcState::Running => {
                    let owner = p.context.cpu.map(|cpu| table.cpus[cpu].running());
                    if owner != Some(Some(slot)) {
                        violations.push(format!("pid {}: running without a cpu", p.pid));
                    }
                }
                ProcState::Sleeping if p.channel.is_none() => {
                    violations.push(format!("pid {}: sleeping without a channel", p.pid));
                }
                _ => {}
            }
            if !pids.insert(p.pid) {
                violations.push(format!("pid {} appears twice", p.pid));
            }
        }

        let mut running = HashSet::new();
        for (cpu, state) in table.cpus.iter().enumerate() {
            let Some(slot) = state.running() else {
                continue;
            };
            if !running.insert(slot) {
                violations.push(format!("cpu {cpu}: slot {slot} running on two cpus"));
            }
            if table.get(slot).map(|p| p.state()) != Some(ProcState::Running) {
                violations.push(format!("cpu {cpu}: current slot {slot} is not running"));
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    /// Stop the kernel: CPUs leave their loops and process threads retire
    pub fn halt(&self) {
        self.shared.halt("halt requested");
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.shared.is_halted()
    }

    /// Why the kernel halted, if it has
    #[must_use]
    pub fn halt_reason(&self) -> Option<String> {
        self.shared.halt_reason()
    }

    /// Halt and join the CPU and timer threads
    pub fn shutdown(mut self) {
        self.stop("shutdown");
    }

    fn stop(&mut self, reason: &str) {
        self.shared.halt(reason);
        if let Some(timer) = self.timer.take() {
            let _ = timer.stop.send(());
            let _ = timer.handle.join();
        }
        for handle in self.cpus.drain(..) {
            if handle.join().is_err() {
                warn!("cpu thread panicked");
            }
        }
    }
}

impl Drop for Kernel {
    fn drop(&mut self) {
        if self.booted {
            self.stop("kernel dropped");
        }
    }
}
