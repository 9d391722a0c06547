/*!
 * Process Lifecycle Tests
 * fork, exit, wait, kill and orphan handling on a booted kernel
 */

mod common;

use common::{await_halt, boot, tick_until, TIMEOUT};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use teachos_kernel::{Kernel, ProcState, ProcessError, SimPlatform};

#[test]
fn test_fork_then_wait_reaps_the_child() {
    let (tx, rx) = flume::unbounded();
    let kernel = boot(Kernel::builder().with_cpus(2), move |main| {
        let forked = main.fork(|_| {});
        let reaped = main.wait().map(|r| r.pid);
        let again = main.wait().map(|r| r.pid);
        let _ = tx.send((forked, reaped, again));
    });

    let (forked, reaped, again) = rx.recv_timeout(TIMEOUT).expect("main reports");
    let child = forked.expect("fork succeeds");
    assert_eq!(child, 3);
    assert_eq!(reaped, Ok(child));
    assert_eq!(again, Err(ProcessError::NoChildren));
    kernel.shutdown();
}

#[test]
fn test_pids_are_unique_and_increasing() {
    let (tx, rx) = flume::unbounded();
    let kernel = boot(Kernel::builder(), move |main| {
        let mut pids = Vec::new();
        for _ in 0..4 {
            if let Ok(pid) = main.fork(|_| {}) {
                pids.push(pid);
            }
            let _ = main.wait();
        }
        let _ = tx.send((main.pid(), pids));
    });

    let (main_pid, pids) = rx.recv_timeout(TIMEOUT).expect("main reports");
    assert_eq!(main_pid, 2);
    assert_eq!(pids, vec![3, 4, 5, 6]);
    kernel.shutdown();
}

#[test]
fn test_child_sees_zero_and_parent_sees_child_pid() {
    let (tx, rx) = flume::unbounded();
    let (child_tx, child_rx) = flume::unbounded();
    let kernel = boot(Kernel::builder(), move |main| {
        let pid = main.sys_fork(move |child| {
            let _ = child_tx.send((child.trap_frame().ret, child.name()));
        });
        let _ = tx.send((pid, main.trap_frame().ret));
    });

    let (pid, parent_ret) = rx.recv_timeout(TIMEOUT).expect("parent reports");
    assert!(pid > 0);
    assert_eq!(parent_ret, pid);
    let (child_ret, name) = child_rx.recv_timeout(TIMEOUT).expect("child reports");
    assert_eq!(child_ret, 0);
    assert_eq!(name, "initcode");
    kernel.shutdown();
}

#[test]
fn test_wait_without_children_fails_immediately() {
    let (tx, rx) = flume::unbounded();
    let kernel = boot(Kernel::builder(), move |main| {
        let (mut burst, mut turnaround, mut waiting) = (-7, -7, -7);
        let ret = main.sys_wait(&mut burst, &mut turnaround, &mut waiting);
        let _ = tx.send((ret, burst, turnaround, waiting));
    });

    assert_eq!(rx.recv_timeout(TIMEOUT), Ok((-1, -7, -7, -7)));
    kernel.shutdown();
}

#[test]
fn test_orphans_are_reparented_to_init_and_reaped() {
    let (grandchild_tx, grandchild_rx) = flume::unbounded();
    let (parent_tx, parent_rx) = flume::unbounded();
    let kernel = boot(Kernel::builder().with_cpus(2), move |main| {
        let _ = main.fork(move |child| {
            let grandchild = child.fork(move |grandchild| {
                let _ = grandchild.sleep_ticks(3);
                let _ = parent_tx.send(grandchild.parent_pid());
            });
            let _ = grandchild_tx.send(grandchild);
        });
        let _ = main.wait();
        let _ = main.sleep_ticks(1_000_000);
    });

    let grandchild = grandchild_rx
        .recv_timeout(TIMEOUT)
        .expect("child reports")
        .expect("grandchild forked");

    assert!(kernel.wait_until(TIMEOUT, |procs| {
        procs
            .iter()
            .any(|p| p.pid == grandchild && p.parent == Some(1))
    }));

    let parent = tick_until(&kernel, || parent_rx.try_recv().ok());
    assert_eq!(parent, Some(1));

    assert!(kernel.wait_until(TIMEOUT, |procs| procs.iter().all(|p| p.pid != grandchild)));
    kernel.shutdown();
}

#[test]
fn test_kill_wakes_a_sleeping_process() {
    let (forked_tx, forked_rx) = flume::unbounded();
    let (slept_tx, slept_rx) = flume::unbounded();
    let (reaped_tx, reaped_rx) = flume::unbounded();
    let kernel = boot(Kernel::builder().with_cpus(1), move |main| {
        let forked = main.fork(move |child| {
            let slept = child.sleep_ticks(1_000);
            let _ = slept_tx.send((slept, child.killed()));
        });
        let _ = forked_tx.send(forked);
        let _ = reaped_tx.send(main.wait().map(|r| r.pid));
    });

    let child = forked_rx
        .recv_timeout(TIMEOUT)
        .expect("main reports")
        .expect("fork succeeds");
    assert!(kernel.wait_until(TIMEOUT, |procs| {
        procs
            .iter()
            .any(|p| p.pid == child && p.state == ProcState::Sleeping)
    }));

    assert_eq!(kernel.kill(child), Ok(()));
    let (slept, killed) = slept_rx.recv_timeout(TIMEOUT).expect("child wakes");
    assert_eq!(slept, Err(ProcessError::Killed(child)));
    assert!(killed);
    assert_eq!(reaped_rx.recv_timeout(TIMEOUT), Ok(Ok(child)));
    kernel.shutdown();
}

#[test]
fn test_killed_process_never_returns_from_a_syscall() {
    let (forked_tx, forked_rx) = flume::unbounded();
    let (after_tx, after_rx) = flume::unbounded::<i32>();
    let (reaped_tx, reaped_rx) = flume::unbounded();
    let kernel = boot(Kernel::builder().with_cpus(1), move |main| {
        let forked = main.fork(move |child| {
            let ret = child.sys_sleep(1_000);
            let _ = after_tx.send(ret);
        });
        let _ = forked_tx.send(forked);
        let _ = reaped_tx.send(main.wait().map(|r| r.pid));
    });

    let child = forked_rx
        .recv_timeout(TIMEOUT)
        .expect("main reports")
        .expect("fork succeeds");
    assert!(kernel.wait_until(TIMEOUT, |procs| {
        procs
            .iter()
            .any(|p| p.pid == child && p.state == ProcState::Sleeping)
    }));

    assert_eq!(kernel.kill(child), Ok(()));
    assert_eq!(reaped_rx.recv_timeout(TIMEOUT), Ok(Ok(child)));
    // The entry closure was dropped without sending.
    assert_eq!(
        after_rx.recv_timeout(TIMEOUT),
        Err(flume::RecvTimeoutError::Disconnected)
    );
    kernel.shutdown();
}

#[test]
fn test_kill_unknown_pid_fails() {
    let (tx, rx) = flume::unbounded();
    let kernel = boot(Kernel::builder(), move |main| {
        let _ = tx.send((main.sys_kill(999), main.sys_kill(-3)));
    });

    assert_eq!(rx.recv_timeout(TIMEOUT), Ok((-1, -1)));
    assert_eq!(kernel.kill(999), Err(ProcessError::NotFound(999)));
    kernel.shutdown();
}

#[test]
fn test_failed_fork_releases_everything() {
    let platform = Arc::new(SimPlatform::new());
    let sim = Arc::clone(&platform);
    let (tx, rx) = flume::unbounded();
    let kernel = boot(
        Kernel::builder().with_platform(platform.clone()),
        move |main| {
            let before = sim.stats();

            sim.fail_uvm_copy(true);
            let copy = main.fork(|_| {});
            sim.fail_uvm_copy(false);

            sim.fail_kstack(true);
            let stack = main.fork(|_| {});
            let raw = main.sys_fork(|_| {});
            sim.fail_kstack(false);

            let _ = tx.send((before, sim.stats(), copy, stack, raw, main.children()));
        },
    );

    let (before, after, copy, stack, raw, children) =
        rx.recv_timeout(TIMEOUT).expect("main reports");
    assert_eq!(copy, Err(ProcessError::AddressSpaceExhausted));
    assert_eq!(stack, Err(ProcessError::KernelStackExhausted));
    assert_eq!(raw, -1);
    assert_eq!(after, before);
    assert!(children.is_empty());

    // Once main is reaped only the root's resources remain.
    assert!(kernel.wait_until(TIMEOUT, |procs| procs.len() == 1));
    let stats = platform.stats();
    assert_eq!(stats.address_spaces, 1);
    assert_eq!(stats.kernel_stacks, 1);
    assert_eq!(stats.file_refs, 3);
    assert_eq!(stats.inode_refs, 1);
    kernel.shutdown();
}

#[test]
fn test_full_table_rejects_fork() {
    let (tx, rx) = flume::unbounded();
    let kernel = boot(Kernel::builder().with_nproc(3), move |main| {
        let sleeper = main.fork(|child| {
            let _ = child.sleep_ticks(1_000_000);
        });
        let full = main.fork(|_| {});
        let raw = main.sys_fork(|_| {});
        if let Ok(pid) = sleeper {
            let _ = main.kill(pid);
        }
        let reaped = main.wait().map(|r| r.pid);
        let _ = tx.send((sleeper, full, raw, reaped));
    });

    let (sleeper, full, raw, reaped) = rx.recv_timeout(TIMEOUT).expect("main reports");
    let sleeper = sleeper.expect("third slot is free");
    assert_eq!(full, Err(ProcessError::TableFull { capacity: 3 }));
    assert_eq!(raw, -1);
    assert_eq!(reaped, Ok(sleeper));
    kernel.shutdown();
}

#[test]
fn test_sbrk_grows_and_shrinks() {
    let platform = Arc::new(SimPlatform::new());
    let sim = Arc::clone(&platform);
    let (tx, rx) = flume::unbounded();
    let kernel = boot(
        Kernel::builder().with_platform(platform.clone()),
        move |main| {
            let start = main.size() as i32;
            let grown = main.sys_sbrk(8192);
            let shrunk = main.sys_sbrk(-4096);
            let too_small = main.sys_sbrk(-1_000_000);
            sim.set_memory_limit(Some(16 * 1024));
            let too_big = main.sys_sbrk(1 << 20);
            let _ = tx.send((start, grown, shrunk, too_small, too_big, main.size()));
        },
    );

    let (start, grown, shrunk, too_small, too_big, size) =
        rx.recv_timeout(TIMEOUT).expect("main reports");
    assert_eq!(start, 4096);
    assert_eq!(grown, 4096);
    assert_eq!(shrunk, 4096 + 8192);
    assert_eq!(too_small, -1);
    assert_eq!(too_big, -1);
    assert_eq!(size, 8192);
    kernel.shutdown();
}

#[test]
fn test_killing_init_halts_the_kernel() {
    let (tx, rx) = flume::unbounded();
    let kernel = boot(Kernel::builder().with_cpus(2), move |main| {
        let _ = tx.send(main.pid());
        let _ = main.sleep_ticks(1_000_000);
    });

    assert_eq!(rx.recv_timeout(TIMEOUT), Ok(2));
    assert!(kernel.wait_until(TIMEOUT, |procs| {
        procs
            .iter()
            .any(|p| p.pid == 1 && p.state == ProcState::Sleeping)
    }));
    assert_eq!(kernel.kill(1), Ok(()));
    assert_eq!(await_halt(&kernel).as_deref(), Some("init exiting"));
    kernel.shutdown();
}
