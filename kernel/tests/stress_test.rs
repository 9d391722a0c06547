/*!
 * Stress Tests
 * Many short-lived processes on several CPUs with a live timer
 */

mod common;

use common::{boot, TIMEOUT};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::{Duration, Instant};
use teachos_kernel::{Kernel, SimPlatform};

const WAVES: usize = 5;
const PER_WAVE: usize = 8;
const NPROC: usize = 16;

#[test]
fn test_fork_storm_keeps_the_table_consistent() {
    let platform = Arc::new(SimPlatform::new());
    let (tx, rx) = flume::unbounded();
    let kernel = boot(
        Kernel::builder()
            .with_cpus(4)
            .with_nproc(NPROC)
            .with_policy(1)
            .with_quantum(2)
            .with_tick_interval(Duration::from_millis(1))
            .with_platform(platform.clone()),
        move |main| {
            let mut forked = 0;
            let mut reaped = 0;
            for wave in 0..WAVES {
                for n in 0..PER_WAVE {
                    let result = main.fork(move |child| {
                        child.sys_set_priority((n % 6) as i32 + 1);
                        for round in 0..10 {
                            child.checkpoint();
                            if round == n % 3 {
                                child.sys_sleep(1);
                            }
                        }
                        if n % 4 == 0 {
                            // Left behind for the root process to reap.
                            let _ = child.fork(|orphan| {
                                orphan.sys_sleep(2);
                            });
                        }
                    });
                    if result.is_ok() {
                        forked += 1;
                    }
                }
                while main.wait().is_ok() {
                    reaped += 1;
                }
                if wave == WAVES / 2 {
                    main.sys_change_policy(2);
                }
            }
            let _ = tx.send((forked, reaped));
        },
    );

    let deadline = Instant::now() + TIMEOUT;
    let (forked, reaped) = loop {
        if let Err(violations) = kernel.check_invariants() {
            panic!("invariants violated: {violations:?}");
        }
        assert!(kernel.occupancy() <= NPROC);
        if let Ok(done) = rx.try_recv() {
            break done;
        }
        assert!(Instant::now() < deadline, "workload did not finish");
        std::thread::sleep(Duration::from_millis(2));
    };

    assert!(forked > 0);
    assert_eq!(forked, reaped);

    // Main and every orphan are eventually reaped by the root process.
    assert!(kernel.wait_until(TIMEOUT, |procs| procs.len() == 1));
    assert_eq!(kernel.check_invariants(), Ok(()));
    let stats = platform.stats();
    assert_eq!(stats.kernel_stacks, 1);
    assert_eq!(stats.address_spaces, 1);
    assert!(kernel.dispatches().iter().sum::<u64>() > 0);
    kernel.shutdown();
}

#[test]
fn test_procdump_lists_every_live_process() {
    let (tx, rx) = flume::unbounded();
    let kernel = boot(Kernel::builder(), move |main| {
        let _ = tx.send(());
        let _ = main.sleep_ticks(1_000_000);
    });

    rx.recv_timeout(TIMEOUT).expect("main started");
    assert!(kernel.wait_until(TIMEOUT, |procs| {
        procs.len() == 2 && procs.iter().all(|p| p.state.label() == "sleep ")
    }));

    let dump = kernel.procdump();
    let lines: Vec<&str> = dump.lines().collect();
    assert_eq!(lines, vec!["1 sleep  initcode", "2 sleep  initcode"]);
    kernel.shutdown();
}
