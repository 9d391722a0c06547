/*!
 * TeachOS Kernel - Demo Entry Point
 *
 * Boots the process core on host threads, runs a small workload of
 * prioritized workers under the configured policy, reports what `wait`
 * observed for each of them, then dumps the table and shuts down.
 */

use std::time::Duration;
use tracing::{info, warn};

use teachos_kernel::{init_tracing, CurrentProc, Kernel, KernelConfig};

/// Priorities given to the demo workers
const WORKER_PRIORITIES: [i32; 4] = [5, 2, 2, 6];

/// Work units each worker performs before exiting
const WORK_UNITS: u32 = 20;

#[derive(Debug, serde::Serialize)]
struct WorkerReport {
    identifier: i32,
    burst: i32,
    turnaround: i32,
    waiting: i32,
}

fn worker(current: &CurrentProc, priority: i32) {
    let effective = current.sys_set_priority(priority);
    info!(pid = current.sys_getpid(), priority = effective, "worker started");
    for unit in 0..WORK_UNITS {
        std::thread::sleep(Duration::from_millis(1));
        if unit % 5 == 4 {
            current.sys_sleep(1);
        } else {
            current.checkpoint();
        }
    }
}

fn workload(main: &CurrentProc, done: flume::Sender<Vec<WorkerReport>>) {
    info!(
        pid = main.sys_getpid(),
        policy = main.sys_change_policy(2),
        "main process running"
    );

    for priority in WORKER_PRIORITIES {
        if main.sys_fork(move |child| worker(child, priority)) < 0 {
            warn!(priority, "fork failed");
        }
    }
    info!(children = main.sys_get_children(), "workers forked");

    let mut reports = Vec::new();
    loop {
        let (mut burst, mut turnaround, mut waiting) = (0, 0, 0);
        let identifier = main.sys_wait(&mut burst, &mut turnaround, &mut waiting);
        if identifier < 0 {
            break;
        }
        reports.push(WorkerReport {
            identifier,
            burst,
            turnaround,
            waiting,
        });
    }

    let _ = done.send(reports);
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    init_tracing();

    info!("TeachOS kernel starting...");
    let mut config = KernelConfig::from_env()?;
    config.tick_interval_ms = config.tick_interval_ms.or(Some(5));

    let mut kernel = Kernel::builder().with_config(config).build()?;

    let (done_tx, done_rx) = flume::bounded(1);
    kernel.boot(move |main| workload(main, done_tx))?;
    info!("Press Ctrl+C to exit");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received interrupt, shutting down");
        }
        reports = done_rx.recv_async() => match reports {
            Ok(reports) => {
                for report in &reports {
                    info!(
                        identifier = report.identifier,
                        burst = report.burst,
                        turnaround = report.turnaround,
                        waiting = report.waiting,
                        "worker reaped"
                    );
                }
                match serde_json::to_string(&reports) {
                    Ok(json) => info!(%json, "workload finished"),
                    Err(e) => warn!(error = %e, "could not encode reports"),
                }
            }
            Err(_) => warn!("workload ended without reporting"),
        },
    }

    for line in kernel.procdump().lines() {
        info!("{line}");
    }
    info!(uptime = kernel.uptime(), dispatches = ?kernel.dispatches(), "kernel stopping");
    kernel.shutdown();

    // Let the subscriber flush before the runtime goes away.
    tokio::time::sleep(Duration::from_millis(10)).await;
    Ok(())
}
