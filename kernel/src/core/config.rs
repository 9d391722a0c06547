/*!
 * Kernel Configuration
 *
 * Boot-time settings for the process table and the scheduler.
 * Loaded from defaults, a JSON document, or `KERNEL_*` environment variables.
 */

use crate::core::errors::{KernelError, KernelResult};
use crate::core::limits::{
    DEFAULT_IDLE_POLL, DEFAULT_NCPU, DEFAULT_NPROC, DEFAULT_QUANTUM, MAX_NCPU, MAX_NPROC,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Boot configuration
///
/// `policy` and `feedback_mode` are raw values; they go through the same
/// validated setters as the syscalls, so out-of-range values snap to 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct KernelConfig {
    /// Number of virtual CPUs (one dispatch loop each)
    pub cpus: usize,
    /// Process table capacity
    pub nproc: usize,
    /// Ticks per dispatch under quantum round robin
    pub quantum: u32,
    /// Initial flat scheduling policy (0..=3)
    pub policy: i32,
    /// Initial feedback-queue mode (0..=3, nonzero enables it)
    pub feedback_mode: i32,
    /// Period of the built-in timer thread; `None` means ticks are driven externally
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tick_interval_ms: Option<u64>,
    /// Idle and halt re-check interval
    pub idle_poll_ms: u64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            cpus: DEFAULT_NCPU,
            nproc: DEFAULT_NPROC,
            quantum: DEFAULT_QUANTUM,
            policy: 0,
            feedback_mode: 0,
            tick_interval_ms: None,
            idle_poll_ms: DEFAULT_IDLE_POLL.as_millis() as u64,
        }
    }
}

impl KernelConfig {
    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json(json: &str) -> KernelResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Build from `KERNEL_CPUS`, `KERNEL_NPROC`, `KERNEL_QUANTUM`,
    /// `KERNEL_POLICY`, `KERNEL_FEEDBACK` and `KERNEL_TICK_MS`
    pub fn from_env() -> KernelResult<Self> {
        let mut config = Self::default();

        if let Some(cpus) = env_number("KERNEL_CPUS")? {
            config.cpus = cpus;
        }
        if let Some(nproc) = env_number("KERNEL_NPROC")? {
            config.nproc = nproc;
        }
        if let Some(quantum) = env_number("KERNEL_QUANTUM")? {
            config.quantum = quantum;
        }
        if let Some(policy) = env_number("KERNEL_POLICY")? {
            config.policy = policy;
        }
        if let Some(mode) = env_number("KERNEL_FEEDBACK")? {
            config.feedback_mode = mode;
        }
        if let Some(tick) = env_number("KERNEL_TICK_MS")? {
            config.tick_interval_ms = Some(tick);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the kernel cannot boot with
    pub fn validate(&self) -> KernelResult<()> {
        if self.cpus == 0 || self.cpus > MAX_NCPU {
            return Err(KernelError::Config(format!(
                "cpus must be in 1..={MAX_NCPU}, got {}",
                self.cpus
            )));
        }
        if self.nproc == 0 || self.nproc > MAX_NPROC {
            return Err(KernelError::Config(format!(
                "nproc must be in 1..={MAX_NPROC}, got {}",
                self.nproc
            )));
        }
        if self.quantum == 0 {
            return Err(KernelError::Config("quantum must be at least one tick".into()));
        }
        if self.tick_interval_ms == Some(0) {
            return Err(KernelError::Config("tick_interval_ms must be positive".into()));
        }
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms.max(1))
    }

    #[inline]
    #[must_use]
    pub fn tick_interval(&self) -> Option<Duration> {
        self.tick_interval_ms.map(Duration::from_millis)
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> KernelResult<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| KernelError::Config(format!("{key} is not a number: {raw:?}"))),
        Err(_) => Ok(None),
    }
}
