/*!
 * Kernel Builder
 * Assemble a kernel from a config and a platform
 */

use super::handle::Kernel;
use super::KernelShared;
use crate::core::config::KernelConfig;
use crate::core::errors::KernelResult;
use crate::process::{Platform, SimPlatform};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Builder for Kernel
pub struct KernelBuilder {
    config: KernelConfig,
    platform: Option<Arc<dyn Platform>>,
}

impl KernelBuilder {
    pub fn new() -> Self {
        Self {
            config: KernelConfig::default(),
            platform: None,
        }
    }

    /// Start from a complete configuration
    pub fn with_config(mut self, config: KernelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cpus(mut self, cpus: usize) -> Self {
        self.config.cpus = cpus;
        self
    }

    /// Process table capacity
    pub fn with_nproc(mut self, nproc: usize) -> Self {
        self.config.nproc = nproc;
        self
    }

    pub fn with_quantum(mut self, quantum: u32) -> Self {
        self.config.quantum = quantum;
        self
    }

    /// Initial flat policy (raw value, snapped like `changePolicy`)
    pub fn with_policy(mut self, policy: i32) -> Self {
        self.config.policy = policy;
        self
    }

    /// Initial feedback mode (raw value, snapped like `changeFeedbackMode`)
    pub fn with_feedback_mode(mut self, mode: i32) -> Self {
        self.config.feedback_mode = mode;
        self
    }

    /// Drive the timer from a built-in thread with this period
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.config.tick_interval_ms = Some(interval.as_millis().max(1) as u64);
        self
    }

    /// Collaborators for memory, stacks and files; defaults to `SimPlatform`
    pub fn with_platform(mut self, platform: Arc<dyn Platform>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Validate the configuration and build an unbooted kernel
    pub fn build(self) -> KernelResult<Kernel> {
        self.config.validate()?;
        let platform = self
            .platform
            .unwrap_or_else(|| Arc::new(SimPlatform::new()));

        info!(
            cpus = self.config.cpus,
            nproc = self.config.nproc,
            quantum = self.config.quantum,
            policy = self.config.policy,
            feedback_mode = self.config.feedback_mode,
            "kernel configured"
        );

        Ok(Kernel::new(Arc::new(KernelShared::new(self.config, platform))))
    }
}

impl Default for KernelBuilder {
    fn default() -> Self {
        Self::new()
    }
}
