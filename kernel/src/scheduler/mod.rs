/*!
 * Scheduler Module
 * Policy configuration, candidate selection and the per-CPU dispatch loop
 */

mod cpu;
pub mod policy;
pub mod select;

// Re-export public API
pub use cpu::CpuState;
pub use policy::{normalize_priority, normalize_queue, FeedbackMode, Policy, SchedConfig};
pub use select::{pick, select, Cursors, Pick, Rule, TIER_POLICIES};
