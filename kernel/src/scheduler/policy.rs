/*!
 * Scheduling Policy
 *
 * Flat policies, the feedback-queue mode and the validated setters that are
 * the only way either of them changes. Out-of-range requests never fail:
 * they snap to a fixed default and the effective value is reported back.
 */

use crate::core::limits::{
    DEFAULT_QUEUE, MAX_PRIORITY, MAX_QUEUE, MIN_PRIORITY, MIN_QUEUE, RESET_PRIORITY,
};
use crate::core::types::{Priority, QueueNumber};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Flat scheduling policy
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Policy {
    /// First runnable process in scan order
    #[default]
    RoundRobin = 0,
    /// Round robin with a tick budget per dispatch
    Quantum = 1,
    /// Numerically lowest priority first
    Priority = 2,
    /// Numerically highest priority first
    ReversePriority = 3,
}

impl Policy {
    /// Decode a raw policy number; out-of-range values snap to round robin
    #[must_use]
    pub const fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::Quantum,
            2 => Self::Priority,
            3 => Self::ReversePriority,
            _ => Self::RoundRobin,
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self as i32
    }

    #[inline(always)]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RoundRobin => "round_robin",
            Self::Quantum => "quantum",
            Self::Priority => "priority",
            Self::ReversePriority => "reverse_priority",
        }
    }

    /// Selection compares priorities
    #[inline]
    #[must_use]
    pub const fn is_priority_based(self) -> bool {
        matches!(self, Self::Priority | Self::ReversePriority)
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Policy {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Policy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "round_robin" => Ok(Self::RoundRobin),
            "quantum" => Ok(Self::Quantum),
            "priority" => Ok(Self::Priority),
            "reverse_priority" => Ok(Self::ReversePriority),
            other => Err(serde::de::Error::custom(format!(
                "Invalid policy '{other}'. Valid: round_robin, quantum, priority, reverse_priority"
            ))),
        }
    }
}

/// Feedback-queue mode; any nonzero mode enables the four-tier layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedbackMode(u8);

impl FeedbackMode {
    pub const OFF: Self = Self(0);

    /// Decode a raw mode; out-of-range values snap to off
    #[must_use]
    pub const fn from_raw(raw: i32) -> Self {
        match raw {
            1..=3 => Self(raw as u8),
            _ => Self::OFF,
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self.0 as i32
    }

    #[inline]
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        self.0 != 0
    }
}

/// Scheduler configuration, stored in the process table under its lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchedConfig {
    pub policy: Policy,
    pub feedback: FeedbackMode,
}

impl SchedConfig {
    /// Build from raw values, snapping each one like the setters do
    #[must_use]
    pub const fn from_raw(policy: i32, feedback: i32) -> Self {
        Self {
            policy: Policy::from_raw(policy),
            feedback: FeedbackMode::from_raw(feedback),
        }
    }

    /// Change the flat policy; returns the effective value
    pub fn set_policy(&mut self, raw: i32) -> Policy {
        self.policy = Policy::from_raw(raw);
        self.policy
    }

    /// Change the feedback mode; returns the effective value
    pub fn set_feedback(&mut self, raw: i32) -> FeedbackMode {
        self.feedback = FeedbackMode::from_raw(raw);
        self.feedback
    }

    /// Reaping reports burst, turnaround and waiting times
    ///
    /// True for the quantum and priority policies and whenever the feedback
    /// layer is on; plain round robin leaves the out-parameters untouched.
    #[inline]
    #[must_use]
    pub const fn accounting_aware(&self) -> bool {
        self.feedback.is_enabled() || !matches!(self.policy, Policy::RoundRobin)
    }
}

/// Effective priority for a set request (1..=6, else the reset value)
#[inline]
#[must_use]
pub fn normalize_priority(raw: i32) -> Priority {
    if (i32::from(MIN_PRIORITY)..=i32::from(MAX_PRIORITY)).contains(&raw) {
        raw as Priority
    } else {
        RESET_PRIORITY
    }
}

/// Effective queue for a set request (1..=4, else queue 1)
#[inline]
#[must_use]
pub fn normalize_queue(raw: i32) -> QueueNumber {
    if (i32::from(MIN_QUEUE)..=i32::from(MAX_QUEUE)).contains(&raw) {
        raw as QueueNumber
    } else {
        DEFAULT_QUEUE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_policy_snaps_to_round_robin() {
        assert_eq!(Policy::from_raw(2), Policy::Priority);
        assert_eq!(Policy::from_raw(4), Policy::RoundRobin);
        assert_eq!(Policy::from_raw(-1), Policy::RoundRobin);
    }

    #[test]
    fn test_priority_round_trip_and_reset() {
        for p in 1..=6 {
            assert_eq!(i32::from(normalize_priority(p)), p);
        }
        for p in [0, 7, -1] {
            assert_eq!(normalize_priority(p), RESET_PRIORITY);
        }
    }

    #[test]
    fn test_setters_report_effective_value() {
        let mut config = SchedConfig::default();
        assert_eq!(config.set_policy(3), Policy::ReversePriority);
        assert_eq!(config.set_feedback(9), FeedbackMode::OFF);
        assert_eq!(config.set_feedback(2).as_raw(), 2);
        assert_eq!(config.policy, Policy::ReversePriority);
    }

    #[test]
    fn test_accounting_awareness() {
        assert!(!SchedConfig::from_raw(0, 0).accounting_aware());
        assert!(SchedConfig::from_raw(1, 0).accounting_aware());
        assert!(SchedConfig::from_raw(3, 0).accounting_aware());
        assert!(SchedConfig::from_raw(0, 1).accounting_aware());
    }

    #[test]
    fn test_policy_serializes_as_name() {
        let json = serde_json::to_string(&SchedConfig::from_raw(3, 2)).unwrap();
        assert_eq!(json, r#"{"policy":"reverse_priority","feedback":2}"#);
        let back: SchedConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SchedConfig::from_raw(3, 2));
    }

    proptest! {
        #[test]
        fn prop_normalized_values_in_range(raw in any::<i32>()) {
            let priority = normalize_priority(raw);
            prop_assert!((MIN_PRIORITY..=MAX_PRIORITY).contains(&priority));
            let queue = normalize_queue(raw);
            prop_assert!((MIN_QUEUE..=MAX_QUEUE).contains(&queue));
            prop_assert!((0..=3).contains(&Policy::from_raw(raw).as_raw()));
            prop_assert!((0..=3).contains(&FeedbackMode::from_raw(raw).as_raw()));
        }
    }
}
