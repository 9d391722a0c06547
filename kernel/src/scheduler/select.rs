/*!
 * Candidate Selection
 *
 * Linear scans over the process table. Scan order is the tie-break and is
 * part of the observable schedule, so there are no heaps or run queues here.
 */

use super::policy::{Policy, SchedConfig};
use crate::core::limits::MAX_QUEUE;
use crate::core::types::{QueueNumber, SlotId};
use crate::process::{ProcState, ProcTable};

/// How a scan chooses among runnable candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// First runnable at or after the cursor
    First,
    /// Numerically lowest priority
    Lowest,
    /// Numerically highest priority
    Highest,
}

impl From<Policy> for Rule {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::RoundRobin | Policy::Quantum => Rule::First,
            Policy::Priority => Rule::Lowest,
            Policy::ReversePriority => Rule::Highest,
        }
    }
}

/// Sub-policy of each feedback tier, queue 1 first
pub const TIER_POLICIES: [Policy; MAX_QUEUE as usize] = [
    Policy::RoundRobin,
    Policy::Priority,
    Policy::ReversePriority,
    Policy::Quantum,
];

/// Outcome of a selection pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pick {
    pub slot: SlotId,
    /// Dispatch with a tick budget
    pub quantum: bool,
    /// Feedback queue the candidate was found in
    pub tier: Option<QueueNumber>,
}

/// Per-CPU scan positions: index 0 for the flat policies, 1..=4 per queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursors([usize; MAX_QUEUE as usize + 1]);

impl Cursors {
    #[inline]
    fn get(&self, tier: Option<QueueNumber>) -> usize {
        self.0[tier.map_or(0, usize::from)]
    }

    /// Resume the next scan after the slot just chosen
    #[inline]
    fn advance(&mut self, tier: Option<QueueNumber>, chosen: usize, capacity: usize) {
        self.0[tier.map_or(0, usize::from)] = (chosen + 1) % capacity.max(1);
    }
}

/// Scan for a runnable candidate under `rule`
///
/// Starts at `cursor` and wraps. For the priority rules the first runnable
/// found from the cursor is the initial best; the table is then scanned from
/// slot 0 and a candidate replaces it only when strictly better, so equal
/// priorities resolve to whichever was found first.
#[must_use]
pub fn select(
    table: &ProcTable,
    rule: Rule,
    queue: Option<QueueNumber>,
    cursor: usize,
) -> Option<usize> {
    let capacity = table.capacity();
    let eligible = |index: usize| {
        let p = table.at(index);
        p.state() == ProcState::Runnable && queue.map_or(true, |q| p.queue == q)
    };

    let first = (0..capacity)
        .map(|k| (cursor + k) % capacity)
        .find(|&index| eligible(index))?;

    let better = |candidate: usize, best: usize| {
        let (c, b) = (table.at(candidate).priority, table.at(best).priority);
        match rule {
            Rule::First => false,
            Rule::Lowest => c < b,
            Rule::Highest => c > b,
        }
    };

    if rule == Rule::First {
        return Some(first);
    }

    let mut best = first;
    for index in (0..capacity).filter(|&index| eligible(index)) {
        if better(index, best) {
            best = index;
        }
    }
    Some(best)
}

/// Choose the next process to dispatch and advance the cursors
///
/// With the feedback layer on, queues are visited 1 to 4 with each tier's own
/// rule; an empty queue falls through to the next. Every pass starts over at
/// queue 1.
pub fn pick(table: &ProcTable, config: SchedConfig, cursors: &mut Cursors) -> Option<Pick> {
    let capacity = table.capacity();

    if !config.feedback.is_enabled() {
        let policy = config.policy;
        let index = select(table, policy.into(), None, cursors.get(None))?;
        cursors.advance(None, index, capacity);
        return Some(Pick {
            slot: table.slot_id(index),
            quantum: policy == Policy::Quantum,
            tier: None,
        });
    }

    for (queue, policy) in (1..=MAX_QUEUE).zip(TIER_POLICIES) {
        let tier = Some(queue);
        if let Some(index) = select(table, policy.into(), tier, cursors.get(tier)) {
            cursors.advance(tier, index, capacity);
            return Some(Pick {
                slot: table.slot_id(index),
                quantum: policy == Policy::Quantum,
                tier,
            });
        }
    }
    None
}
