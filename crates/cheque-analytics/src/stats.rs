//! Completion statistics

use crate::due::DueResolver;
use cheque_milestone::{Milestone, MilestoneStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Contract-level completion counts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionStats {
    /// All milestones
    pub total: usize,
    /// Completed by status or by reaching 100%
    pub completed: usize,
    /// Neither completed nor cancelled
    pub pending: usize,
    /// Pending and past due
    pub overdue: usize,
    /// Cancelled
    pub cancelled: usize,
    /// `completed / total * 100`, zero for an empty contract
    pub completion_rate: f64,
    /// Mean `percentage_complete`, zero for an empty contract
    pub average_completion: f64,
}

impl CompletionStats {
    /// Aggregate over a contract's milestones
    #[must_use]
    pub fn compute<'m, I>(milestones: I, due: &DueResolver<'_>, now: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = &'m Milestone>,
    {
        let mut stats = Self {
            total: 0,
            completed: 0,
            pending: 0,
            overdue: 0,
            cancelled: 0,
            completion_rate: 0.0,
            average_completion: 0.0,
        };
        let mut progress_sum = 0.0;

        for m in milestones {
            stats.total += 1;
            progress_sum += m.percentage_complete;
            if is_completed(m) {
                stats.completed += 1;
            } else if m.status == MilestoneStatus::Cancelled {
                stats.cancelled += 1;
            } else {
                stats.pending += 1;
                if due.is_overdue(m, now) {
                    stats.overdue += 1;
                }
            }
        }

        if stats.total > 0 {
            #[allow(clippy::cast_precision_loss)]
            let total = stats.total as f64;
            #[allow(clippy::cast_precision_loss)]
            let completed = stats.completed as f64;
            stats.completion_rate = completed / total * 100.0;
            stats.average_completion = progress_sum / total;
        }
        stats
    }
}

pub(crate) fn is_completed(m: &Milestone) -> bool {
    m.status == MilestoneStatus::Completed || m.is_fully_complete()
}
