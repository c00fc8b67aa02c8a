//! Overdue milestone report

use crate::due::{DueResolver, DueSource};
use cheque_milestone::{duration_secs, Milestone, MilestoneId};
use cheque_schedule::CpmSchedule;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// One overdue milestone
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DelayedMilestone {
    /// The milestone
    pub milestone_id: MilestoneId,
    /// Its title
    pub title: String,
    /// Date it was due
    pub due: DateTime<Utc>,
    /// Where `due` came from
    pub due_source: DueSource,
    /// `now - due`
    #[serde(with = "duration_secs::required")]
    pub delay: Duration,
    /// Current progress
    pub percentage_complete: f64,
    /// On the critical path, so the delay moves the contract end date
    pub is_critical: bool,
}

/// Overdue milestones, most delayed first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DelayReport {
    /// Reference time of the report
    pub as_of: DateTime<Utc>,
    /// Overdue milestones
    pub delayed: Vec<DelayedMilestone>,
}

impl DelayReport {
    /// Collect overdue milestones
    #[must_use]
    pub fn compute<'m, I>(
        milestones: I,
        due: &DueResolver<'_>,
        cpm: Option<&CpmSchedule>,
        now: DateTime<Utc>,
    ) -> Self
    where
        I: IntoIterator<Item = &'m Milestone>,
    {
        let mut delayed: Vec<DelayedMilestone> = milestones
            .into_iter()
            .filter(|m| due.is_overdue(m, now))
            .filter_map(|m| {
                let (due_at, source) = due.due(m)?;
                Some(DelayedMilestone {
                    milestone_id: m.id,
                    title: m.title.clone(),
                    due: due_at,
                    due_source: source,
                    delay: now - due_at,
                    percentage_complete: m.percentage_complete,
                    is_critical: cpm.is_some_and(|c| c.is_critical(m.id)),
                })
            })
            .collect();
        delayed.sort_by(|a, b| {
            b.delay
                .cmp(&a.delay)
                .then_with(|| a.milestone_id.cmp(&b.milestone_id))
        });
        Self { as_of: now, delayed }
    }

    /// Whether anything is overdue
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.delayed.is_empty()
    }

    /// Largest delay, if any
    #[must_use]
    pub fn max_delay(&self) -> Option<Duration> {
        self.delayed.first().map(|d| d.delay)
    }
}
