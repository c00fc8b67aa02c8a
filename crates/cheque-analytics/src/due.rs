//! Due-date resolution shared by the completion and delay reports

use cheque_milestone::Milestone;
use cheque_schedule::CpmSchedule;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Where a due date came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DueSource {
    /// The milestone's own `estimated_end_date`
    Planned,
    /// CPM latest finish mapped onto the calendar anchor
    LatestFinish,
}

/// Resolves the date a milestone is due by
#[derive(Debug, Clone, Copy)]
pub struct DueResolver<'a> {
    cpm: Option<&'a CpmSchedule>,
    anchor: Option<DateTime<Utc>>,
}

impl<'a> DueResolver<'a> {
    /// Use planned end dates only
    #[inline]
    #[must_use]
    pub fn planned_only() -> Self {
        Self {
            cpm: None,
            anchor: None,
        }
    }

    /// Fall back to CPM latest finish when an anchor is known
    #[inline]
    #[must_use]
    pub fn with_schedule(cpm: &'a CpmSchedule, anchor: Option<DateTime<Utc>>) -> Self {
        Self {
            cpm: Some(cpm),
            anchor,
        }
    }

    /// Due date of a milestone, if one can be determined
    #[must_use]
    pub fn due(&self, milestone: &Milestone) -> Option<(DateTime<Utc>, DueSource)> {
        if let Some(end) = milestone.estimated_end_date {
            return Some((end, DueSource::Planned));
        }
        let anchor = self.anchor?;
        let timing = self.cpm?.timing(milestone.id)?;
        let due = anchor.checked_add_signed(timing.latest_finish)?;
        Some((due, DueSource::LatestFinish))
    }

    /// Whether a milestone is past due at `now` and not finished
    ///
    /// Completed and cancelled milestones are never overdue.
    #[must_use]
    pub fn is_overdue(&self, milestone: &Milestone, now: DateTime<Utc>) -> bool {
        if milestone.status.is_terminal() || milestone.is_fully_complete() {
            return false;
        }
        self.due(milestone).is_some_and(|(due, _)| due < now)
    }
}
