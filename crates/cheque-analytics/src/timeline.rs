//! Timeline view of a computed schedule

use cheque_milestone::{duration_secs, ContractId, MilestoneId};
use cheque_schedule::{CalendarWindow, ContractSchedule, MilestoneTiming};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Schedule zero on the calendar
///
/// A configured start wins, then the earliest planned start of the contract.
#[must_use]
pub fn resolve_anchor(
    configured: Option<DateTime<Utc>>,
    schedule: &ContractSchedule,
) -> Option<DateTime<Utc>> {
    configured.or_else(|| schedule.earliest_planned_start())
}

/// One row of the timeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    /// The milestone
    pub milestone_id: MilestoneId,
    /// Its title
    pub title: String,
    /// Authored ordering hint
    pub sequence_number: i32,
    /// CPM offsets
    pub timing: MilestoneTiming,
    /// Offsets on the calendar, when an anchor is known
    pub window: Option<CalendarWindow>,
    /// Milestones grouped with this one through parallel edges
    pub parallel_with: Vec<MilestoneId>,
    /// Current progress
    pub percentage_complete: f64,
}

/// Contract timeline in topological order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineAnalysis {
    /// The contract
    pub contract_id: ContractId,
    /// Schedule zero, if known
    pub anchor: Option<DateTime<Utc>>,
    /// Max earliest finish over sinks
    #[serde(with = "duration_secs::required")]
    pub total_duration: Duration,
    /// Length of the critical chain
    #[serde(with = "duration_secs::required")]
    pub critical_path_duration: Duration,
    /// Summed slack of non-critical milestones
    #[serde(with = "duration_secs::required")]
    pub slack_time: Duration,
    /// `anchor + total_duration`, if representable
    pub projected_end: Option<DateTime<Utc>>,
    /// One zero-slack source-to-sink chain
    pub critical_chain: Vec<MilestoneId>,
    /// Rows in topological order
    pub entries: Vec<TimelineEntry>,
}

impl TimelineAnalysis {
    /// Lay out a schedule
    #[must_use]
    pub fn build(schedule: &ContractSchedule, anchor: Option<DateTime<Utc>>) -> Self {
        let graph = schedule.graph();
        let cpm = schedule.cpm();
        let entries = cpm
            .timings()
            .iter()
            .filter_map(|timing| {
                let m = graph.milestone(timing.milestone_id)?;
                Some(TimelineEntry {
                    milestone_id: m.id,
                    title: m.title.clone(),
                    sequence_number: m.sequence_number,
                    timing: *timing,
                    window: anchor.and_then(|a| timing.at(a)),
                    parallel_with: graph.parallel_group(m.id),
                    percentage_complete: m.percentage_complete,
                })
            })
            .collect();

        Self {
            contract_id: graph.contract_id(),
            anchor,
            total_duration: cpm.total_duration(),
            critical_path_duration: cpm.critical_path_duration(),
            slack_time: cpm.slack_time(),
            projected_end: anchor.and_then(|a| a.checked_add_signed(cpm.total_duration())),
            critical_chain: cpm.critical_chain().to_vec(),
            entries,
        }
    }

    /// Entry of one milestone
    #[must_use]
    pub fn entry(&self, id: MilestoneId) -> Option<&TimelineEntry> {
        self.entries.iter().find(|e| e.milestone_id == id)
    }
}
