//! Milestone records
//!
//! Defines the persisted shapes:
//! - [`Milestone`]: one scheduling node of a contract
//! - [`MilestoneDependency`]: one directed edge between milestones
//! - Progress updates and the progress history they leave behind
//! - [`ContractSnapshot`]: everything stored for one contract

use crate::ids::{ContractId, DependencyId, MilestoneId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Authored risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Low risk
    #[default]
    Low,
    /// Medium risk
    Medium,
    /// High risk
    High,
}

/// Milestone lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    /// Not started
    #[default]
    Pending,
    /// Work underway
    InProgress,
    /// Done; funds for this milestone may release
    Completed,
    /// Waiting on something outside the schedule
    Blocked,
    /// Abandoned
    Cancelled,
}

impl MilestoneStatus {
    /// Terminal statuses accept no further transitions or progress
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// Kind of relationship a dependency edge expresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    /// Hard predecessor: must finish before the dependent can start
    #[default]
    Prerequisite,
    /// Soft grouping: ordered and reported, but does not constrain timing
    Parallel,
}

impl DependencyType {
    /// Whether this edge constrains critical-path timing
    #[inline]
    #[must_use]
    pub fn constrains_timing(self) -> bool {
        matches!(self, Self::Prerequisite)
    }
}

/// One scheduling node of a contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    /// Stable identifier
    pub id: MilestoneId,
    /// Owning contract
    pub contract_id: ContractId,
    /// Display title
    pub title: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Author-assigned ordering hint (tie-break only)
    #[serde(default)]
    pub sequence_number: i32,
    /// Milestones the author associated with this one.
    ///
    /// Informational only; the graph is always built from
    /// [`MilestoneDependency`] records.
    #[serde(default)]
    pub dependencies: Vec<MilestoneId>,
    /// Category label
    #[serde(default)]
    pub category: Option<String>,
    /// Priority (higher = more important)
    #[serde(default)]
    pub priority: i32,
    /// Authored risk level
    #[serde(default)]
    pub risk_level: RiskLevel,
    /// Authored criticality weight (0-100)
    #[serde(default)]
    pub criticality_score: u8,
    /// Lifecycle status
    #[serde(default)]
    pub status: MilestoneStatus,
    /// Cached projection of the last critical-path computation
    #[serde(default)]
    pub critical_path: bool,
    /// Planned start
    #[serde(default)]
    pub estimated_start_date: Option<DateTime<Utc>>,
    /// Planned end (due date)
    #[serde(default)]
    pub estimated_end_date: Option<DateTime<Utc>>,
    /// Actual start
    #[serde(default)]
    pub actual_start_date: Option<DateTime<Utc>>,
    /// Actual end
    #[serde(default)]
    pub actual_end_date: Option<DateTime<Utc>>,
    /// Planned duration; missing means zero (an instantaneous gate)
    #[serde(default, with = "crate::duration_secs")]
    pub estimated_duration: Option<Duration>,
    /// Measured duration
    #[serde(default, with = "crate::duration_secs")]
    pub actual_duration: Option<Duration>,
    /// Current progress (0-100)
    #[serde(default)]
    pub percentage_complete: f64,
    /// Free-text fallback plans
    #[serde(default)]
    pub contingency_plans: Vec<String>,
}

impl Milestone {
    /// Create a pending milestone with no schedule data
    #[must_use]
    pub fn new(contract_id: ContractId, title: impl Into<String>, sequence_number: i32) -> Self {
        Self {
            id: MilestoneId::new(),
            contract_id,
            title: title.into(),
            description: String::new(),
            sequence_number,
            dependencies: Vec::new(),
            category: None,
            priority: 0,
            risk_level: RiskLevel::Low,
            criticality_score: 0,
            status: MilestoneStatus::Pending,
            critical_path: false,
            estimated_start_date: None,
            estimated_end_date: None,
            actual_start_date: None,
            actual_end_date: None,
            estimated_duration: None,
            actual_duration: None,
            percentage_complete: 0.0,
            contingency_plans: Vec::new(),
        }
    }

    /// With a fixed ID
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: MilestoneId) -> Self {
        self.id = id;
        self
    }

    /// With estimated duration
    #[inline]
    #[must_use]
    pub fn with_estimated_duration(mut self, duration: Duration) -> Self {
        self.estimated_duration = Some(duration);
        self
    }

    /// With planned window
    #[inline]
    #[must_use]
    pub fn with_window(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.estimated_start_date = Some(start);
        self.estimated_end_date = Some(end);
        self
    }

    /// With due date only
    #[inline]
    #[must_use]
    pub fn with_due_date(mut self, end: DateTime<Utc>) -> Self {
        self.estimated_end_date = Some(end);
        self
    }

    /// With risk level and criticality weight (clamped to 100)
    #[inline]
    #[must_use]
    pub fn with_risk(mut self, level: RiskLevel, criticality_score: u8) -> Self {
        self.risk_level = level;
        self.criticality_score = criticality_score.min(100);
        self
    }

    /// With status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: MilestoneStatus) -> Self {
        self.status = status;
        self
    }

    /// With progress (clamped to 0-100)
    #[inline]
    #[must_use]
    pub fn with_progress(mut self, percentage_complete: f64) -> Self {
        self.percentage_complete = percentage_complete.clamp(0.0, 100.0);
        self
    }

    /// With contingency plan appended
    #[inline]
    #[must_use]
    pub fn with_contingency(mut self, plan: impl Into<String>) -> Self {
        self.contingency_plans.push(plan.into());
        self
    }

    /// With category
    #[inline]
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Planned duration, zero when unset
    #[inline]
    #[must_use]
    pub fn duration_or_zero(&self) -> Duration {
        self.estimated_duration.unwrap_or_else(Duration::zero)
    }

    /// Whether progress has reached 100%
    #[inline]
    #[must_use]
    pub fn is_fully_complete(&self) -> bool {
        self.percentage_complete >= 100.0
    }
}

/// One directed edge: `milestone_id` depends on `depends_on_id`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MilestoneDependency {
    /// Edge ID
    pub id: DependencyId,
    /// The dependent milestone
    pub milestone_id: MilestoneId,
    /// The prerequisite milestone
    pub depends_on_id: MilestoneId,
    /// Relationship kind
    #[serde(default)]
    pub dependency_type: DependencyType,
}

impl MilestoneDependency {
    /// Create a prerequisite edge
    #[inline]
    #[must_use]
    pub fn prerequisite(milestone_id: MilestoneId, depends_on_id: MilestoneId) -> Self {
        Self {
            id: DependencyId::new(),
            milestone_id,
            depends_on_id,
            dependency_type: DependencyType::Prerequisite,
        }
    }

    /// Create a parallel (grouping) edge
    #[inline]
    #[must_use]
    pub fn parallel(milestone_id: MilestoneId, depends_on_id: MilestoneId) -> Self {
        Self {
            dependency_type: DependencyType::Parallel,
            ..Self::prerequisite(milestone_id, depends_on_id)
        }
    }

    /// With a fixed ID
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: DependencyId) -> Self {
        self.id = id;
        self
    }

    /// Whether the edge touches the given milestone at either end
    #[inline]
    #[must_use]
    pub fn touches(&self, id: MilestoneId) -> bool {
        self.milestone_id == id || self.depends_on_id == id
    }
}

/// Requested progress change for one milestone
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Target milestone
    pub milestone_id: MilestoneId,
    /// New progress (0-100)
    pub percentage_complete: f64,
}

impl ProgressUpdate {
    /// Create progress update
    #[inline]
    #[must_use]
    pub fn new(milestone_id: MilestoneId, percentage_complete: f64) -> Self {
        Self {
            milestone_id,
            percentage_complete,
        }
    }
}

/// Progress as recorded at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Milestone the reading belongs to
    pub milestone_id: MilestoneId,
    /// Progress at that time
    pub percentage_complete: f64,
    /// When the reading was taken
    pub recorded_at: DateTime<Utc>,
}

/// Partial update of a milestone's authored fields.
///
/// Absent fields are left untouched. Status, progress and the derived
/// critical-path flag are not editable here; they have their own paths.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MilestoneUpdate {
    /// New title
    #[serde(default)]
    pub title: Option<String>,
    /// New description
    #[serde(default)]
    pub description: Option<String>,
    /// New sequence number
    #[serde(default)]
    pub sequence_number: Option<i32>,
    /// New category
    #[serde(default)]
    pub category: Option<String>,
    /// New priority
    #[serde(default)]
    pub priority: Option<i32>,
    /// New risk level
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
    /// New criticality weight
    #[serde(default)]
    pub criticality_score: Option<u8>,
    /// New planned start
    #[serde(default)]
    pub estimated_start_date: Option<DateTime<Utc>>,
    /// New planned end
    #[serde(default)]
    pub estimated_end_date: Option<DateTime<Utc>>,
    /// New planned duration
    #[serde(default, with = "crate::duration_secs")]
    pub estimated_duration: Option<Duration>,
    /// Replacement contingency plans
    #[serde(default)]
    pub contingency_plans: Option<Vec<String>>,
}

impl MilestoneUpdate {
    /// Apply present fields onto a milestone
    pub fn apply_to(&self, milestone: &mut Milestone) {
        if let Some(title) = &self.title {
            milestone.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            milestone.description.clone_from(description);
        }
        if let Some(seq) = self.sequence_number {
            milestone.sequence_number = seq;
        }
        if let Some(category) = &self.category {
            milestone.category = Some(category.clone());
        }
        if let Some(priority) = self.priority {
            milestone.priority = priority;
        }
        if let Some(level) = self.risk_level {
            milestone.risk_level = level;
        }
        if let Some(score) = self.criticality_score {
            milestone.criticality_score = score.min(100);
        }
        if let Some(start) = self.estimated_start_date {
            milestone.estimated_start_date = Some(start);
        }
        if let Some(end) = self.estimated_end_date {
            milestone.estimated_end_date = Some(end);
        }
        if let Some(duration) = self.estimated_duration {
            milestone.estimated_duration = Some(duration);
        }
        if let Some(plans) = &self.contingency_plans {
            milestone.contingency_plans.clone_from(plans);
        }
    }

    /// Whether applying this update can change schedule timing or ordering
    #[inline]
    #[must_use]
    pub fn touches_schedule(&self) -> bool {
        self.sequence_number.is_some()
            || self.estimated_duration.is_some()
            || self.estimated_start_date.is_some()
    }
}

/// Everything stored for one contract
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractSnapshot {
    /// Contract the records belong to
    pub contract_id: ContractId,
    /// Milestones
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    /// Dependency edges
    #[serde(default)]
    pub dependencies: Vec<MilestoneDependency>,
    /// Progress history
    #[serde(default)]
    pub progress_history: Vec<ProgressSnapshot>,
}
