//! Schedule risk scoring
//!
//! Each open milestone scores 0-100 from two normalised factors:
//!
//! ```text
//! criticality = criticality_score / 100
//! tightness   = 1 - min(slack, horizon) / horizon
//! score       = 100 * (wc * criticality + ws * tightness) / (wc + ws)
//! ```
//!
//! Completed and cancelled milestones score zero. Buckets follow the authored
//! `risk_level`, not the computed score.

use crate::error::AnalyticsError;
use crate::stats::is_completed;
use cheque_milestone::{duration_secs, MilestoneId, MilestoneStatus, RiskLevel};
use cheque_schedule::ContractSchedule;
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Weights of the risk score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    /// Weight of the authored criticality score
    pub criticality: f64,
    /// Weight of schedule tightness (low slack)
    pub slack: f64,
    /// Slack at or beyond which a milestone counts as unconstrained
    #[serde(with = "duration_secs::required")]
    pub slack_horizon: Duration,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            criticality: 0.6,
            slack: 0.4,
            slack_horizon: Duration::days(14),
        }
    }
}

impl RiskWeights {
    /// With criticality weight
    #[inline]
    #[must_use]
    pub fn with_criticality(mut self, weight: f64) -> Self {
        self.criticality = weight;
        self
    }

    /// With slack weight
    #[inline]
    #[must_use]
    pub fn with_slack(mut self, weight: f64) -> Self {
        self.slack = weight;
        self
    }

    /// With slack horizon
    #[inline]
    #[must_use]
    pub fn with_slack_horizon(mut self, horizon: Duration) -> Self {
        self.slack_horizon = horizon;
        self
    }

    /// Reject weights that cannot produce a score
    ///
    /// # Errors
    /// `AnalyticsError::InvalidWeights` for negative or non-finite weights,
    /// both weights zero, or a horizon shorter than one second.
    pub fn validate(&self) -> Result<(), AnalyticsError> {
        for (name, w) in [("criticality", self.criticality), ("slack", self.slack)] {
            if !w.is_finite() || w < 0.0 {
                return Err(AnalyticsError::InvalidWeights(format!(
                    "{name} weight must be a non-negative number, got {w}"
                )));
            }
        }
        if self.criticality + self.slack <= 0.0 {
            return Err(AnalyticsError::InvalidWeights(
                "at least one weight must be positive".into(),
            ));
        }
        if self.slack_horizon < Duration::seconds(1) {
            return Err(AnalyticsError::InvalidWeights(format!(
                "slack horizon must be at least 1s, got {}ms",
                self.slack_horizon.num_milliseconds()
            )));
        }
        Ok(())
    }

    /// Score one milestone
    #[must_use]
    pub fn score(&self, criticality_score: u8, slack: Duration) -> f64 {
        let criticality = f64::from(criticality_score.min(100)) / 100.0;
        let clamped = slack.max(Duration::zero()).min(self.slack_horizon);
        #[allow(clippy::cast_precision_loss)]
        let tightness =
            1.0 - clamped.num_seconds() as f64 / self.slack_horizon.num_seconds() as f64;
        100.0 * (self.criticality * criticality + self.slack * tightness)
            / (self.criticality + self.slack)
    }
}

/// Risk of one milestone
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MilestoneRisk {
    /// The milestone
    pub milestone_id: MilestoneId,
    /// Authored level
    pub risk_level: RiskLevel,
    /// Computed score (0-100)
    pub score: f64,
    /// Total float from the CPM pass
    #[serde(with = "duration_secs::required")]
    pub slack: Duration,
    /// On the critical path
    pub is_critical: bool,
}

/// Fallback plans of a high-risk milestone
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContingencyEntry {
    /// The milestone
    pub milestone_id: MilestoneId,
    /// Its title
    pub title: String,
    /// Authored plans; empty means the risk is uncovered
    pub plans: Vec<String>,
}

/// Contract-level risk picture
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAnalysis {
    /// Milestones authored as high risk
    pub high: Vec<MilestoneId>,
    /// Milestones authored as medium risk
    pub medium: Vec<MilestoneId>,
    /// Milestones authored as low risk
    pub low: Vec<MilestoneId>,
    /// Per-milestone scores, highest first
    pub scores: Vec<MilestoneRisk>,
    /// Mean score, zero for an empty contract
    pub overall_score: f64,
    /// Plans of open high-risk milestones
    pub contingencies: Vec<ContingencyEntry>,
}

impl RiskAnalysis {
    /// Analyse a computed schedule
    ///
    /// # Errors
    /// `AnalyticsError::InvalidWeights` when `weights` fail validation.
    pub fn compute(
        schedule: &ContractSchedule,
        weights: &RiskWeights,
    ) -> Result<Self, AnalyticsError> {
        weights.validate()?;
        let cpm = schedule.cpm();

        let mut analysis = Self {
            high: Vec::new(),
            medium: Vec::new(),
            low: Vec::new(),
            scores: Vec::with_capacity(schedule.graph().len()),
            overall_score: 0.0,
            contingencies: Vec::new(),
        };

        // walk in topological order so ties in score stay stable
        for id in schedule.order().iter() {
            let Some(m) = schedule.graph().milestone(id) else {
                continue;
            };
            let (slack, is_critical) = cpm
                .timing(id)
                .map_or((Duration::zero(), false), |t| (t.slack, t.is_critical));
            let closed = is_completed(m) || m.status == MilestoneStatus::Cancelled;
            let score = if closed {
                0.0
            } else {
                weights.score(m.criticality_score, slack)
            };

            match m.risk_level {
                RiskLevel::High => {
                    analysis.high.push(id);
                    if !closed {
                        analysis.contingencies.push(ContingencyEntry {
                            milestone_id: id,
                            title: m.title.clone(),
                            plans: m.contingency_plans.clone(),
                        });
                    }
                }
                RiskLevel::Medium => analysis.medium.push(id),
                RiskLevel::Low => analysis.low.push(id),
            }
            analysis.scores.push(MilestoneRisk {
                milestone_id: id,
                risk_level: m.risk_level,
                score,
                slack,
                is_critical,
            });
        }

        if !analysis.scores.is_empty() {
            #[allow(clippy::cast_precision_loss)]
            let n = analysis.scores.len() as f64;
            analysis.overall_score = analysis.scores.iter().map(|s| s.score).sum::<f64>() / n;
        }
        analysis
            .scores
            .sort_by(|a, b| b.score.total_cmp(&a.score));

        tracing::trace!(
            contract_id = %schedule.graph().contract_id(),
            overall = analysis.overall_score,
            high = analysis.high.len(),
            "risk analysed"
        );
        Ok(analysis)
    }
}
