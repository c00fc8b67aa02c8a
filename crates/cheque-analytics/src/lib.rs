//! Cheque Analytics - read-side aggregation over milestone schedules
//!
//! Pure functions over loaded milestones and computed schedules; nothing in
//! this crate touches the store or mutates state. Reports that depend on the
//! current time take `now` explicitly so they stay reproducible.
//!
//! - [`CompletionStats`]: counts, completion rate and mean progress
//! - [`RiskAnalysis`]: authored risk buckets plus a weighted score
//! - [`DelayReport`]: overdue milestones, most delayed first
//! - [`ProgressTrend`]: completion over time from recorded history
//! - [`TimelineAnalysis`]: CPM offsets laid out on the calendar

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod delay;
pub mod due;
pub mod error;
pub mod risk;
pub mod stats;
pub mod timeline;
pub mod trend;

pub use delay::{DelayReport, DelayedMilestone};
pub use due::{DueResolver, DueSource};
pub use error::AnalyticsError;
pub use risk::{ContingencyEntry, MilestoneRisk, RiskAnalysis, RiskWeights};
pub use stats::CompletionStats;
pub use timeline::{resolve_anchor, TimelineAnalysis, TimelineEntry};
pub use trend::{ProgressTrend, TrendPoint, MAX_TREND_BUCKETS};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
