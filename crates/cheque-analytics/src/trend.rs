//! Progress trend from recorded progress history
//!
//! Time is cut into fixed-width buckets starting at the first recorded
//! update. Each bucket reports the state as of its end: the latest recorded
//! progress of every milestone, with milestones that have no record yet
//! counted at zero. Current milestone values are never consulted.

use crate::error::AnalyticsError;
use cheque_milestone::{MilestoneId, ProgressSnapshot};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Upper bound on buckets in one trend
pub const MAX_TREND_BUCKETS: u64 = 10_000;

/// One bucket of the trend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    /// Inclusive start
    pub period_start: DateTime<Utc>,
    /// Exclusive end
    pub period_end: DateTime<Utc>,
    /// Milestones at 100% by `period_end`
    pub completed: usize,
    /// `completed / total * 100`
    pub completion_rate: f64,
    /// Mean recorded progress by `period_end`
    pub average_progress: f64,
    /// Updates recorded inside this bucket
    pub updates: usize,
}

/// Time-bucketed completion history of one contract
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressTrend {
    /// Milestones the rates are relative to
    pub total: usize,
    /// Buckets, oldest first
    pub points: Vec<TrendPoint>,
}

impl ProgressTrend {
    /// Bucket the history of the given milestones
    ///
    /// History entries for milestones outside `milestones` (deleted since)
    /// are ignored.
    ///
    /// # Errors
    /// - `AnalyticsError::InvalidBucketWidth` for a width under one second
    /// - `AnalyticsError::TooManyBuckets` when the span needs more than
    ///   [`MAX_TREND_BUCKETS`]
    pub fn compute(
        milestones: &HashSet<MilestoneId>,
        history: &[ProgressSnapshot],
        bucket: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self, AnalyticsError> {
        if bucket < Duration::seconds(1) {
            return Err(AnalyticsError::InvalidBucketWidth {
                millis: bucket.num_milliseconds(),
            });
        }

        let mut records: Vec<&ProgressSnapshot> = history
            .iter()
            .filter(|s| milestones.contains(&s.milestone_id))
            .collect();
        records.sort_by_key(|s| s.recorded_at);

        let total = milestones.len();
        let (Some(first), Some(last)) = (records.first(), records.last()) else {
            return Ok(Self {
                total,
                points: Vec::new(),
            });
        };

        let start = first.recorded_at;
        let end = now.max(last.recorded_at);
        // same unit the loop below advances by
        let span = (end - start).num_milliseconds();
        let width = bucket.num_milliseconds();
        let count = u64::try_from(span / width + 1).unwrap_or(u64::MAX);
        if count > MAX_TREND_BUCKETS {
            return Err(AnalyticsError::TooManyBuckets {
                requested: count,
                max: MAX_TREND_BUCKETS,
            });
        }

        let mut latest: HashMap<MilestoneId, f64> = HashMap::with_capacity(total);
        let mut points = Vec::new();
        let mut cursor = records.into_iter().peekable();
        let mut period_start = start;
        for _ in 0..count {
            let period_end = period_start + bucket;
            let mut updates = 0;
            while let Some(s) = cursor.next_if(|s| s.recorded_at < period_end) {
                latest.insert(s.milestone_id, s.percentage_complete);
                updates += 1;
            }
            points.push(point(period_start, period_end, total, &latest, updates));
            period_start = period_end;
        }

        Ok(Self { total, points })
    }

    /// Most recent bucket
    #[inline]
    #[must_use]
    pub fn latest(&self) -> Option<&TrendPoint> {
        self.points.last()
    }
}

fn point(
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    total: usize,
    latest: &HashMap<MilestoneId, f64>,
    updates: usize,
) -> TrendPoint {
    let completed = latest.values().filter(|p| **p >= 100.0).count();
    let (completion_rate, average_progress) = if total == 0 {
        (0.0, 0.0)
    } else {
        #[allow(clippy::cast_precision_loss)]
        let n = total as f64;
        #[allow(clippy::cast_precision_loss)]
        let done = completed as f64;
        (done / n * 100.0, latest.values().sum::<f64>() / n)
    };
    TrendPoint {
        period_start,
        period_end,
        completed,
        completion_rate,
        average_progress,
        updates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, day, 12, 0, 0).unwrap()
    }

    fn snap(n: u128, pct: f64, at: DateTime<Utc>) -> ProgressSnapshot {
        ProgressSnapshot {
            milestone_id: MilestoneId::from_u128(n),
            percentage_complete: pct,
            recorded_at: at,
        }
    }

    #[test]
    fn empty_history_gives_empty_trend() {
        let ids: HashSet<_> = [MilestoneId::from_u128(1)].into_iter().collect();
        let trend = ProgressTrend::compute(&ids, &[], Duration::days(1), t(10)).unwrap();
        assert_eq!(trend.total, 1);
        assert!(trend.points.is_empty());
    }

    #[test]
    fn buckets_carry_latest_progress_forward() {
        let ids: HashSet<_> = (1..=2).map(MilestoneId::from_u128).collect();
        let history = vec![
            snap(1, 40.0, t(1)),
            snap(2, 100.0, t(2)),
            snap(1, 100.0, t(4)),
            // deleted milestone
            snap(9, 100.0, t(2)),
        ];
        let trend = ProgressTrend::compute(&ids, &history, Duration::days(1), t(5)).unwrap();

        assert_eq!(trend.points.len(), 5);
        let first = &trend.points[0];
        assert_eq!(first.updates, 1);
        assert_eq!(first.completed, 0);
        assert!((first.average_progress - 20.0).abs() < 1e-9);

        let second = &trend.points[1];
        assert_eq!(second.updates, 1);
        assert!((second.completion_rate - 50.0).abs() < 1e-9);

        let last = trend.latest().unwrap();
        assert_eq!(last.completed, 2);
        assert!((last.completion_rate - 100.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_bad_bucket_widths() {
        let ids: HashSet<_> = [MilestoneId::from_u128(1)].into_iter().collect();
        let history = vec![snap(1, 10.0, t(1))];
        assert!(matches!(
            ProgressTrend::compute(&ids, &history, Duration::zero(), t(2)),
            Err(AnalyticsError::InvalidBucketWidth { .. })
        ));
        assert!(matches!(
            ProgressTrend::compute(&ids, &history, Duration::milliseconds(500), t(2)),
            Err(AnalyticsError::InvalidBucketWidth { millis: 500 })
        ));
        assert!(matches!(
            ProgressTrend::compute(&ids, &history, Duration::seconds(1), t(20)),
            Err(AnalyticsError::TooManyBuckets { .. })
        ));
    }

    #[test]
    fn fractional_bucket_width_covers_span_exactly() {
        let ids: HashSet<_> = [MilestoneId::from_u128(1)].into_iter().collect();
        let start = t(1);
        let history = vec![snap(1, 10.0, start)];
        let now = start + Duration::milliseconds(4_500);
        let trend =
            ProgressTrend::compute(&ids, &history, Duration::milliseconds(1_500), now).unwrap();
        assert_eq!(trend.points.len(), 4);
        let last = trend.latest().unwrap();
        assert_eq!(last.period_start, start + Duration::milliseconds(4_500));
    }
}
