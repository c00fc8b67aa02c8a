//! Aggregation errors

/// Invalid aggregation parameters
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalyticsError {
    /// Risk weights that cannot produce a score
    #[error("invalid risk weights: {0}")]
    InvalidWeights(String),

    /// Trend buckets are at least one second wide
    #[error("trend bucket width must be at least 1s, got {millis}ms")]
    InvalidBucketWidth {
        /// Requested width in milliseconds
        millis: i64,
    },

    /// Trend window too fine for its span
    #[error("progress trend would need {requested} buckets (max {max})")]
    TooManyBuckets {
        /// Buckets the request would produce
        requested: u64,
        /// Upper bound
        max: u64,
    },
}
