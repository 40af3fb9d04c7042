use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Upper bound on configured thresholds; the overflow slot comes on top.
pub const MAX_BUCKETS: usize = 100;

/// Ascending latency thresholds in milliseconds.
///
/// A latency lands in the first bucket whose threshold exceeds it; anything
/// at or above the last threshold lands in the overflow bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u64>", into = "Vec<u64>")]
pub struct BucketThresholds(Vec<u64>);

impl BucketThresholds {
    /// Validates and wraps a threshold list.
    ///
    /// # Errors
    ///
    /// Returns an error when the list is empty, too long, starts at zero, or
    /// is not strictly ascending.
    pub fn new(thresholds: Vec<u64>) -> Result<Self, ValidationError> {
        let Some(&first) = thresholds.first() else {
            return Err(ValidationError::BucketsEmpty);
        };
        if thresholds.len() > MAX_BUCKETS {
            return Err(ValidationError::TooManyBuckets {
                count: thresholds.len(),
                max: MAX_BUCKETS,
            });
        }
        if first == 0 {
            return Err(ValidationError::FirstBucketZero);
        }
        for pair in thresholds.windows(2) {
            if let [previous, value] = *pair
                && value <= previous
            {
                return Err(ValidationError::BucketsNotAscending { previous, value });
            }
        }
        Ok(Self(thresholds))
    }

    /// Index of the histogram slot for `latency_ms`.
    #[must_use]
    pub fn classify(&self, latency_ms: u64) -> usize {
        self.0
            .iter()
            .position(|&threshold| latency_ms < threshold)
            .unwrap_or(self.0.len())
    }

    /// Number of histogram slots, overflow included.
    #[must_use]
    pub fn slots(&self) -> usize {
        self.0.len().saturating_add(1)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }

    /// Largest threshold, used as the per-request timeout.
    #[must_use]
    pub fn max_latency(&self) -> Duration {
        Duration::from_millis(self.0.last().copied().unwrap_or(0))
    }

    /// Column labels: `<t0 … <tn-1 >=tn-1`.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .0
            .iter()
            .map(|threshold| format!("<{}", threshold))
            .collect();
        if let Some(last) = self.0.last() {
            labels.push(format!(">={}", last));
        }
        labels
    }
}

impl Default for BucketThresholds {
    fn default() -> Self {
        Self(vec![1, 10, 100])
    }
}

impl TryFrom<Vec<u64>> for BucketThresholds {
    type Error = ValidationError;

    fn try_from(value: Vec<u64>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BucketThresholds> for Vec<u64> {
    fn from(value: BucketThresholds) -> Self {
        value.0
    }
}

impl std::str::FromStr for BucketThresholds {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut thresholds = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            let value = part
                .parse::<u64>()
                .map_err(|err| ValidationError::InvalidBucket {
                    value: part.to_owned(),
                    source: err,
                })?;
            thresholds.push(value);
        }
        Self::new(thresholds)
    }
}

impl fmt::Display for BucketThresholds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.0.iter().map(u64::to_string).collect();
        f.write_str(&joined.join(","))
    }
}
