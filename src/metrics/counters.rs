use crate::error::{AppError, AppResult, MetricsError};

use super::buckets::BucketThresholds;
use super::types::Outcome;

/// Counter columns that precede the bucket columns in a report vector.
pub const FIXED_COLUMNS: usize = 5;

/// Outcome counts plus one count per latency bucket.
///
/// Successes are not stored separately: every success lands in exactly one
/// bucket, so the success count is the bucket sum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counters {
    pub errors: u64,
    pub timeouts: u64,
    pub closes: u64,
    pub http_ok: u64,
    pub http_error: u64,
    buckets: Vec<u64>,
}

impl Counters {
    #[must_use]
    pub fn new(slots: usize) -> Self {
        Self {
            errors: 0,
            timeouts: 0,
            closes: 0,
            http_ok: 0,
            http_error: 0,
            buckets: vec![0; slots],
        }
    }

    #[must_use]
    pub fn for_thresholds(thresholds: &BucketThresholds) -> Self {
        Self::new(thresholds.slots())
    }

    pub fn record(
        &mut self,
        outcome: Outcome,
        latency_ms: u64,
        thresholds: &BucketThresholds,
        expected_status: u16,
    ) {
        match outcome {
            Outcome::Success { status } => {
                let slot = thresholds.classify(latency_ms);
                if let Some(count) = self.buckets.get_mut(slot) {
                    *count = count.saturating_add(1);
                }
                if status == expected_status {
                    self.http_ok = self.http_ok.saturating_add(1);
                } else {
                    self.http_error = self.http_error.saturating_add(1);
                }
            }
            Outcome::Error => self.errors = self.errors.saturating_add(1),
            Outcome::Timeout => self.timeouts = self.timeouts.saturating_add(1),
        }
    }

    pub fn record_close(&mut self) {
        self.closes = self.closes.saturating_add(1);
    }

    #[must_use]
    pub fn successes(&self) -> u64 {
        self.buckets
            .iter()
            .fold(0u64, |sum, count| sum.saturating_add(*count))
    }

    /// Requests that count toward the stop condition and the report fractions.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.successes()
            .saturating_add(self.errors)
            .saturating_add(self.timeouts)
    }

    #[must_use]
    pub fn buckets(&self) -> &[u64] {
        &self.buckets
    }

    /// Length of the report vector for this bucket layout.
    #[must_use]
    pub fn width(&self) -> usize {
        FIXED_COLUMNS.saturating_add(self.buckets.len())
    }

    /// `[errors, timeouts, closes, http_ok, http_error, bucket_0 … bucket_n]`
    #[must_use]
    pub fn to_values(&self) -> Vec<u64> {
        let mut values = Vec::with_capacity(self.width());
        values.extend_from_slice(&[
            self.errors,
            self.timeouts,
            self.closes,
            self.http_ok,
            self.http_error,
        ]);
        values.extend_from_slice(&self.buckets);
        values
    }

    /// Adds a report vector element-wise.
    ///
    /// # Errors
    ///
    /// Returns an error when the vector width does not match this layout.
    pub fn add_values(&mut self, values: &[u64]) -> AppResult<()> {
        let expected = self.width();
        let (Some(fixed), Some(buckets)) = (values.get(..FIXED_COLUMNS), values.get(FIXED_COLUMNS..))
        else {
            return Err(AppError::metrics(MetricsError::ReportWidth {
                expected,
                actual: values.len(),
            }));
        };
        if buckets.len() != self.buckets.len() {
            return Err(AppError::metrics(MetricsError::ReportWidth {
                expected,
                actual: values.len(),
            }));
        }
        if let [errors, timeouts, closes, http_ok, http_error] = *fixed {
            self.errors = self.errors.saturating_add(errors);
            self.timeouts = self.timeouts.saturating_add(timeouts);
            self.closes = self.closes.saturating_add(closes);
            self.http_ok = self.http_ok.saturating_add(http_ok);
            self.http_error = self.http_error.saturating_add(http_error);
        }
        for (count, added) in self.buckets.iter_mut().zip(buckets) {
            *count = count.saturating_add(*added);
        }
        Ok(())
    }

    pub fn absorb(&mut self, other: &Counters) {
        self.errors = self.errors.saturating_add(other.errors);
        self.timeouts = self.timeouts.saturating_add(other.timeouts);
        self.closes = self.closes.saturating_add(other.closes);
        self.http_ok = self.http_ok.saturating_add(other.http_ok);
        self.http_error = self.http_error.saturating_add(other.http_error);
        for (count, added) in self.buckets.iter_mut().zip(&other.buckets) {
            *count = count.saturating_add(*added);
        }
    }

    pub fn reset(&mut self) {
        self.errors = 0;
        self.timeouts = 0;
        self.closes = 0;
        self.http_ok = 0;
        self.http_error = 0;
        self.buckets.iter_mut().for_each(|count| *count = 0);
    }
}
