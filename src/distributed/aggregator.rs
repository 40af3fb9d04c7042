use std::time::{Duration, Instant};

use crate::error::AppResult;
use crate::metrics::{Counters, LatencyHistogram};
use crate::report::{aggregate_line, rate_per_second};

use super::protocol::{WorkerLine, parse_worker_line};
use super::ring::{AggregationRing, FlushedPeriod};

/// Supervisor-side state: the ring, the merged totals and the merged
/// latency histogram.
#[derive(Debug)]
pub struct Aggregator {
    ring: AggregationRing,
    totals: Counters,
    histogram: LatencyHistogram,
    last_flush: Instant,
}

impl Aggregator {
    /// # Errors
    ///
    /// Returns an error when the histogram cannot be created.
    pub fn new(workers: usize, slots: usize, capacity: usize, started: Instant) -> AppResult<Self> {
        let totals = Counters::new(slots);
        let ring = AggregationRing::new(workers, totals.width(), capacity);
        Ok(Self {
            ring,
            totals,
            histogram: LatencyHistogram::new()?,
            last_flush: started,
        })
    }

    #[must_use]
    pub const fn totals(&self) -> &Counters {
        &self.totals
    }

    #[must_use]
    pub const fn histogram(&self) -> &LatencyHistogram {
        &self.histogram
    }

    #[must_use]
    pub const fn ring(&self) -> &AggregationRing {
        &self.ring
    }

    /// Consumes one line from `worker` and returns the merged lines that
    /// became ready.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed lines and ring desync.
    pub fn on_line(
        &mut self,
        worker: usize,
        line: &str,
        now: Instant,
        timestamp: i64,
    ) -> AppResult<Vec<String>> {
        match parse_worker_line(line)? {
            WorkerLine::Report(record) => {
                let flushed = self.ring.accept(worker, &record)?;
                self.render(flushed, now, timestamp)
            }
            WorkerLine::Histogram(histogram) => {
                self.histogram.merge(&histogram)?;
                Ok(Vec::new())
            }
        }
    }

    /// Handles the end of a worker's stream.
    ///
    /// # Errors
    ///
    /// Returns an error when a flushed period has the wrong width.
    pub fn on_finished(&mut self, worker: usize, now: Instant, timestamp: i64) -> AppResult<Vec<String>> {
        let flushed = self.ring.worker_finished(worker);
        self.render(flushed, now, timestamp)
    }

    fn render(
        &mut self,
        flushed: Vec<FlushedPeriod>,
        now: Instant,
        timestamp: i64,
    ) -> AppResult<Vec<String>> {
        let mut lines = Vec::with_capacity(flushed.len());
        for period in flushed {
            let mut merged = Counters::new(self.totals.buckets().len());
            merged.add_values(&period.values)?;
            let elapsed = now.checked_duration_since(self.last_flush).unwrap_or(Duration::ZERO);
            let rate = rate_per_second(merged.successes(), elapsed);
            self.last_flush = now;
            self.totals.absorb(&merged);
            lines.push(aggregate_line(timestamp, &period.values, rate));
        }
        Ok(lines)
    }
}
