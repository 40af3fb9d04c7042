use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;

/// How a dispatched request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A response arrived; `status` decides http_ok vs http_error.
    Success { status: u16 },
    /// Connection-level failure with no usable response.
    Error,
    /// The fixed deadline fired first.
    Timeout,
}

impl Outcome {
    /// Code written to the timing log. Peer closes use code 1 and are
    /// never logged since they do not complete a request.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Outcome::Success { .. } => 0,
            Outcome::Error => 2,
            Outcome::Timeout => 3,
        }
    }
}

/// One finished, non-warmup request.
#[derive(Debug, Clone)]
pub struct Completion {
    pub outcome: Outcome,
    pub started_at: SystemTime,
    pub finished_at: SystemTime,
    pub latency: Duration,
    pub body: Option<Bytes>,
}

impl Completion {
    #[must_use]
    pub fn latency_ms(&self) -> u64 {
        u64::try_from(self.latency.as_millis()).unwrap_or(u64::MAX)
    }

    #[must_use]
    pub fn start_micros(&self) -> u128 {
        micros_since_epoch(self.started_at)
    }

    #[must_use]
    pub fn end_micros(&self) -> u128 {
        micros_since_epoch(self.finished_at)
    }
}

/// What a runner reports to the process-local reporter.
#[derive(Debug, Clone)]
pub enum RunnerEvent {
    Completed(Completion),
    /// The peer announced it is closing the connection.
    Closed,
}

fn micros_since_epoch(at: SystemTime) -> u128 {
    at.duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_micros())
        .unwrap_or(0)
}
