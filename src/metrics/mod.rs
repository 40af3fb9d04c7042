mod buckets;
mod collector;
mod counters;
mod histogram;
mod types;


pub use buckets::{BucketThresholds, MAX_BUCKETS};
pub use collector::{LocalReport, ReporterConfig, format_period_line, run_local_reporter};
pub use counters::{Counters, FIXED_COLUMNS};
pub use histogram::{HISTOGRAM_TRAILER, LatencyHistogram};
pub use types::{Completion, Outcome, RunnerEvent};
