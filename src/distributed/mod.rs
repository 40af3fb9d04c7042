//! Multi-process runs: worker bootstrap, report protocol and the
//! aggregation supervisor.
mod aggregator;
mod protocol;
mod ring;
mod supervisor;
mod wire;


pub use aggregator::Aggregator;
pub use protocol::{ReportRecord, WorkerLine, histogram_trailer, parse_worker_line};
pub use ring::{AggregationRing, FlushedPeriod, RING_CAPACITY};
pub use supervisor::{WORKER_SETTINGS_FLAG, run_supervisor};
pub use wire::{WorkerSettings, plan_workers};
