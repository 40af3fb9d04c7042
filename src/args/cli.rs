use clap::Parser;
use std::time::Duration;

use crate::metrics::BucketThresholds;

use super::defaults::{DEFAULT_BUCKETS, DEFAULT_PATH, DEFAULT_RATE_CORRECTION_US, DEFAULT_STATUS};
use super::parsers::{parse_buckets, parse_duration_arg, parse_positive_u64, parse_positive_usize};
use super::types::{PositiveU64, PositiveUsize};

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "HTTP load generator with periodic output.",
    after_help = "Live reports go to stdout, one tab-separated line per interval. \
                  The parameter header and the final summary go to stderr."
)]
pub struct LoadArgs {
    /// Concurrent runners per worker process
    #[arg(
        long,
        short = 'c',
        default_value = "1",
        value_parser = parse_positive_usize
    )]
    pub concurrency: PositiveUsize,

    /// Ascending latency bucket thresholds in milliseconds (comma separated)
    #[arg(
        long,
        short = 'b',
        default_value = DEFAULT_BUCKETS,
        value_parser = parse_buckets
    )]
    pub buckets: BucketThresholds,

    /// Stop after N total requests (split across worker processes)
    #[arg(long, short = 'n', value_parser = parse_positive_u64)]
    pub count: Option<PositiveU64>,

    /// Reconnect after N requests on one connection
    #[arg(
        long = "requests-per-connection",
        short = 'r',
        alias = "rpc",
        value_parser = parse_positive_u64
    )]
    pub requests_per_connection: Option<PositiveU64>,

    /// Report interval (supports ms/s/m/h, bare numbers are seconds)
    #[arg(
        long,
        short = 'i',
        default_value = "1s",
        value_parser = parse_duration_arg
    )]
    pub interval: Duration,

    /// Target requests per second for each runner (0 = unlimited)
    #[arg(long, short = 'l', default_value = "0")]
    pub qps: u64,

    /// Completions per runner discarded before recording starts
    #[arg(long, short = 'w', default_value = "0")]
    pub warmup: u64,

    /// Request path for the GET requests
    #[arg(long, short = 'u', default_value = DEFAULT_PATH)]
    pub path: String,

    /// Number of worker processes
    #[arg(
        long,
        short = 'p',
        default_value = "1",
        value_parser = parse_positive_usize
    )]
    pub procs: PositiveUsize,

    /// Write one `start_us end_us outcome` line per recorded request
    #[arg(long = "timing-log", short = 'o')]
    pub timing_log: Option<String>,

    /// Append every response body to this file, each followed by `---`
    #[arg(long = "response-log", short = 'x')]
    pub response_log: Option<String>,

    /// Status code counted as an HTTP success
    #[arg(long = "status", default_value_t = DEFAULT_STATUS)]
    pub expected_status: u16,

    /// Microseconds trimmed from each rate-limit period to offset timer overhead
    #[arg(long = "rate-correction-us", default_value_t = DEFAULT_RATE_CORRECTION_US)]
    pub rate_correction_us: u64,

    /// Path to config file (TOML or JSON)
    #[arg(long)]
    pub config: Option<String>,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Internal: run as a worker of a multi-process run
    #[arg(long = "worker-settings", hide = true)]
    pub worker_settings: Option<String>,

    /// Target host
    #[arg(value_name = "HOST")]
    pub host: Option<String>,

    /// Target port
    #[arg(value_name = "PORT")]
    pub port: Option<u16>,
}
