use serde::Deserialize;

/// Config file contents. Keys mirror the long CLI flags in snake_case.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
    pub concurrency: Option<usize>,
    pub buckets: Option<BucketsValue>,
    pub count: Option<u64>,
    #[serde(alias = "rpc")]
    pub requests_per_connection: Option<u64>,
    pub interval: Option<DurationValue>,
    pub qps: Option<u64>,
    pub warmup: Option<u64>,
    pub procs: Option<usize>,
    pub timing_log: Option<String>,
    pub response_log: Option<String>,
    pub status: Option<u16>,
    pub rate_correction_us: Option<u64>,
}

/// Bucket thresholds as an array (`[1, 10, 100]`) or a comma string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BucketsValue {
    List(Vec<u64>),
    Text(String),
}

/// Whole seconds or a duration string such as `500ms`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}
