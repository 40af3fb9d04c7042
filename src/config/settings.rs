use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::args::{DEFAULT_HOST, DEFAULT_PORT, LoadArgs};
use crate::error::{AppError, AppResult, ValidationError};
use crate::http::dispatch_period;
use crate::metrics::BucketThresholds;
use crate::sinks::SinkPaths;

/// Immutable run configuration, resolved from CLI and config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSettings {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub concurrency: usize,
    /// Total request limit of this process (or of the whole run, before
    /// it is split across workers).
    pub count: Option<u64>,
    pub requests_per_connection: Option<u64>,
    /// Per-runner requests per second; 0 is unlimited.
    pub qps: u64,
    pub warmup: u64,
    pub buckets: BucketThresholds,
    pub report_interval_ms: u64,
    pub procs: usize,
    pub expected_status: u16,
    pub timing_log: Option<PathBuf>,
    pub response_log: Option<PathBuf>,
    pub rate_correction_us: u64,
}

impl LoadSettings {
    /// Resolves parsed arguments into settings.
    ///
    /// # Errors
    ///
    /// Returns an error when the request path or the target is invalid.
    pub fn from_args(args: &LoadArgs) -> AppResult<Self> {
        if !args.path.starts_with('/') {
            return Err(AppError::validation(ValidationError::InvalidPath {
                value: args.path.clone(),
            }));
        }
        let settings = Self {
            host: args
                .host
                .clone()
                .unwrap_or_else(|| DEFAULT_HOST.to_owned()),
            port: args.port.unwrap_or(DEFAULT_PORT),
            path: args.path.clone(),
            concurrency: args.concurrency.get(),
            count: args.count.map(u64::from),
            requests_per_connection: args.requests_per_connection.map(u64::from),
            qps: args.qps,
            warmup: args.warmup,
            buckets: args.buckets.clone(),
            report_interval_ms: u64::try_from(args.interval.as_millis()).unwrap_or(u64::MAX),
            procs: args.procs.get(),
            expected_status: args.expected_status,
            timing_log: args.timing_log.as_ref().map(PathBuf::from),
            response_log: args.response_log.as_ref().map(PathBuf::from),
            rate_correction_us: args.rate_correction_us,
        };
        settings.target_url()?;
        Ok(settings)
    }

    /// `http://host:port/path`
    ///
    /// # Errors
    ///
    /// Returns an error when host, port and path do not form a URL.
    pub fn target_url(&self) -> AppResult<Url> {
        let target = format!("http://{}:{}{}", self.host, self.port, self.path);
        Url::parse(&target).map_err(|source| {
            AppError::validation(ValidationError::InvalidTarget { target, source })
        })
    }

    /// Fixed per-request deadline: the largest bucket threshold.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.buckets.max_latency()
    }

    #[must_use]
    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }

    #[must_use]
    pub fn rate_period(&self) -> Option<Duration> {
        dispatch_period(self.qps, Duration::from_micros(self.rate_correction_us))
    }

    #[must_use]
    pub fn sink_paths(&self) -> SinkPaths {
        SinkPaths {
            timing_log: self.timing_log.clone(),
            response_log: self.response_log.clone(),
        }
    }

    /// Settings for worker `index` of `procs`. The total count is split so
    /// the shares add up to it exactly; the first `count % procs` workers
    /// take one extra request. `None` when the worker's share is zero.
    #[must_use]
    pub fn for_worker(&self, index: usize) -> Option<Self> {
        let count = match self.count {
            Some(total) => {
                let procs = u64::try_from(self.procs.max(1)).unwrap_or(u64::MAX);
                let index = u64::try_from(index).unwrap_or(u64::MAX);
                let base = total.checked_div(procs).unwrap_or(0);
                let remainder = total.checked_rem(procs).unwrap_or(0);
                let share = if index < remainder {
                    base.saturating_add(1)
                } else {
                    base
                };
                if share == 0 {
                    return None;
                }
                Some(share)
            }
            None => None,
        };
        Some(Self {
            count,
            ..self.clone()
        })
    }
}
