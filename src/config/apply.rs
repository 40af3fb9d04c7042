use clap::ArgMatches;
use clap::parser::ValueSource;

use crate::args::{LoadArgs, PositiveU64, PositiveUsize};
use crate::error::{AppError, AppResult, ConfigError, ValidationError};

use super::parse::{parse_buckets_value, parse_duration_value};
use super::types::ConfigFile;

fn is_cli(matches: &ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(ValueSource::CommandLine)
}

fn ensure_positive_u64(value: u64, field: &str) -> AppResult<PositiveU64> {
    PositiveU64::try_from(value).map_err(|err| {
        AppError::config(ConfigError::FieldMustBePositive {
            field: field.to_owned(),
            source: err,
        })
    })
}

fn ensure_positive_usize(value: usize, field: &str) -> AppResult<PositiveUsize> {
    PositiveUsize::try_from(value).map_err(|err| {
        AppError::config(ConfigError::FieldMustBePositive {
            field: field.to_owned(),
            source: err,
        })
    })
}

fn invalid_field(field: &'static str) -> impl FnOnce(ValidationError) -> AppError {
    move |source| AppError::config(ConfigError::InvalidField { field, source })
}

/// Applies config file values to CLI arguments. Anything given on the
/// command line wins.
///
/// # Errors
///
/// Returns an error when a config value is invalid.
pub fn apply_config(args: &mut LoadArgs, matches: &ArgMatches, config: &ConfigFile) -> AppResult<()> {
    if !is_cli(matches, "host")
        && let Some(host) = config.host.clone()
    {
        args.host = Some(host);
    }

    if !is_cli(matches, "port")
        && let Some(port) = config.port
    {
        args.port = Some(port);
    }

    if !is_cli(matches, "path")
        && let Some(path) = config.path.clone()
    {
        args.path = path;
    }

    if !is_cli(matches, "concurrency")
        && let Some(concurrency) = config.concurrency
    {
        args.concurrency = ensure_positive_usize(concurrency, "concurrency")?;
    }

    if !is_cli(matches, "buckets")
        && let Some(buckets) = config.buckets.as_ref()
    {
        args.buckets = parse_buckets_value(buckets).map_err(invalid_field("buckets"))?;
    }

    if !is_cli(matches, "count")
        && let Some(count) = config.count
    {
        args.count = Some(ensure_positive_u64(count, "count")?);
    }

    if !is_cli(matches, "requests_per_connection")
        && let Some(rpc) = config.requests_per_connection
    {
        args.requests_per_connection = Some(ensure_positive_u64(rpc, "requests_per_connection")?);
    }

    if !is_cli(matches, "interval")
        && let Some(interval) = config.interval.as_ref()
    {
        args.interval = parse_duration_value(interval).map_err(invalid_field("interval"))?;
    }

    if !is_cli(matches, "qps")
        && let Some(qps) = config.qps
    {
        args.qps = qps;
    }

    if !is_cli(matches, "warmup")
        && let Some(warmup) = config.warmup
    {
        args.warmup = warmup;
    }

    if !is_cli(matches, "procs")
        && let Some(procs) = config.procs
    {
        args.procs = ensure_positive_usize(procs, "procs")?;
    }

    if !is_cli(matches, "timing_log")
        && let Some(path) = config.timing_log.clone()
    {
        args.timing_log = Some(path);
    }

    if !is_cli(matches, "response_log")
        && let Some(path) = config.response_log.clone()
    {
        args.response_log = Some(path);
    }

    if !is_cli(matches, "expected_status")
        && let Some(status) = config.status
    {
        args.expected_status = status;
    }

    if !is_cli(matches, "rate_correction_us")
        && let Some(correction) = config.rate_correction_us
    {
        args.rate_correction_us = correction;
    }

    Ok(())
}
