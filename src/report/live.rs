use std::time::Duration;

use crate::config::LoadSettings;
use crate::metrics::BucketThresholds;

/// Requests per second from `count` completions over `elapsed`, using
/// whole milliseconds (at least one).
#[must_use]
pub fn rate_per_second(count: u64, elapsed: Duration) -> u64 {
    let elapsed_ms = elapsed.as_millis().max(1);
    let rate = u128::from(count)
        .saturating_mul(1_000)
        .checked_div(elapsed_ms)
        .unwrap_or(0);
    u64::try_from(rate).unwrap_or(u64::MAX)
}

/// `# params: host:port c=.. p=.. n=.. r=.. l=.. u=..`; unlimited values
/// print as 0.
#[must_use]
pub fn params_line(settings: &LoadSettings) -> String {
    format!(
        "# params: {}:{} c={} p={} n={} r={} l={} u={}",
        settings.host,
        settings.port,
        settings.concurrency,
        settings.procs,
        settings.count.unwrap_or(0),
        settings.requests_per_connection.unwrap_or(0),
        settings.qps,
        settings.path
    )
}

/// Column header of the live stream.
#[must_use]
pub fn column_header(thresholds: &BucketThresholds, expected_status: u16) -> String {
    let mut columns = vec![
        "# ts\t".to_owned(),
        "errors".to_owned(),
        "timeout".to_owned(),
        "closes".to_owned(),
        format!("{}s", expected_status),
        format!("!{}s", expected_status),
    ];
    columns.extend(thresholds.labels());
    columns.push("hz".to_owned());
    columns.join("\t")
}

/// One merged line of the multi-worker stream:
/// `unix_secs<TAB>values…<TAB>rate`.
#[must_use]
pub fn aggregate_line(timestamp: i64, values: &[u64], rate: u64) -> String {
    let mut fields = Vec::with_capacity(values.len().saturating_add(2));
    fields.push(timestamp.to_string());
    fields.extend(values.iter().map(u64::to_string));
    fields.push(rate.to_string());
    let mut line = fields.join("\t");
    line.push('\n');
    line
}
