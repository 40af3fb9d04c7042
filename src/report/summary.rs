use std::time::Duration;

use crate::metrics::{BucketThresholds, Counters, LatencyHistogram};

/// Five decimal places, as in `0.12345`.
const FRACTION_SCALE: u128 = 100_000;
const MS_PER_SEC: u128 = 1_000;

/// Everything the Final Report reads.
#[derive(Debug, Clone, Copy)]
pub struct FinalReport<'run> {
    pub totals: &'run Counters,
    pub thresholds: &'run BucketThresholds,
    pub expected_status: u16,
    pub elapsed: Duration,
    pub histogram: Option<&'run LatencyHistogram>,
}

fn fraction(count: u64, total: u64) -> String {
    let scaled = u128::from(count)
        .saturating_mul(FRACTION_SCALE)
        .checked_div(u128::from(total))
        .unwrap_or(0);
    format!(
        "{}.{:05}",
        scaled.checked_div(FRACTION_SCALE).unwrap_or(0),
        scaled.checked_rem(FRACTION_SCALE).unwrap_or(0)
    )
}

fn count_line(name: &str, count: u64, total: u64) -> String {
    if total == 0 {
        return format!("# {}", name);
    }
    format!("# {}\t{}\t{}", name, count, fraction(count, total))
}

impl FinalReport<'_> {
    /// Renders the report, one line per entry.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        let totals = self.totals;
        let total = totals.total();
        let mut lines = vec![
            count_line("successes", totals.successes(), total),
            count_line("errors", totals.errors, total),
            count_line("timeouts", totals.timeouts, total),
            count_line("closes", totals.closes, total),
            count_line(&format!("{}s", self.expected_status), totals.http_ok, total),
            count_line(&format!("!{}s", self.expected_status), totals.http_error, total),
        ];
        for (label, count) in self.thresholds.labels().iter().zip(totals.buckets()) {
            lines.push(count_line(label, *count, total));
        }

        if let Some(histogram) = self.histogram.filter(|histogram| histogram.count() > 0) {
            let (p50, p90, p99) = histogram.percentiles();
            lines.push(format!("# p50\t\t{}", p50));
            lines.push(format!("# p90\t\t{}", p90));
            lines.push(format!("# p99\t\t{}", p99));
        }

        let elapsed_ms = self.elapsed.as_millis();
        lines.push(format!(
            "# time\t\t{}.{:03}",
            elapsed_ms.checked_div(MS_PER_SEC).unwrap_or(0),
            elapsed_ms.checked_rem(MS_PER_SEC).unwrap_or(0)
        ));
        lines.push(format!(
            "# hz\t\t{}",
            super::rate_per_second(totals.successes(), self.elapsed)
        ));
        lines
    }

    /// Prints the report to stderr.
    pub fn print(&self) {
        for line in self.lines() {
            eprintln!("{}", line);
        }
    }
}
