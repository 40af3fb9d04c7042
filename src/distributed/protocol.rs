use crate::error::{AppError, AppResult, DistributedError};
use crate::metrics::{HISTOGRAM_TRAILER, LatencyHistogram, format_period_line};

/// One worker period: `seq<TAB>errors<TAB>timeouts<TAB>closes<TAB>ok<TAB>!ok<TAB>buckets…`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRecord {
    pub seq: u64,
    pub values: Vec<u64>,
}

/// Anything a worker writes to its stdout.
#[derive(Debug)]
pub enum WorkerLine {
    Report(ReportRecord),
    /// End-of-stream latency histogram.
    Histogram(LatencyHistogram),
}

fn malformed(line: &str) -> AppError {
    AppError::distributed(DistributedError::MalformedReport {
        line: line.to_owned(),
    })
}

impl ReportRecord {
    /// Parses one report line.
    ///
    /// # Errors
    ///
    /// Returns an error when a field is missing or not an unsigned integer.
    pub fn parse(line: &str) -> AppResult<Self> {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        let mut fields = trimmed.split('\t');
        let seq = fields
            .next()
            .and_then(|field| field.parse::<u64>().ok())
            .ok_or_else(|| malformed(trimmed))?;
        let values = fields
            .map(|field| field.parse::<u64>().map_err(|_err| malformed(trimmed)))
            .collect::<AppResult<Vec<u64>>>()?;
        if values.is_empty() {
            return Err(malformed(trimmed));
        }
        Ok(Self { seq, values })
    }

    #[cfg(test)]
    #[must_use]
    pub fn to_line(&self) -> String {
        format_period_line(self.seq, &self.values)
    }
}

/// Parses a report line or the histogram trailer.
///
/// # Errors
///
/// Returns an error for anything else.
pub fn parse_worker_line(line: &str) -> AppResult<WorkerLine> {
    if let Some(encoded) = line.strip_prefix(HISTOGRAM_TRAILER) {
        let histogram = LatencyHistogram::decode_base64(encoded.trim_end())?;
        return Ok(WorkerLine::Histogram(histogram));
    }
    ReportRecord::parse(line).map(WorkerLine::Report)
}

/// The trailer line a worker writes after its last report.
///
/// # Errors
///
/// Returns an error when the histogram cannot be encoded.
pub fn histogram_trailer(histogram: &LatencyHistogram) -> AppResult<String> {
    Ok(format!("{}{}\n", HISTOGRAM_TRAILER, histogram.encode_base64()?))
}
