use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::{AppError, AppResult, MetricsError};
use crate::sinks::RunSinks;

use super::buckets::BucketThresholds;
use super::counters::Counters;
use super::histogram::LatencyHistogram;
use super::types::{Completion, Outcome, RunnerEvent};

/// Fixed inputs of the Local Reporter.
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    pub thresholds: BucketThresholds,
    pub expected_status: u16,
    pub interval: Duration,
}

/// What the reporter hands back once it stops.
#[derive(Debug)]
pub struct LocalReport {
    pub totals: Counters,
    pub histogram: LatencyHistogram,
    /// Number of period lines emitted.
    pub periods: u64,
    /// Stopped by a shutdown signal rather than by every runner finishing.
    pub interrupted: bool,
}

struct ReporterState {
    config: ReporterConfig,
    period: Counters,
    totals: Counters,
    histogram: LatencyHistogram,
    seq: u64,
}

impl ReporterState {
    fn new(config: ReporterConfig) -> AppResult<Self> {
        let period = Counters::for_thresholds(&config.thresholds);
        let totals = period.clone();
        Ok(Self {
            config,
            period,
            totals,
            histogram: LatencyHistogram::new()?,
            seq: 0,
        })
    }

    fn record(&mut self, completion: &Completion) -> AppResult<()> {
        let latency_ms = completion.latency_ms();
        self.period.record(
            completion.outcome,
            latency_ms,
            &self.config.thresholds,
            self.config.expected_status,
        );
        if matches!(completion.outcome, Outcome::Success { .. }) {
            self.histogram.record(latency_ms)?;
        }
        Ok(())
    }

    /// Renders the current period as `seq<TAB>values…` and starts a new one.
    fn take_line(&mut self) -> String {
        let line = format_period_line(self.seq, &self.period.to_values());
        self.totals.absorb(&self.period);
        self.period.reset();
        self.seq = self.seq.saturating_add(1);
        line
    }

    fn finish(mut self, interrupted: bool) -> LocalReport {
        if interrupted {
            // Partial period still belongs in the Final Report.
            self.totals.absorb(&self.period);
        }
        LocalReport {
            totals: self.totals,
            histogram: self.histogram,
            periods: self.seq,
            interrupted,
        }
    }
}

/// Renders one period line: `seq<TAB>v0<TAB>…<TAB>vn`.
#[must_use]
pub fn format_period_line(seq: u64, values: &[u64]) -> String {
    let mut line = seq.to_string();
    for value in values {
        line.push('\t');
        line.push_str(&value.to_string());
    }
    line.push('\n');
    line
}

async fn emit<W>(out: &mut W, line: &str) -> AppResult<()>
where
    W: AsyncWrite + Unpin + Send,
{
    out.write_all(line.as_bytes())
        .await
        .map_err(|source| {
            AppError::metrics(MetricsError::Io {
                context: "write report line",
                source,
            })
        })?;
    out.flush().await.map_err(|source| {
        AppError::metrics(MetricsError::Io {
            context: "flush report line",
            source,
        })
    })
}

/// Runs the Local Reporter until every runner has dropped its event sender
/// or a shutdown signal arrives.
///
/// Every `interval` the counters of the elapsed period are written to `out`
/// and reset. When the runners are done, the last partial period is written
/// as a final line. On shutdown nothing more is written.
///
/// # Errors
///
/// Returns an error when a report line or a log record cannot be written.
pub async fn run_local_reporter<W>(
    config: ReporterConfig,
    mut events: mpsc::Receiver<RunnerEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
    mut sinks: RunSinks,
    out: &mut W,
) -> AppResult<LocalReport>
where
    W: AsyncWrite + Unpin + Send,
{
    let interval = config.interval;
    let mut state = ReporterState::new(config)?;
    let start = Instant::now();
    let mut report_tick =
        tokio::time::interval_at(start.checked_add(interval).unwrap_or(start), interval);
    report_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let interrupted = loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                tracing::debug!("Local reporter interrupted.");
                break true;
            }
            event = events.recv() => match event {
                Some(RunnerEvent::Completed(completion)) => {
                    state.record(&completion)?;
                    sinks.record(&completion).await?;
                }
                Some(RunnerEvent::Closed) => state.period.record_close(),
                None => {
                    let line = state.take_line();
                    emit(out, &line).await?;
                    break false;
                }
            },
            _ = report_tick.tick() => {
                let line = state.take_line();
                emit(out, &line).await?;
                sinks.flush().await?;
            }
        }
    };

    if let Err(err) = sinks.flush().await {
        tracing::warn!("Failed to flush request logs: {}", err);
    }
    Ok(state.finish(interrupted))
}
