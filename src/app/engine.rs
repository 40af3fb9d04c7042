use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::config::LoadSettings;
use crate::error::AppResult;
use crate::http::{Connector, RequestBudget, Runner, RunnerConfig, RunnerStats};
use crate::metrics::{LocalReport, ReporterConfig, RunnerEvent, run_local_reporter};
use crate::shutdown::ShutdownSender;
use crate::sinks::RunSinks;

const EVENT_CHANNEL_CAPACITY: usize = 10_000;

/// Result of one process-local run.
#[derive(Debug)]
pub struct EngineOutcome {
    pub report: LocalReport,
    pub runners: Vec<RunnerStats>,
    pub elapsed: Duration,
}

fn runner_config(settings: &LoadSettings) -> RunnerConfig {
    RunnerConfig {
        requests_per_connection: settings.requests_per_connection,
        warmup: settings.warmup,
        period: settings.rate_period(),
        timeout: settings.request_timeout(),
    }
}

/// Drives `settings.concurrency` runners against `connector` and reports
/// their periods to `out` until the request budget is spent or a shutdown
/// signal arrives.
///
/// A runner that cannot acquire a connection signals shutdown for the whole
/// process, and its error is returned.
///
/// # Errors
///
/// Returns an error when a runner fails or the reporter cannot write.
pub async fn run_engine<C, W>(
    settings: &LoadSettings,
    connector: Arc<C>,
    sinks: RunSinks,
    shutdown_tx: &ShutdownSender,
    out: &mut W,
) -> AppResult<EngineOutcome>
where
    C: Connector + 'static,
    W: AsyncWrite + Unpin + Send,
{
    let started = Instant::now();
    let (events_tx, events_rx) = mpsc::channel::<RunnerEvent>(EVENT_CHANNEL_CAPACITY);
    let budget = Arc::new(RequestBudget::new(settings.count));
    let config = runner_config(settings);

    let mut handles = Vec::with_capacity(settings.concurrency);
    for id in 0..settings.concurrency {
        let runner = Runner::new(
            id,
            config.clone(),
            Arc::clone(&connector),
            Arc::clone(&budget),
            events_tx.clone(),
        );
        let shutdown_rx = shutdown_tx.subscribe();
        let shutdown_tx = shutdown_tx.clone();
        handles.push(tokio::spawn(async move {
            let result = runner.run(shutdown_rx).await;
            if let Err(err) = &result {
                tracing::error!("Runner {} failed: {}", id, err);
                drop(shutdown_tx.send(()));
            }
            result
        }));
    }
    drop(events_tx);

    let reporter_config = ReporterConfig {
        thresholds: settings.buckets.clone(),
        expected_status: settings.expected_status,
        interval: settings.report_interval(),
    };
    let report = run_local_reporter(
        reporter_config,
        events_rx,
        shutdown_tx.subscribe(),
        sinks,
        out,
    )
    .await;
    if report.is_err() {
        drop(shutdown_tx.send(()));
    }

    let mut runners = Vec::with_capacity(handles.len());
    for handle in handles {
        runners.push(handle.await??);
    }
    let report = report?;

    Ok(EngineOutcome {
        report,
        runners,
        elapsed: started.elapsed(),
    })
}
