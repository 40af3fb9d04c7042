use std::sync::Arc;

use tokio::io::AsyncWriteExt;

use crate::config::LoadSettings;
use crate::distributed::{WorkerSettings, histogram_trailer};
use crate::error::AppResult;
use crate::http::ReqwestConnector;
use crate::report::{FinalReport, print_header};
use crate::shutdown::ShutdownSender;
use crate::sinks::{OpenMode, RunSinks};

use super::engine::{EngineOutcome, run_engine};

async fn run_with_reqwest(
    settings: &LoadSettings,
    mode: OpenMode,
    shutdown_tx: &ShutdownSender,
    before_start: impl FnOnce(),
) -> AppResult<EngineOutcome> {
    let sinks = RunSinks::open(&settings.sink_paths(), mode).await?;
    let connector = Arc::new(ReqwestConnector::new(
        settings.target_url()?,
        sinks.wants_bodies(),
    ));
    before_start();
    let mut stdout = tokio::io::stdout();
    let outcome = run_engine(settings, connector, sinks, shutdown_tx, &mut stdout).await?;
    log_runner_totals(&outcome);
    Ok(outcome)
}

fn log_runner_totals(outcome: &EngineOutcome) {
    let mut recorded: u64 = 0;
    let mut warmup: u64 = 0;
    let mut connections: u64 = 0;
    for stats in &outcome.runners {
        recorded = recorded.saturating_add(stats.recorded);
        warmup = warmup.saturating_add(stats.warmup_discarded);
        connections = connections.saturating_add(stats.connections);
    }
    tracing::debug!(
        "Runners finished: {} recorded, {} warmup, {} connections.",
        recorded,
        warmup,
        connections
    );
}

/// Single-process run: live lines on stdout, header and Final Report on
/// stderr. The Final Report is printed on completion and on interrupt.
///
/// # Errors
///
/// Returns an error for configuration problems found before the run and
/// for fatal runtime failures.
pub async fn run_standalone(settings: &LoadSettings, shutdown_tx: &ShutdownSender) -> AppResult<()> {
    let outcome = run_with_reqwest(settings, OpenMode::Truncate, shutdown_tx, || {
        print_header(settings);
    })
    .await?;
    if outcome.report.interrupted {
        tracing::info!("Interrupted; printing totals so far.");
    }
    FinalReport {
        totals: &outcome.report.totals,
        thresholds: &settings.buckets,
        expected_status: settings.expected_status,
        elapsed: outcome.elapsed,
        histogram: Some(&outcome.report.histogram),
    }
    .print();
    Ok(())
}

/// Worker process: report lines on stdout for the supervisor, then the
/// histogram trailer. An interrupted worker exits without a trailer.
///
/// # Errors
///
/// Returns an error for fatal runtime failures.
pub async fn run_worker(worker: &WorkerSettings, shutdown_tx: &ShutdownSender) -> AppResult<()> {
    let outcome =
        run_with_reqwest(&worker.settings, OpenMode::Append, shutdown_tx, || {}).await?;
    if outcome.report.interrupted {
        tracing::debug!("Worker {} interrupted.", worker.index);
        return Ok(());
    }
    let trailer = histogram_trailer(&outcome.report.histogram)?;
    let mut stdout = tokio::io::stdout();
    stdout.write_all(trailer.as_bytes()).await?;
    stdout.flush().await?;
    tracing::debug!(
        "Worker {} done after {} periods.",
        worker.index,
        outcome.report.periods
    );
    Ok(())
}
