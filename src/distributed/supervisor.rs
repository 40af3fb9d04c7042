use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc;

use crate::config::LoadSettings;
use crate::error::{AppError, AppResult, DistributedError};
use crate::report::{FinalReport, print_header};
use crate::shutdown::ShutdownSender;
use crate::sinks::{OpenMode, RunSinks};

use super::aggregator::Aggregator;
use super::ring::RING_CAPACITY;
use super::wire::{WorkerSettings, plan_workers};

/// Flag that turns the executable into a worker.
pub const WORKER_SETTINGS_FLAG: &str = "--worker-settings";

const WORKER_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
enum WorkerMessage {
    Line { worker: usize, line: String },
    Finished { worker: usize },
    ReadFailed { worker: usize, source: std::io::Error },
}

struct SpawnedWorker {
    index: usize,
    child: Child,
}

fn spawn_worker(worker: &WorkerSettings) -> AppResult<(SpawnedWorker, ChildStdout)> {
    let exe = std::env::current_exe().map_err(|source| {
        AppError::distributed(DistributedError::Io {
            context: "locate executable",
            source,
        })
    })?;
    let payload = worker.to_json()?;
    let mut child = Command::new(exe)
        .arg(WORKER_SETTINGS_FLAG)
        .arg(payload)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| {
            AppError::distributed(DistributedError::Spawn {
                worker: worker.index,
                source,
            })
        })?;
    let stdout = child.stdout.take().ok_or_else(|| {
        AppError::distributed(DistributedError::MissingStdout {
            worker: worker.index,
        })
    })?;
    tracing::info!(
        "Spawned worker {} (pid {:?}, count {:?}).",
        worker.index,
        child.id(),
        worker.settings.count
    );
    Ok((
        SpawnedWorker {
            index: worker.index,
            child,
        },
        stdout,
    ))
}

fn forward_lines(
    slot: usize,
    stdout: ChildStdout,
    tx: mpsc::Sender<WorkerMessage>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        let message = loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx
                        .send(WorkerMessage::Line { worker: slot, line })
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
                Ok(None) => break WorkerMessage::Finished { worker: slot },
                Err(source) => {
                    break WorkerMessage::ReadFailed {
                        worker: slot,
                        source,
                    };
                }
            }
        };
        drop(tx.send(message).await);
    })
}

async fn emit_lines<W>(out: &mut W, lines: &[String]) -> AppResult<()>
where
    W: AsyncWrite + Unpin,
{
    for line in lines {
        out.write_all(line.as_bytes()).await?;
    }
    if !lines.is_empty() {
        out.flush().await?;
    }
    Ok(())
}

fn print_final_report(settings: &LoadSettings, aggregator: &Aggregator, started: Instant) {
    FinalReport {
        totals: aggregator.totals(),
        thresholds: &settings.buckets,
        expected_status: settings.expected_status,
        elapsed: started.elapsed(),
        histogram: Some(aggregator.histogram()),
    }
    .print();
}

/// Runs a multi-process load test: spawns the workers, merges their
/// report streams and prints the Final Report.
///
/// # Errors
///
/// Returns an error when a worker cannot be spawned, a report line is
/// malformed, the workers fall out of step, or a worker exits unsuccessfully.
pub async fn run_supervisor(
    settings: &LoadSettings,
    verbose: bool,
    shutdown_tx: &ShutdownSender,
) -> AppResult<()> {
    // Create or truncate the logs once; workers append.
    drop(RunSinks::open(&settings.sink_paths(), OpenMode::Truncate).await?);

    let workers = plan_workers(settings, verbose);
    print_header(settings);
    let started = Instant::now();
    let mut aggregator = Aggregator::new(
        workers.len(),
        settings.buckets.slots(),
        RING_CAPACITY,
        started,
    )?;

    let (tx, mut rx) = mpsc::channel::<WorkerMessage>(WORKER_CHANNEL_CAPACITY);
    let mut children = Vec::with_capacity(workers.len());
    let mut readers = Vec::with_capacity(workers.len());
    for (slot, worker) in workers.iter().enumerate() {
        let (spawned, stdout) = spawn_worker(worker)?;
        readers.push(forward_lines(slot, stdout, tx.clone()));
        children.push(spawned);
    }
    drop(tx);

    let mut shutdown_rx = shutdown_tx.subscribe();
    let mut stdout = tokio::io::stdout();
    let mut remaining = children.len();

    while remaining > 0 {
        let message = tokio::select! {
            _ = shutdown_rx.recv() => {
                tracing::info!("Interrupted; stopping workers.");
                print_final_report(settings, &aggregator, started);
                return Ok(());
            }
            message = rx.recv() => message,
        };
        let Some(message) = message else {
            return Err(AppError::distributed(DistributedError::WorkerChannelClosed));
        };
        let now = Instant::now();
        let timestamp = chrono::Utc::now().timestamp();
        let lines = match message {
            WorkerMessage::Line { worker, line } => {
                aggregator.on_line(worker, &line, now, timestamp)?
            }
            WorkerMessage::Finished { worker } => {
                remaining = remaining.saturating_sub(1);
                tracing::debug!("Worker stream {} ended.", worker);
                aggregator.on_finished(worker, now, timestamp)?
            }
            WorkerMessage::ReadFailed { worker, source } => {
                tracing::error!("Failed to read worker {} output: {}", worker, source);
                return Err(AppError::distributed(DistributedError::Io {
                    context: "read worker output",
                    source,
                }));
            }
        };
        emit_lines(&mut stdout, &lines).await?;
    }

    let pending = aggregator.ring().pending();
    if !pending.is_empty() {
        tracing::warn!("Periods never completed by every worker: {:?}", pending);
    }

    for reader in readers {
        reader.await?;
    }
    let mut failure = None;
    for mut spawned in children {
        let status = spawned.child.wait().await.map_err(|source| {
            AppError::distributed(DistributedError::Io {
                context: "wait for worker",
                source,
            })
        })?;
        if !status.success() && failure.is_none() {
            tracing::error!("Worker {} exited with {}.", spawned.index, status);
            failure = Some(DistributedError::WorkerFailed {
                worker: spawned.index,
                status: status.to_string(),
            });
        }
    }

    print_final_report(settings, &aggregator, started);
    failure.map_or(Ok(()), |err| Err(AppError::distributed(err)))
}
