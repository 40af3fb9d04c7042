use std::collections::VecDeque;
use std::future::Future;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Version;
use reqwest::header::{CONNECTION, HeaderMap, HeaderValue};
use tokio::sync::{broadcast, mpsc};
use url::Url;

use super::connection::peer_will_close;
use super::*;
use crate::error::{AppError, AppResult, HttpError};
use crate::metrics::{Outcome, RunnerEvent};

fn run_async_test<F>(future: F) -> AppResult<()>
where
    F: Future<Output = AppResult<()>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()?;
    runtime.block_on(future)
}

fn run_live_test<F>(future: F) -> AppResult<()>
where
    F: Future<Output = AppResult<()>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(future)
}

/// Answers one GET with `response`, then holds the socket until the client
/// goes away. Returns the base URL.
fn serve_once(response: &'static [u8], close_after: bool) -> AppResult<Url> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    std::thread::spawn(move || {
        let Ok((stream, _)) = listener.accept() else {
            return;
        };
        let Ok(mut writer) = stream.try_clone() else {
            return;
        };
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        while reader.read_line(&mut line).is_ok_and(|read| read > 0) {
            if line == "\r\n" {
                break;
            }
            line.clear();
        }
        if writer.write_all(response).is_err() || close_after {
            return;
        }
        let mut rest = String::new();
        while reader.read_line(&mut rest).is_ok_and(|read| read > 0) {
            rest.clear();
        }
    });
    Url::parse(&format!("http://{}/", addr))
        .map_err(|_err| AppError::http(HttpError::Scripted))
}

async fn fetch_once(url: Url) -> AppResult<Reply> {
    let connector = ReqwestConnector::new(url, true);
    let mut connection = connector.connect().await?;
    let reply = tokio::time::timeout(Duration::from_secs(5), connection.get())
        .await
        .map_err(|_err| AppError::http(HttpError::Scripted))??;
    Ok(reply)
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Reply(u16),
    ReplyAndClose(u16),
    Fail,
    Hang,
}

#[derive(Debug, Default)]
struct Script {
    steps: Mutex<VecDeque<Step>>,
    /// `(connection id, request number on that connection)` per dispatch.
    dispatches: Mutex<Vec<(u64, u64)>>,
    connections: AtomicU64,
}

impl Script {
    fn with_steps(steps: &[Step]) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.iter().copied().collect()),
            ..Self::default()
        })
    }

    fn dispatches(&self) -> AppResult<Vec<(u64, u64)>> {
        self.dispatches
            .lock()
            .map(|log| log.clone())
            .map_err(|_| AppError::http(HttpError::Scripted))
    }
}

struct ScriptedConnector {
    script: Arc<Script>,
}

struct ScriptedConnection {
    id: u64,
    requests: u64,
    script: Arc<Script>,
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Conn = ScriptedConnection;

    async fn connect(&self) -> AppResult<Self::Conn> {
        let id = self
            .script
            .connections
            .fetch_add(1, Ordering::Relaxed)
            .saturating_add(1);
        Ok(ScriptedConnection {
            id,
            requests: 0,
            script: Arc::clone(&self.script),
        })
    }
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn get(&mut self) -> Result<Reply, HttpError> {
        self.requests = self.requests.saturating_add(1);
        self.script
            .dispatches
            .lock()
            .map_err(|_| HttpError::Scripted)?
            .push((self.id, self.requests));
        let step = self
            .script
            .steps
            .lock()
            .map_err(|_| HttpError::Scripted)?
            .pop_front()
            .unwrap_or(Step::Reply(200));
        match step {
            Step::Reply(status) => Ok(Reply {
                status,
                body: None,
                peer_closed: false,
            }),
            Step::ReplyAndClose(status) => Ok(Reply {
                status,
                body: None,
                peer_closed: true,
            }),
            Step::Fail => Err(HttpError::Scripted),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
                Err(HttpError::Scripted)
            }
        }
    }
}

fn config(count_rpc: Option<u64>, warmup: u64, period: Option<Duration>) -> RunnerConfig {
    RunnerConfig {
        requests_per_connection: count_rpc,
        warmup,
        period,
        timeout: Duration::from_millis(100),
    }
}

async fn run_one(
    script: &Arc<Script>,
    config: RunnerConfig,
    limit: Option<u64>,
) -> AppResult<(RunnerStats, Vec<RunnerEvent>)> {
    let connector = Arc::new(ScriptedConnector {
        script: Arc::clone(script),
    });
    let budget = Arc::new(RequestBudget::new(limit));
    let (events_tx, mut events_rx) = mpsc::channel(64);
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let runner = Runner::new(0, config, connector, budget, events_tx);
    if runner.state() != RunnerState::Idle {
        return Err(AppError::http(HttpError::Scripted));
    }
    let stats = runner.run(shutdown_rx).await?;
    let mut events = Vec::new();
    while let Some(event) = events_rx.recv().await {
        events.push(event);
    }
    Ok((stats, events))
}

fn outcomes(events: &[RunnerEvent]) -> Vec<Option<Outcome>> {
    events
        .iter()
        .map(|event| match event {
            RunnerEvent::Completed(completion) => Some(completion.outcome),
            RunnerEvent::Closed => None,
        })
        .collect()
}

#[test]
fn dispatch_period_applies_correction() -> AppResult<()> {
    let correction = Duration::from_micros(300);
    if dispatch_period(0, correction).is_some() {
        return Err(AppError::http(HttpError::Scripted));
    }
    let cases = [
        (10, correction, Duration::from_micros(99_700)),
        (1_000, correction, Duration::from_micros(700)),
        (1_000_000, correction, Duration::from_micros(1)),
        (10, Duration::ZERO, Duration::from_millis(100)),
    ];
    for (qps, correction, expected) in cases {
        if dispatch_period(qps, correction) != Some(expected) {
            return Err(AppError::http(HttpError::Scripted));
        }
    }
    Ok(())
}

#[test]
fn budget_reserves_up_to_limit() -> AppResult<()> {
    let budget = RequestBudget::new(Some(2));
    if !budget.try_reserve() || !budget.try_reserve() || budget.try_reserve() {
        return Err(AppError::http(HttpError::Scripted));
    }
    if !budget.is_exhausted() || budget.reserved() != 2 {
        return Err(AppError::http(HttpError::Scripted));
    }
    let unlimited = RequestBudget::new(None);
    if !unlimited.try_reserve() || unlimited.is_exhausted() {
        return Err(AppError::http(HttpError::Scripted));
    }
    Ok(())
}

#[test]
fn warmup_completions_are_not_reported() -> AppResult<()> {
    run_async_test(async {
        let script = Script::with_steps(&[Step::Fail, Step::Hang]);
        let (stats, events) = run_one(&script, config(None, 2, None), Some(3)).await?;
        if stats.warmup_discarded != 2 || stats.recorded != 3 || stats.dispatched != 5 {
            return Err(AppError::http(HttpError::Scripted));
        }
        let expected = vec![Some(Outcome::Success { status: 200 }); 3];
        if outcomes(&events) != expected {
            return Err(AppError::http(HttpError::Scripted));
        }
        Ok(())
    })
}

#[test]
fn warmup_still_counts_toward_recycling() -> AppResult<()> {
    run_async_test(async {
        let script = Script::with_steps(&[]);
        let (stats, _) = run_one(&script, config(Some(2), 1, None), Some(2)).await?;
        if script.dispatches()? != [(1, 1), (1, 2), (2, 1)] || stats.connections != 2 {
            return Err(AppError::http(HttpError::Scripted));
        }
        Ok(())
    })
}

#[test]
fn connection_recycles_after_rpc_dispatches() -> AppResult<()> {
    run_async_test(async {
        let script = Script::with_steps(&[]);
        let (stats, events) = run_one(&script, config(Some(2), 0, None), Some(5)).await?;
        let dispatches = script.dispatches()?;
        if dispatches != [(1, 1), (1, 2), (2, 1), (2, 2), (3, 1)] {
            return Err(AppError::http(HttpError::Scripted));
        }
        if stats.connections != 3 || events.len() != 5 {
            return Err(AppError::http(HttpError::Scripted));
        }
        Ok(())
    })
}

#[test]
fn timeout_discards_connection_under_rate_limit() -> AppResult<()> {
    run_async_test(async {
        let script = Script::with_steps(&[Step::Reply(200), Step::Hang, Step::Reply(200)]);
        let period = dispatch_period(10, Duration::from_micros(300));
        let (stats, events) = run_one(&script, config(None, 0, period), Some(3)).await?;
        let expected = vec![
            Some(Outcome::Success { status: 200 }),
            Some(Outcome::Timeout),
            Some(Outcome::Success { status: 200 }),
        ];
        if outcomes(&events) != expected {
            return Err(AppError::http(HttpError::Scripted));
        }
        if script.dispatches()? != [(1, 1), (1, 2), (2, 1)] || stats.connections != 2 {
            return Err(AppError::http(HttpError::Scripted));
        }
        Ok(())
    })
}

#[test]
fn errors_do_not_reconnect() -> AppResult<()> {
    run_async_test(async {
        let script = Script::with_steps(&[Step::Fail, Step::Reply(500)]);
        let (stats, events) = run_one(&script, config(None, 0, None), Some(2)).await?;
        let expected = vec![Some(Outcome::Error), Some(Outcome::Success { status: 500 })];
        if outcomes(&events) != expected || stats.connections != 1 {
            return Err(AppError::http(HttpError::Scripted));
        }
        Ok(())
    })
}

#[test]
fn peer_close_reports_close_without_reconnecting() -> AppResult<()> {
    run_async_test(async {
        let script = Script::with_steps(&[Step::ReplyAndClose(200)]);
        let (stats, events) = run_one(&script, config(None, 0, None), Some(2)).await?;
        let expected = vec![
            None,
            Some(Outcome::Success { status: 200 }),
            Some(Outcome::Success { status: 200 }),
        ];
        if outcomes(&events) != expected || stats.connections != 1 {
            return Err(AppError::http(HttpError::Scripted));
        }
        Ok(())
    })
}

#[test]
fn rate_limit_paces_dispatches() -> AppResult<()> {
    run_async_test(async {
        let script = Script::with_steps(&[]);
        let started = tokio::time::Instant::now();
        let period = dispatch_period(10, Duration::ZERO);
        let (stats, _) = run_one(&script, config(None, 0, period), Some(3)).await?;
        let elapsed = started.elapsed();
        if stats.recorded != 3
            || elapsed < Duration::from_millis(300)
            || elapsed >= Duration::from_millis(400)
        {
            return Err(AppError::http(HttpError::Scripted));
        }
        Ok(())
    })
}

#[test]
fn runners_share_one_budget() -> AppResult<()> {
    run_async_test(async {
        let script = Script::with_steps(&[]);
        let connector = Arc::new(ScriptedConnector {
            script: Arc::clone(&script),
        });
        let budget = Arc::new(RequestBudget::new(Some(7)));
        let (events_tx, mut events_rx) = mpsc::channel(64);
        let (shutdown_tx, _) = broadcast::channel(1);
        let mut handles = Vec::new();
        for id in 0..3 {
            let runner = Runner::new(
                id,
                config(None, 0, None),
                Arc::clone(&connector),
                Arc::clone(&budget),
                events_tx.clone(),
            );
            handles.push(tokio::spawn(runner.run(shutdown_tx.subscribe())));
        }
        drop(events_tx);
        let mut recorded: u64 = 0;
        for handle in handles {
            recorded = recorded.saturating_add(handle.await??.recorded);
        }
        let mut events: u64 = 0;
        while events_rx.recv().await.is_some() {
            events = events.saturating_add(1);
        }
        if recorded != 7 || events != 7 {
            return Err(AppError::http(HttpError::Scripted));
        }
        Ok(())
    })
}

#[test]
fn shutdown_stops_unlimited_runner() -> AppResult<()> {
    run_async_test(async {
        let script = Script::with_steps(&[Step::Hang]);
        let connector = Arc::new(ScriptedConnector { script });
        let budget = Arc::new(RequestBudget::new(None));
        let (events_tx, _events_rx) = mpsc::channel(64);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let runner = Runner::new(0, config(None, 0, None), connector, budget, events_tx);
        let handle = tokio::spawn(runner.run(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx
            .send(())
            .map_err(|_| AppError::http(HttpError::Scripted))?;
        let stats = handle.await??;
        if stats.dispatched != 1 || stats.recorded != 0 {
            return Err(AppError::http(HttpError::Scripted));
        }
        Ok(())
    })
}

#[test]
fn warming_up_runner_stops_once_budget_is_spent() -> AppResult<()> {
    run_async_test(async {
        let script = Script::with_steps(&[]);
        let connector = Arc::new(ScriptedConnector {
            script: Arc::clone(&script),
        });
        let budget = Arc::new(RequestBudget::new(Some(1)));
        if !budget.try_reserve() {
            return Err(AppError::http(HttpError::Scripted));
        }
        let (events_tx, _events_rx) = mpsc::channel(64);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let period = dispatch_period(10, Duration::ZERO);
        let runner = Runner::new(0, config(None, 2, period), connector, budget, events_tx);
        let stats = runner.run(shutdown_rx).await?;
        if stats.dispatched != 0 || !script.dispatches()?.is_empty() {
            return Err(AppError::http(HttpError::Scripted));
        }
        Ok(())
    })
}

#[test]
fn peer_close_follows_connection_header_and_version() -> AppResult<()> {
    let mut close = HeaderMap::new();
    close.insert(CONNECTION, HeaderValue::from_static("Close"));
    let mut keep_alive = HeaderMap::new();
    keep_alive.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    let mut listed = HeaderMap::new();
    listed.insert(CONNECTION, HeaderValue::from_static("upgrade, close"));
    let none = HeaderMap::new();

    let cases = [
        (Version::HTTP_11, &none, false),
        (Version::HTTP_11, &keep_alive, false),
        (Version::HTTP_11, &close, true),
        (Version::HTTP_11, &listed, true),
        (Version::HTTP_10, &none, true),
        (Version::HTTP_10, &keep_alive, false),
        (Version::HTTP_10, &close, true),
    ];
    for (version, headers, expected) in cases {
        if peer_will_close(version, headers) != expected {
            return Err(AppError::http(HttpError::Scripted));
        }
    }
    Ok(())
}

#[test]
fn http10_reply_reports_peer_close() -> AppResult<()> {
    run_live_test(async {
        let url = serve_once(b"HTTP/1.0 200 OK\r\nContent-Length: 2\r\n\r\nok", true)?;
        let reply = fetch_once(url).await?;
        if reply.status != 200 || !reply.peer_closed {
            return Err(AppError::http(HttpError::Scripted));
        }
        if reply.body.as_deref() != Some(&b"ok"[..]) {
            return Err(AppError::http(HttpError::Scripted));
        }
        Ok(())
    })
}

#[test]
fn http11_keep_alive_reply_keeps_connection() -> AppResult<()> {
    run_live_test(async {
        let url = serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok", false)?;
        let reply = fetch_once(url).await?;
        if reply.status != 200 || reply.peer_closed {
            return Err(AppError::http(HttpError::Scripted));
        }
        Ok(())
    })
}

#[test]
fn connecting_does_not_stall_other_runners() -> AppResult<()> {
    run_live_test(async {
        let url = Url::parse("http://127.0.0.1:9/")
            .map_err(|_err| AppError::http(HttpError::Scripted))?;
        let connector = ReqwestConnector::new(url, false);
        let (stop_tx, mut stop_rx) = tokio::sync::oneshot::channel::<()>();

        // Stands in for another runner's in-flight request: every 2 ms wait
        // should take about 2 ms of wall time.
        let observer = tokio::spawn(async move {
            let mut worst = Duration::ZERO;
            loop {
                let started = Instant::now();
                tokio::select! {
                    _ = &mut stop_rx => break,
                    () = tokio::time::sleep(Duration::from_millis(2)) => {}
                }
                worst = worst.max(started.elapsed());
            }
            worst
        });

        for _ in 0..4 {
            drop(connector.connect().await?);
        }
        drop(stop_tx.send(()));
        let worst = observer.await?;
        if worst >= Duration::from_millis(50) {
            return Err(AppError::http(HttpError::Scripted));
        }
        Ok(())
    })
}
