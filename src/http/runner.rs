use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, Interval};

use crate::error::{AppResult, HttpError};
use crate::metrics::{Completion, Outcome, RunnerEvent};

use super::budget::RequestBudget;
use super::connection::{Connection, Connector, Reply};
use super::rate::pacer;

/// Per-runner scheduling parameters.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub requests_per_connection: Option<u64>,
    pub warmup: u64,
    /// Rate-limit period; `None` dispatches back to back.
    pub period: Option<Duration>,
    /// Fixed deadline for every request.
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Dispatching,
    AwaitingCompletion,
    Reconnecting,
    Stopped,
}

/// What the completion handler wants the runner to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    Continue,
    Reconnect,
    Stop,
}

/// Bookkeeping a runner hands back when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunnerStats {
    pub dispatched: u64,
    pub recorded: u64,
    pub warmup_discarded: u64,
    pub connections: u64,
}

/// One in-flight request.
#[derive(Debug)]
struct Request {
    started_at: SystemTime,
    start: Instant,
    deadline: Instant,
    /// Counts toward measurements (not a warmup request).
    measured: bool,
}

impl Request {
    fn begin(timeout: Duration, measured: bool) -> Self {
        let start = Instant::now();
        Self {
            started_at: SystemTime::now(),
            start,
            deadline: start.checked_add(timeout).unwrap_or(start),
            measured,
        }
    }

    fn finish(self, outcome: Outcome, body: Option<bytes::Bytes>) -> Completion {
        let latency = self.start.elapsed();
        Completion {
            outcome,
            started_at: self.started_at,
            finished_at: self.started_at.checked_add(latency).unwrap_or(self.started_at),
            latency,
            body,
        }
    }
}

/// Owns one connection slot and drives requests over it.
pub struct Runner<C: Connector> {
    id: usize,
    config: RunnerConfig,
    connector: Arc<C>,
    connection: Option<C::Conn>,
    in_flight: Option<Request>,
    /// Dispatches on the current connection.
    reqno: u64,
    warmup_remaining: u64,
    state: RunnerState,
    budget: Arc<RequestBudget>,
    events: mpsc::Sender<RunnerEvent>,
    stats: RunnerStats,
}

impl<C: Connector> Runner<C> {
    #[must_use]
    pub fn new(
        id: usize,
        config: RunnerConfig,
        connector: Arc<C>,
        budget: Arc<RequestBudget>,
        events: mpsc::Sender<RunnerEvent>,
    ) -> Self {
        let warmup_remaining = config.warmup;
        Self {
            id,
            config,
            connector,
            connection: None,
            in_flight: None,
            reqno: 0,
            warmup_remaining,
            state: RunnerState::Idle,
            budget,
            events,
            stats: RunnerStats::default(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> RunnerState {
        self.state
    }

    /// Runs until the request budget is spent, the reporter goes away, or a
    /// shutdown signal arrives.
    ///
    /// # Errors
    ///
    /// Returns an error when a connection cannot be acquired.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) -> AppResult<RunnerStats> {
        let mut pacer = self.config.period.map(pacer);
        self.state = RunnerState::Reconnecting;

        loop {
            self.state = match self.state {
                RunnerState::Reconnecting => {
                    self.reconnect().await?;
                    RunnerState::Idle
                }
                RunnerState::Idle => self.idle(pacer.as_mut(), &mut shutdown_rx).await,
                RunnerState::Dispatching => self.begin_request(),
                RunnerState::AwaitingCompletion => self.await_completion(&mut shutdown_rx).await,
                RunnerState::Stopped => break,
            };
        }

        self.connection = None;
        Ok(self.stats)
    }

    /// Waits for the next dispatch slot.
    async fn idle(
        &mut self,
        pacer: Option<&mut Interval>,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> RunnerState {
        if self.budget.is_exhausted() {
            return RunnerState::Stopped;
        }
        if self.needs_recycle() {
            tracing::debug!(
                "Runner {} recycling connection after {} requests.",
                self.id,
                self.reqno
            );
            return RunnerState::Reconnecting;
        }
        if let Some(pacer) = pacer {
            tokio::select! {
                _ = shutdown_rx.recv() => return RunnerState::Stopped,
                _ = pacer.tick() => {}
            }
        }
        RunnerState::Dispatching
    }

    /// Claims budget for the next request and starts its clock.
    fn begin_request(&mut self) -> RunnerState {
        if self.budget.is_exhausted() {
            return RunnerState::Stopped;
        }
        let measured = self.warmup_remaining == 0;
        if measured && !self.budget.try_reserve() {
            return RunnerState::Stopped;
        }
        self.in_flight = Some(Request::begin(self.config.timeout, measured));
        RunnerState::AwaitingCompletion
    }

    async fn await_completion(&mut self, shutdown_rx: &mut broadcast::Receiver<()>) -> RunnerState {
        let Some(request) = self.in_flight.take() else {
            return RunnerState::Idle;
        };
        let result = tokio::select! {
            _ = shutdown_rx.recv() => return RunnerState::Stopped,
            result = self.send(request.deadline) => result,
        };
        match self.complete(request, result).await {
            NextAction::Continue => RunnerState::Idle,
            NextAction::Reconnect => RunnerState::Reconnecting,
            NextAction::Stop => RunnerState::Stopped,
        }
    }

    fn needs_recycle(&self) -> bool {
        self.config
            .requests_per_connection
            .is_some_and(|limit| self.reqno >= limit)
    }

    async fn reconnect(&mut self) -> AppResult<()> {
        self.connection = None;
        self.connection = Some(self.connector.connect().await?);
        self.reqno = 0;
        self.stats.connections = self.stats.connections.saturating_add(1);
        Ok(())
    }

    /// Sends one GET and waits for it until `deadline`.
    /// `None` means the deadline fired first.
    async fn send(&mut self, deadline: Instant) -> Option<Result<Reply, HttpError>> {
        self.reqno = self.reqno.saturating_add(1);
        self.stats.dispatched = self.stats.dispatched.saturating_add(1);
        let Some(connection) = self.connection.as_mut() else {
            return Some(Err(HttpError::NoConnection { runner: self.id }));
        };
        tokio::time::timeout_at(deadline, connection.get()).await.ok()
    }

    /// Completion handler: classifies the outcome, reports it unless the
    /// runner is still warming up, and picks the next action.
    async fn complete(
        &mut self,
        request: Request,
        result: Option<Result<Reply, HttpError>>,
    ) -> NextAction {
        let measured = request.measured;
        let (outcome, body, peer_closed, mut next) = match result {
            Some(Ok(reply)) => (
                Outcome::Success {
                    status: reply.status,
                },
                reply.body,
                reply.peer_closed,
                NextAction::Continue,
            ),
            Some(Err(err)) => {
                tracing::debug!("Runner {} request failed: {}", self.id, err);
                (Outcome::Error, None, false, NextAction::Continue)
            }
            None => {
                tracing::debug!("Runner {} request timed out; reconnecting.", self.id);
                (Outcome::Timeout, None, false, NextAction::Reconnect)
            }
        };
        let completion = request.finish(outcome, body);

        if peer_closed && self.events.send(RunnerEvent::Closed).await.is_err() {
            return NextAction::Stop;
        }

        if measured {
            if self
                .events
                .send(RunnerEvent::Completed(completion))
                .await
                .is_err()
            {
                return NextAction::Stop;
            }
            self.stats.recorded = self.stats.recorded.saturating_add(1);
        } else {
            self.warmup_remaining = self.warmup_remaining.saturating_sub(1);
            self.stats.warmup_discarded = self.stats.warmup_discarded.saturating_add(1);
        }

        if self.budget.is_exhausted() {
            next = NextAction::Stop;
        }
        next
    }
}
