//! Connections, pacing and the per-connection Runner.
mod budget;
mod connection;
mod rate;
mod runner;

#[cfg(test)]
mod tests;

pub use budget::RequestBudget;
pub use connection::{Connection, Connector, Reply, ReqwestConnection, ReqwestConnector};
pub use rate::dispatch_period;
pub use runner::{NextAction, Runner, RunnerConfig, RunnerState, RunnerStats};
