mod app;
mod args;
mod config;
mod distributed;
mod entry;
mod error;
mod http;
mod logger;
mod metrics;
mod report;
mod shutdown;
mod shutdown_handlers;
mod sinks;

use error::AppResult;

fn main() -> AppResult<()> {
    entry::run()
}
