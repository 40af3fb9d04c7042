mod plan;

use std::ffi::OsString;

use clap::{CommandFactory, FromArgMatches};

use crate::args::LoadArgs;
use crate::error::AppResult;
use crate::shutdown_handlers::{setup_signal_shutdown_handler, shutdown_channel};
use plan::{build_plan, execute_plan};

/// Parses the command line, picks the process role and runs it on a
/// single-threaded runtime.
pub(crate) fn run() -> AppResult<()> {
    let raw_args: Vec<OsString> = std::env::args_os().collect();
    let matches = LoadArgs::command().get_matches_from(raw_args);
    let args = LoadArgs::from_arg_matches(&matches)?;

    let plan = build_plan(args, &matches)?;
    crate::logger::init_logging(plan.verbose());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let (shutdown_tx, _) = shutdown_channel();
        let signal_handle = setup_signal_shutdown_handler(&shutdown_tx);
        let result = execute_plan(plan, &shutdown_tx).await;
        if let Err(err) = &result {
            tracing::error!("{}", err);
        }
        signal_handle.abort();
        result
    })
}
