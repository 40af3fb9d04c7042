use clap::ArgMatches;

use crate::app::{run_standalone, run_worker};
use crate::args::LoadArgs;
use crate::config::{LoadSettings, apply_config, load_config};
use crate::distributed::{WorkerSettings, run_supervisor};
use crate::error::AppResult;
use crate::shutdown::ShutdownSender;

pub(super) enum RunPlan {
    Standalone {
        settings: LoadSettings,
        verbose: bool,
    },
    Supervisor {
        settings: LoadSettings,
        verbose: bool,
    },
    Worker(WorkerSettings),
}

impl RunPlan {
    pub(super) const fn verbose(&self) -> bool {
        match self {
            RunPlan::Standalone { verbose, .. } | RunPlan::Supervisor { verbose, .. } => *verbose,
            RunPlan::Worker(worker) => worker.verbose,
        }
    }
}

pub(super) fn build_plan(mut args: LoadArgs, matches: &ArgMatches) -> AppResult<RunPlan> {
    if let Some(payload) = args.worker_settings.as_deref() {
        return Ok(RunPlan::Worker(WorkerSettings::from_json(payload)?));
    }

    if let Some(config) = load_config(args.config.as_deref())? {
        apply_config(&mut args, matches, &config)?;
    }
    let settings = LoadSettings::from_args(&args)?;
    let verbose = args.verbose;
    if settings.procs > 1 {
        Ok(RunPlan::Supervisor { settings, verbose })
    } else {
        Ok(RunPlan::Standalone { settings, verbose })
    }
}

pub(super) async fn execute_plan(plan: RunPlan, shutdown_tx: &ShutdownSender) -> AppResult<()> {
    match plan {
        RunPlan::Standalone { settings, .. } => run_standalone(&settings, shutdown_tx).await,
        RunPlan::Supervisor { settings, verbose } => {
            run_supervisor(&settings, verbose, shutdown_tx).await
        }
        RunPlan::Worker(worker) => {
            tracing::debug!("Worker {} starting.", worker.index);
            run_worker(&worker, shutdown_tx).await
        }
    }
}
