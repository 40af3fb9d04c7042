use serde::{Deserialize, Serialize};

use crate::config::LoadSettings;
use crate::error::AppResult;

/// Bootstrap payload handed to a worker process on its command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSettings {
    pub index: usize,
    pub verbose: bool,
    pub settings: LoadSettings,
}

impl WorkerSettings {
    /// # Errors
    ///
    /// Returns an error when serialization fails.
    pub fn to_json(&self) -> AppResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// # Errors
    ///
    /// Returns an error when the payload is not valid worker settings.
    pub fn from_json(payload: &str) -> AppResult<Self> {
        Ok(serde_json::from_str(payload)?)
    }
}

/// Settings for every worker that has work to do.
#[must_use]
pub fn plan_workers(settings: &LoadSettings, verbose: bool) -> Vec<WorkerSettings> {
    (0..settings.procs)
        .filter_map(|index| {
            settings.for_worker(index).map(|worker| WorkerSettings {
                index,
                verbose,
                settings: worker,
            })
        })
        .collect()
}
