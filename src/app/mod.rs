mod engine;
mod roles;


pub use engine::{EngineOutcome, run_engine};
pub use roles::{run_standalone, run_worker};
