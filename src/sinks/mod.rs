mod format;
mod writers;


pub use format::{RESPONSE_DELIMITER, timing_line};
pub use writers::{OpenMode, ResponseLog, RunSinks, SinkPaths, TimingLog};
