//! Human-readable output: stream header, merged lines, Final Report.
mod live;
mod summary;


pub use live::{aggregate_line, column_header, params_line, rate_per_second};
pub use summary::FinalReport;

use crate::config::LoadSettings;

/// Prints the parameter line and the column header to stderr.
pub fn print_header(settings: &LoadSettings) {
    eprintln!("{}", params_line(settings));
    eprintln!("{}", column_header(&settings.buckets, settings.expected_status));
}
