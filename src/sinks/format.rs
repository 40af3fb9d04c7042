use crate::metrics::Completion;

/// Delimiter line written after each body in the response log.
pub const RESPONSE_DELIMITER: &[u8] = b"---\n";

/// `start_micros<TAB>end_micros<TAB>outcome_code`
#[must_use]
pub fn timing_line(completion: &Completion) -> String {
    format!(
        "{}\t{}\t{}\n",
        completion.start_micros(),
        completion.end_micros(),
        completion.outcome.code()
    )
}
