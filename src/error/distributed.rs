use thiserror::Error;

#[derive(Debug, Error)]
pub enum DistributedError {
    #[error("I/O error during {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to spawn worker {worker}: {source}")]
    Spawn {
        worker: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("Worker {worker} has no stdout pipe.")]
    MissingStdout { worker: usize },
    #[error("Malformed report line '{line}'.")]
    MalformedReport { line: String },
    #[error("Report for sequence {seq} has {actual} values, expected {expected}.")]
    ReportWidth {
        seq: u64,
        expected: usize,
        actual: usize,
    },
    #[error(
        "A worker fell too far behind: sequence {seq} is {capacity} or more periods past {next_expected}."
    )]
    SequenceDesync {
        seq: u64,
        next_expected: u64,
        capacity: usize,
    },
    #[error("Sequence {seq} was already flushed (next expected {next_expected}).")]
    StaleSequence { seq: u64, next_expected: u64 },
    #[error("Worker {worker} exited with {status}.")]
    WorkerFailed { worker: usize, status: String },
    #[error("Worker event channel closed.")]
    WorkerChannelClosed,
    #[cfg(test)]
    #[error("Test expectation failed: {message}")]
    TestExpectation { message: &'static str },
    #[cfg(test)]
    #[error("Test expectation failed: {message}: {value}")]
    TestExpectationValue {
        message: &'static str,
        value: String,
    },
}
