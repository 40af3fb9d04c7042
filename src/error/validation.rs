use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Bucket list must not be empty.")]
    BucketsEmpty,
    #[error("Invalid bucket '{value}': {source}")]
    InvalidBucket {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("First bucket must be > 0.")]
    FirstBucketZero,
    #[error("Invalid bucket specification: {value} does not exceed {previous}.")]
    BucketsNotAscending { previous: u64, value: u64 },
    #[error("Too many buckets ({count}); at most {max} are supported.")]
    TooManyBuckets { count: usize, max: usize },
    #[error("Duration must not be empty.")]
    DurationEmpty,
    #[error("Invalid duration '{value}'.")]
    InvalidDurationFormat { value: String },
    #[error("Invalid duration '{value}': {source}")]
    InvalidDurationNumber {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Duration overflow.")]
    DurationOverflow,
    #[error("Invalid duration unit '{unit}'.")]
    InvalidDurationUnit { unit: String },
    #[error("Duration must be > 0.")]
    DurationZero,
    #[error("Value must be >= {min}.")]
    ValueTooSmall { min: u64 },
    #[error("Invalid value: {source}")]
    InvalidNumber {
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Request path must start with '/': '{value}'.")]
    InvalidPath { value: String },
    #[error("Invalid target '{target}': {source}")]
    InvalidTarget {
        target: String,
        #[source]
        source: url::ParseError,
    },
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
