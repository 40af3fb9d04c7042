use std::time::Duration;

use crate::args::parsers::parse_duration;
use crate::error::ValidationError;
use crate::metrics::BucketThresholds;

use super::types::{BucketsValue, DurationValue};

pub(crate) fn parse_duration_value(value: &DurationValue) -> Result<Duration, ValidationError> {
    match value {
        DurationValue::Seconds(0) => Err(ValidationError::DurationZero),
        DurationValue::Seconds(secs) => Ok(Duration::from_secs(*secs)),
        DurationValue::Text(text) => parse_duration(text),
    }
}

pub(crate) fn parse_buckets_value(value: &BucketsValue) -> Result<BucketThresholds, ValidationError> {
    match value {
        BucketsValue::List(values) => BucketThresholds::new(values.clone()),
        BucketsValue::Text(text) => text.parse(),
    }
}
