pub(crate) const DEFAULT_HOST: &str = "127.0.0.1";
pub(crate) const DEFAULT_PORT: u16 = 80;
pub(crate) const DEFAULT_PATH: &str = "/";
pub(crate) const DEFAULT_BUCKETS: &str = "1,10,100";
pub(crate) const DEFAULT_STATUS: u16 = 200;
/// Empirical scheduler overhead shaved off each rate-limit period.
pub(crate) const DEFAULT_RATE_CORRECTION_US: u64 = 300;
