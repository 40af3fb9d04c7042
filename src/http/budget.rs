use std::sync::atomic::{AtomicU64, Ordering};

/// Shared total-request limit of one process.
///
/// Runners reserve a slot before dispatching a measured request, so the
/// number of recorded completions never exceeds the limit.
#[derive(Debug)]
pub struct RequestBudget {
    limit: Option<u64>,
    reserved: AtomicU64,
}

impl RequestBudget {
    #[must_use]
    pub const fn new(limit: Option<u64>) -> Self {
        Self {
            limit,
            reserved: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn try_reserve(&self) -> bool {
        let Some(limit) = self.limit else {
            return true;
        };
        loop {
            let current = self.reserved.load(Ordering::Relaxed);
            if current >= limit {
                return false;
            }
            let Some(next) = current.checked_add(1) else {
                return false;
            };
            if self
                .reserved
                .compare_exchange(current, next, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.limit
            .is_some_and(|limit| self.reserved.load(Ordering::Relaxed) >= limit)
    }

    #[cfg(test)]
    #[must_use]
    pub fn reserved(&self) -> u64 {
        self.reserved.load(Ordering::Relaxed)
    }
}
