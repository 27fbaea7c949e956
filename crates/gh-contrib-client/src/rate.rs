//! Process-wide rate limit accounting
//!
//! Many repository workers read and write this state concurrently, so all
//! fields live behind a single lock. The request counter increments on
//! every call regardless of outcome.

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Mutex;

/// Quota as advertised by the upstream before any response is seen.
const DEFAULT_REMAINING: u64 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateSnapshot {
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
    pub requests: u64,
}

#[derive(Debug)]
struct Inner {
    remaining: u64,
    reset_at: DateTime<Utc>,
    requests: u64,
}

/// Shared quota tracker, updated from every response's rate-limit headers.
#[derive(Debug)]
pub struct RateState {
    inner: Mutex<Inner>,
}

impl Default for RateState {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                remaining: DEFAULT_REMAINING,
                reset_at: Utc::now(),
                requests: 0,
            }),
        }
    }
}

impl RateState {
    pub fn count_request(&self) {
        self.inner.lock().unwrap().requests += 1;
    }

    /// Record the quota headers of a response. Absent or unparsable values
    /// leave the corresponding field untouched.
    pub fn record(&self, remaining: Option<u64>, reset_epoch: Option<i64>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(remaining) = remaining {
            inner.remaining = remaining;
        }
        if let Some(epoch) = reset_epoch {
            if let Some(reset_at) = Utc.timestamp_opt(epoch, 0).single() {
                inner.reset_at = reset_at;
            }
        }
    }

    pub fn remaining(&self) -> u64 {
        self.inner.lock().unwrap().remaining
    }

    pub fn reset_at(&self) -> DateTime<Utc> {
        self.inner.lock().unwrap().reset_at
    }

    pub fn snapshot(&self) -> RateSnapshot {
        let inner = self.inner.lock().unwrap();
        RateSnapshot {
            remaining: inner.remaining,
            reset_at: inner.reset_at,
            requests: inner.requests,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_headers_and_counts_requests() {
        let rate = RateState::default();
        rate.count_request();
        rate.count_request();
        rate.record(Some(42), Some(1_700_000_000));

        let snap = rate.snapshot();
        assert_eq!(snap.requests, 2);
        assert_eq!(snap.remaining, 42);
        assert_eq!(snap.reset_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn absent_headers_leave_state_untouched() {
        let rate = RateState::default();
        rate.record(Some(7), Some(1_700_000_000));
        rate.record(None, None);

        assert_eq!(rate.remaining(), 7);
        assert_eq!(rate.reset_at().timestamp(), 1_700_000_000);
    }
}
