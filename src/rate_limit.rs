// 🚦 Request Rate Limiter - admission control in front of screening
//
// Token bucket: `limit` tokens of burst, one token back every `threshold`.
// One bucket per limiter instance, shared by every request that holds it.
// Denial is immediate, callers never wait for capacity.

use crate::error::ScreenerError;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::time::Duration;

pub struct RequestRateLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    limit: u32,
    threshold: Duration,
}

impl RequestRateLimiter {
    pub fn new(limit: u32, threshold: Duration) -> Result<Self, ScreenerError> {
        let burst = NonZeroU32::new(limit)
            .ok_or_else(|| ScreenerError::Config("rate limit must be greater than zero".into()))?;
        let quota = Quota::with_period(threshold)
            .ok_or_else(|| ScreenerError::Config("rate limit threshold must be non-zero".into()))?
            .allow_burst(burst);

        Ok(RequestRateLimiter {
            limiter: RateLimiter::direct(quota),
            limit,
            threshold,
        })
    }

    /// Consume one token if available.
    pub fn allow(&self) -> bool {
        self.limiter.check().is_ok()
    }

    /// Like `allow`, but as an error for `?` call sites.
    pub fn admit(&self) -> Result<(), ScreenerError> {
        if self.allow() {
            Ok(())
        } else {
            Err(ScreenerError::RateLimited)
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }
}

impl std::fmt::Debug for RequestRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestRateLimiter")
            .field("limit", &self.limit)
            .field("threshold", &self.threshold)
            .finish()
    }
}
