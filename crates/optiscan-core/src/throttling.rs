use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

use crate::config::RateLimit;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Request budget shared by every scheduler worker.
///
/// The concurrency cap bounds how many fetches are in flight; the budget bounds
/// how many start per second, which is what the venue actually meters.
#[derive(Clone)]
pub struct RateBudget {
    limiter: Arc<DirectRateLimiter>,
}

impl RateBudget {
    pub fn new(limit: RateLimit) -> Self {
        let quota = Quota::per_second(limit.per_second).allow_burst(limit.burst);
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Waits until one request may be issued.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}
