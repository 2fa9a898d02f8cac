use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Local request budget for quota-limited upstreams.
///
/// Over-budget calls fail fast with the wait until the next cell frees up;
/// they never touch the network.
#[derive(Clone)]
pub struct RequestBudget {
    limiter: Arc<DirectRateLimiter>,
    clock: DefaultClock,
}

impl RequestBudget {
    /// Allows `limit` calls per `window`, all of which may burst at once.
    pub fn new(window: Duration, limit: u32) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::direct(quota_from_window(window, limit))),
            clock: DefaultClock::default(),
        }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(Duration::from_secs(60), limit)
    }

    /// Consumes one cell, or returns how long until one is available.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        self.limiter
            .check()
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }
}

impl std::fmt::Debug for RequestBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBudget").finish_non_exhaustive()
    }
}

fn quota_from_window(window: Duration, limit: u32) -> Quota {
    let burst = NonZeroU32::new(limit).unwrap_or(NonZeroU32::MIN);

    let seconds_per_cell = (window.as_secs_f64() / f64::from(burst.get())).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}
