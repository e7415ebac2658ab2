//! Alert delivery channels: a dyn-compatible async `send` trait plus a
//! shared sliding-window rate limiter each adapter owns.

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tw_core::FormattedAlert;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// A destination an alert can be delivered to.
pub trait AlertChannel: Send + Sync {
    fn name(&self) -> &str;
    fn send(&self, alert: &FormattedAlert) -> BoxFuture<'_, bool>;
}

/// Per-minute sliding-window limiter shared by the HTTP-backed channels.
pub struct RateLimiter {
    max_per_minute: usize,
    request_times: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_per_minute: usize) -> Self {
        Self {
            max_per_minute,
            request_times: Mutex::new(VecDeque::new()),
        }
    }

    /// Block until under the per-minute budget, then record this request.
    pub async fn acquire(&self) {
        let mut times = self.request_times.lock().await;
        let now = Instant::now();
        while times.front().is_some_and(|t| now.duration_since(*t) >= Duration::from_secs(60)) {
            times.pop_front();
        }

        if times.len() >= self.max_per_minute {
            let wait = Duration::from_secs(60).saturating_sub(now.duration_since(times[0]));
            if !wait.is_zero() {
                drop(times);
                tokio::time::sleep(wait).await;
                times = self.request_times.lock().await;
            }
        }

        times.push_back(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_under_budget_does_not_block() {
        let limiter = RateLimiter::new(30);
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
