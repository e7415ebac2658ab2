//! Token-bucket rate limiter for outbound RPC calls.

use std::time::Instant;

use parking_lot::Mutex;

struct Bucket {
    max_tokens: f64,
    refill_rate: f64,
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;
    }
}

/// Token bucket rate limiter, mirroring `chain.py`'s `RateLimiter`.
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(max_requests_per_second: f64) -> Self {
        Self {
            bucket: Mutex::new(Bucket {
                max_tokens: max_requests_per_second,
                refill_rate: max_requests_per_second,
                tokens: max_requests_per_second,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Acquire one token, sleeping in small increments until available.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock();
                bucket.refill();
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }
                (1.0 - bucket.tokens) / bucket.refill_rate
            };
            tokio::time::sleep(std::time::Duration::from_secs_f64(wait.max(0.001))).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_drains_and_refills() {
        let limiter = RateLimiter::new(5.0);
        for _ in 0..5 {
            limiter.acquire().await;
        }
        // Sixth acquire must wait for refill rather than panicking or erroring.
        limiter.acquire().await;
    }
}
