//! Discord webhook channel: posts the rich embed, honoring 429s and a
//! bounded exponential-backoff retry.

use std::time::Duration;

use serde_json::json;
use tracing::{error, info, warn};
use tw_core::FormattedAlert;

use crate::channel::{AlertChannel, BoxFuture, RateLimiter};

pub const DEFAULT_RATE_LIMIT_PER_MINUTE: usize = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_SECS: f64 = 1.0;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

pub struct DiscordChannel {
    webhook_url: String,
    client: reqwest::Client,
    rate_limiter: RateLimiter,
    max_retries: u32,
    retry_delay_secs: f64,
}

impl DiscordChannel {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
            rate_limiter: RateLimiter::new(DEFAULT_RATE_LIMIT_PER_MINUTE),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
        }
    }

    async fn post(&self, alert: &FormattedAlert) -> bool {
        self.rate_limiter.acquire().await;

        let embed = &alert.discord_embed;
        let payload = json!({
            "embeds": [{
                "title": embed.title,
                "color": embed.color,
                "fields": embed.fields.iter().map(|f| json!({
                    "name": f.name,
                    "value": f.value,
                    "inline": f.inline,
                })).collect::<Vec<_>>(),
                "footer": { "text": embed.footer },
                "url": embed.url,
            }],
        });

        for attempt in 0..self.max_retries {
            let response = match self.client.post(&self.webhook_url).json(&payload).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(error = %e, attempt, "discord webhook request failed");
                    self.backoff(attempt).await;
                    continue;
                }
            };

            match response.status().as_u16() {
                204 => {
                    info!("discord alert delivered");
                    return true;
                }
                429 => {
                    let retry_after = response
                        .json::<serde_json::Value>()
                        .await
                        .ok()
                        .and_then(|v| v.get("retry_after").and_then(|r| r.as_f64()))
                        .unwrap_or(1.0);
                    warn!(retry_after, "discord rate limited");
                    tokio::time::sleep(Duration::from_secs_f64(retry_after)).await;
                }
                status => {
                    error!(status, "discord webhook failed");
                    self.backoff(attempt).await;
                }
            }
        }

        error!("discord delivery failed after all retries");
        false
    }

    async fn backoff(&self, attempt: u32) {
        if attempt + 1 < self.max_retries {
            let delay = self.retry_delay_secs * 2f64.powi(attempt as i32);
            tokio::time::sleep(Duration::from_secs_f64(delay)).await;
        }
    }
}

impl AlertChannel for DiscordChannel {
    fn name(&self) -> &str {
        "discord"
    }

    fn send(&self, alert: &FormattedAlert) -> BoxFuture<'_, bool> {
        let alert = alert.clone();
        Box::pin(async move { self.post(&alert).await })
    }
}
