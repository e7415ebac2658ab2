//! Telegram Bot API channel: posts `telegram_markdown` with MarkdownV2
//! parsing, honoring Telegram's `error_code: 429` rate-limit responses.

use std::time::Duration;

use serde_json::json;
use tracing::{error, info, warn};
use tw_core::FormattedAlert;

use crate::channel::{AlertChannel, BoxFuture, RateLimiter};

pub const DEFAULT_RATE_LIMIT_PER_MINUTE: usize = 20;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_SECS: f64 = 1.0;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

pub struct TelegramChannel {
    api_url: String,
    chat_id: String,
    client: reqwest::Client,
    rate_limiter: RateLimiter,
    max_retries: u32,
    retry_delay_secs: f64,
}

impl TelegramChannel {
    pub fn new(bot_token: impl AsRef<str>, chat_id: impl Into<String>) -> Self {
        Self {
            api_url: format!("https://api.telegram.org/bot{}/sendMessage", bot_token.as_ref()),
            chat_id: chat_id.into(),
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

        let payload = json!({
            "chat_id": self.chat_id,
            "text": alert.telegram_markdown,
            "parse_mode": "MarkdownV2",
            "disable_web_page_preview": false,
        });

        for attempt in 0..self.max_retries {
            let response = match self.client.post(&self.api_url).json(&payload).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(error = %e, attempt, "telegram api request failed");
                    self.backoff(attempt).await;
                    continue;
                }
            };

            let body: serde_json::Value = match response.json().await {
                Ok(b) => b,
                Err(e) => {
                    error!(error = %e, "telegram response decode failed");
                    self.backoff(attempt).await;
                    continue;
                }
            };

            if body.get("ok").and_then(|v| v.as_bool()).unwrap_or(false) {
                info!("telegram alert delivered");
                return true;
            }

            let error_code = body.get("error_code").and_then(|v| v.as_i64()).unwrap_or(0);
            let description = body.get("description").and_then(|v| v.as_str()).unwrap_or("unknown error");

            if error_code == 429 {
                let retry_after = body
                    .get("parameters")
                    .and_then(|p| p.get("retry_after"))
                    .and_then(|r| r.as_f64())
                    .unwrap_or(1.0);
                warn!(retry_after, "telegram rate limited");
                tokio::time::sleep(Duration::from_secs_f64(retry_after)).await;
                continue;
            }

            error!(error_code, description, "telegram api error");
            self.backoff(attempt).await;
        }

        error!("telegram delivery failed after all retries");
        false
    }

    async fn backoff(&self, attempt: u32) {
        if attempt + 1 < self.max_retries {
            let delay = self.retry_delay_secs * 2f64.powi(attempt as i32);
            tokio::time::sleep(Duration::from_secs_f64(delay)).await;
        }
    }
}

impl AlertChannel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn send(&self, alert: &FormattedAlert) -> BoxFuture<'_, bool> {
        let alert = alert.clone();
        Box::pin(async move { self.post(&alert).await })
    }
}
