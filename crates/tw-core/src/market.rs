//! Market catalog metadata, as cached by the metadata sync worker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketCategory {
    Politics,
    Crypto,
    Sports,
    Entertainment,
    Finance,
    Tech,
    Science,
    Other,
}

impl MarketCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            MarketCategory::Politics => "politics",
            MarketCategory::Crypto => "crypto",
            MarketCategory::Sports => "sports",
            MarketCategory::Entertainment => "entertainment",
            MarketCategory::Finance => "finance",
            MarketCategory::Tech => "tech",
            MarketCategory::Science => "science",
            MarketCategory::Other => "other",
        }
    }

    /// Keyword-match a market title/question into a category. Falls back to
    /// `Other` when nothing matches; first match wins in the order listed.
    pub fn derive(title: &str) -> MarketCategory {
        let lower = title.to_ascii_lowercase();
        const KEYWORDS: &[(MarketCategory, &[&str])] = &[
            (
                MarketCategory::Politics,
                &["election", "president", "senate", "congress", "governor", "vote"],
            ),
            (
                MarketCategory::Crypto,
                &["bitcoin", "btc", "ethereum", "eth", "crypto", "token", "defi"],
            ),
            (
                MarketCategory::Sports,
                &["nfl", "nba", "mlb", "soccer", "football", "championship", "match", "game"],
            ),
            (
                MarketCategory::Entertainment,
                &["movie", "oscar", "grammy", "celebrity", "album", "box office"],
            ),
            (
                MarketCategory::Finance,
                &["fed", "interest rate", "inflation", "stock", "s&p", "recession"],
            ),
            (
                MarketCategory::Tech,
                &["ai", "openai", "apple", "google", "microsoft", "spacex", "tesla"],
            ),
            (
                MarketCategory::Science,
                &["nasa", "climate", "vaccine", "research", "discovery"],
            ),
        ];
        for (category, keywords) in KEYWORDS {
            if keywords.iter().any(|kw| lower.contains(kw)) {
                return *category;
            }
        }
        MarketCategory::Other
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketMetadata {
    pub condition_id: String,
    pub question: String,
    pub description: String,
    pub end_date: Option<DateTime<Utc>>,
    pub active: bool,
    pub closed: bool,
    pub category: MarketCategory,
    pub cached_at: DateTime<Utc>,
}

impl MarketMetadata {
    /// A minimal stand-in used when the real catalog entry is unavailable.
    /// Category `Other` is deliberately treated as niche by the size-anomaly
    /// detector when volume data is also missing.
    pub fn placeholder(condition_id: impl Into<String>) -> MarketMetadata {
        MarketMetadata {
            condition_id: condition_id.into(),
            question: String::new(),
            description: String::new(),
            end_date: None,
            active: true,
            closed: false,
            category: MarketCategory::Other,
            cached_at: Utc::now(),
        }
    }

    pub fn is_expired(&self, ttl_secs: i64) -> bool {
        (Utc::now() - self.cached_at).num_seconds() >= ttl_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_politics_category() {
        assert_eq!(
            MarketCategory::derive("Will the President win re-election?"),
            MarketCategory::Politics
        );
    }

    #[test]
    fn falls_back_to_other() {
        assert_eq!(MarketCategory::derive("Will it rain on Tuesday?"), MarketCategory::Other);
    }

    #[test]
    fn placeholder_is_niche_category() {
        let m = MarketMetadata::placeholder("0xabc");
        assert_eq!(m.category, MarketCategory::Other);
    }
}
