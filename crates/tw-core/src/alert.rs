//! Formatted alert renderings and the persisted audit record.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discord-style rich embed, built from a [`crate::signal::RiskAssessment`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordEmbed {
    pub title: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    pub footer: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Pre-rendered payloads for each channel kind, plus a link map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormattedAlert {
    pub title: String,
    pub body: String,
    pub discord_embed: DiscordEmbed,
    pub telegram_markdown: String,
    pub plain_text: String,
    pub links: HashMap<String, String>,
}

/// Persisted audit entry for one dispatched assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub assessment_id: String,
    pub wallet_address: String,
    pub market_id: String,
    pub weighted_score: f64,
    pub signals_triggered: u8,
    pub channels_attempted: Vec<String>,
    pub channels_succeeded: Vec<String>,
    pub dedup_key: String,
    pub user_feedback: Option<bool>,
    pub created_at: DateTime<Utc>,
}
