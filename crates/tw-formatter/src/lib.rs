//! Renders a [`RiskAssessment`] into the three alert payloads the dispatcher
//! ships to Discord, Telegram, and plain-text channels.

use std::collections::HashMap;

use tw_core::{DiscordEmbed, EmbedField, FormattedAlert, RiskAssessment};

const POLYMARKET_MARKET_URL: &str = "https://polymarket.com/event/";
const POLYGONSCAN_ADDRESS_URL: &str = "https://polygonscan.com/address/";

const COLOR_HIGH_RISK: u32 = 0xE74C3C;
const COLOR_MEDIUM_RISK: u32 = 0xE67E22;
const COLOR_LOW_RISK: u32 = 0xFFFF00;

const HIGH_RISK_THRESHOLD: f64 = 0.7;
const MEDIUM_RISK_THRESHOLD: f64 = 0.5;

const MARKDOWN_SPECIAL_CHARS: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Compact,
    Detailed,
}

pub fn truncate_address(address: &str, chars: usize) -> String {
    if address.len() < chars * 2 + 4 {
        return address.to_string();
    }
    format!("{}...{}", &address[..chars + 2], &address[address.len() - chars..])
}

pub fn format_usdc(amount: rust_decimal::Decimal) -> String {
    format!("${:.2}", amount)
}

pub fn risk_level(score: f64) -> &'static str {
    if score >= HIGH_RISK_THRESHOLD {
        "HIGH"
    } else if score >= MEDIUM_RISK_THRESHOLD {
        "MEDIUM"
    } else {
        "LOW"
    }
}

fn risk_color(score: f64) -> u32 {
    if score >= HIGH_RISK_THRESHOLD {
        COLOR_HIGH_RISK
    } else if score >= MEDIUM_RISK_THRESHOLD {
        COLOR_MEDIUM_RISK
    } else {
        COLOR_LOW_RISK
    }
}

fn triggered_signals(assessment: &RiskAssessment) -> Vec<&'static str> {
    let mut signals = Vec::new();
    if assessment.fresh_wallet_signal.is_some() {
        signals.push("Fresh Wallet");
    }
    if let Some(size) = &assessment.size_anomaly_signal {
        signals.push("Large Position");
        if size.is_niche_market {
            signals.push("Niche Market");
        }
    }
    if assessment.sniper_cluster_signal.is_some() {
        signals.push("Sniper Cluster");
    }
    signals
}

fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if MARKDOWN_SPECIAL_CHARS.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn wallet_age_suffix(assessment: &RiskAssessment) -> String {
    let Some(signal) = &assessment.fresh_wallet_signal else {
        return String::new();
    };
    let Some(age_hours) = signal.wallet_profile.age_hours else {
        return String::new();
    };
    if age_hours < 1.0 {
        format!(" (Age: {}m)", (age_hours * 60.0) as i64)
    } else {
        format!(" (Age: {:.0}h)", age_hours)
    }
}

pub struct AlertFormatter {
    verbosity: Verbosity,
}

impl Default for AlertFormatter {
    fn default() -> Self {
        Self { verbosity: Verbosity::Detailed }
    }
}

impl AlertFormatter {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    pub fn format(&self, assessment: &RiskAssessment) -> FormattedAlert {
        let wallet_short = truncate_address(&assessment.wallet_address, 4);
        let level = risk_level(assessment.weighted_score);
        let signals = triggered_signals(assessment);
        let links = self.build_links(assessment);

        let title = format!("Suspicious Activity Detected - {level} Risk");
        let body = self.build_body(assessment, &wallet_short, level, &signals);
        let discord_embed = self.build_discord_embed(assessment, &wallet_short, level, &signals, &links);
        let telegram_markdown = self.build_telegram_markdown(assessment, &wallet_short, level, &signals, &links);
        let plain_text = self.build_plain_text(assessment, &wallet_short, level, &signals, &links);

        FormattedAlert {
            title,
            body,
            discord_embed,
            telegram_markdown,
            plain_text,
            links,
        }
    }

    fn build_links(&self, assessment: &RiskAssessment) -> HashMap<String, String> {
        let mut links = HashMap::new();
        links.insert(
            "wallet".to_string(),
            format!("{POLYGONSCAN_ADDRESS_URL}{}", assessment.wallet_address),
        );
        if let Some(slug) = &assessment.trade_event.market_slug {
            links.insert("market".to_string(), format!("{POLYMARKET_MARKET_URL}{slug}"));
        }
        links
    }

    fn build_body(&self, assessment: &RiskAssessment, wallet_short: &str, level: &str, signals: &[&str]) -> String {
        let trade = &assessment.trade_event;

        if self.verbosity == Verbosity::Compact {
            return format!(
                "Wallet {wallet_short} made a {} trade ({}) with risk score {:.2} ({level})",
                trade.side.as_str(),
                format_usdc(trade.notional().inner()),
                assessment.weighted_score,
            );
        }

        let mut lines = vec![
            format!("Wallet: {wallet_short}"),
            format!("Risk Score: {:.2} ({level})", assessment.weighted_score),
            format!("Trade: {} {} @ ${:.3}", trade.side.as_str(), trade.outcome, trade.price.inner()),
            format!("Size: {}", format_usdc(trade.notional().inner())),
        ];
        if !signals.is_empty() {
            lines.push(format!("Signals: {}", signals.join(", ")));
        }
        if let Some(title) = &trade.event_title {
            lines.push(format!("Market: {title}"));
        }
        lines.join("\n")
    }

    fn build_discord_embed(
        &self,
        assessment: &RiskAssessment,
        wallet_short: &str,
        level: &str,
        signals: &[&str],
        links: &HashMap<String, String>,
    ) -> DiscordEmbed {
        let trade = &assessment.trade_event;
        let age_suffix = wallet_age_suffix(assessment);

        let mut fields = vec![
            EmbedField {
                name: "Wallet".to_string(),
                value: format!("`{wallet_short}`{age_suffix}"),
                inline: true,
            },
            EmbedField {
                name: "Risk Score".to_string(),
                value: format!("{:.2} ({level})", assessment.weighted_score),
                inline: true,
            },
        ];

        let market_title = trade
            .event_title
            .clone()
            .or_else(|| trade.market_slug.clone())
            .unwrap_or_else(|| "Unknown Market".to_string());
        let market_value = match links.get("market") {
            Some(url) => format!("[{market_title}]({url})"),
            None => market_title,
        };
        fields.push(EmbedField { name: "Market".to_string(), value: market_value, inline: false });

        fields.push(EmbedField {
            name: "Trade".to_string(),
            value: format!(
                "{} {} @ ${:.3} | {}",
                trade.side.as_str(),
                trade.outcome,
                trade.price.inner(),
                format_usdc(trade.notional().inner())
            ),
            inline: false,
        });

        if !signals.is_empty() {
            fields.push(EmbedField {
                name: "Signals".to_string(),
                value: signals.join(", "),
                inline: false,
            });
        }

        if self.verbosity == Verbosity::Detailed {
            let mut confidences = Vec::new();
            if let Some(signal) = &assessment.fresh_wallet_signal {
                confidences.push(format!("Fresh Wallet: {:.0}%", signal.confidence * 100.0));
            }
            if let Some(signal) = &assessment.size_anomaly_signal {
                confidences.push(format!("Size Anomaly: {:.0}%", signal.confidence * 100.0));
            }
            if !confidences.is_empty() {
                fields.push(EmbedField {
                    name: "Confidence".to_string(),
                    value: confidences.join(" | "),
                    inline: false,
                });
            }
        }

        DiscordEmbed {
            title: "Suspicious Activity Detected".to_string(),
            color: risk_color(assessment.weighted_score),
            fields,
            footer: "Polymarket Insider Tracker".to_string(),
            url: links.get("wallet").cloned(),
        }
    }

    fn build_telegram_markdown(
        &self,
        assessment: &RiskAssessment,
        wallet_short: &str,
        level: &str,
        signals: &[&str],
        links: &HashMap<String, String>,
    ) -> String {
        let trade = &assessment.trade_event;
        let mut lines = vec!["*Suspicious Activity Detected*".to_string(), String::new()];

        let age_suffix = wallet_age_suffix(assessment).replace('(', "\\(").replace(')', "\\)");
        lines.push(format!("*Wallet:* `{wallet_short}`{age_suffix}"));
        lines.push(format!("*Risk Score:* {:.2} \\({level}\\)", assessment.weighted_score));

        let market_title = trade
            .event_title
            .clone()
            .or_else(|| trade.market_slug.clone())
            .unwrap_or_else(|| "Unknown Market".to_string());
        let market_escaped = escape_markdown(&market_title);
        match links.get("market") {
            Some(url) => lines.push(format!("*Market:* [{market_escaped}]({url})")),
            None => lines.push(format!("*Market:* {market_escaped}")),
        }

        let usdc_value = format_usdc(trade.notional().inner()).replace('$', "\\$");
        lines.push(format!(
            "*Trade:* {} {} @ \\${:.3} \\| {usdc_value}",
            trade.side.as_str(),
            trade.outcome,
            trade.price.inner()
        ));

        if !signals.is_empty() {
            lines.push(format!("*Signals:* {}", signals.join(", ")));
        }

        lines.push(String::new());
        if let Some(url) = links.get("wallet") {
            lines.push(format!("[View Wallet]({url})"));
        }
        if let Some(url) = links.get("market") {
            lines.push(format!("[View Market]({url})"));
        }

        lines.join("\n")
    }

    fn build_plain_text(
        &self,
        assessment: &RiskAssessment,
        wallet_short: &str,
        level: &str,
        signals: &[&str],
        links: &HashMap<String, String>,
    ) -> String {
        let trade = &assessment.trade_event;
        let mut lines = vec!["SUSPICIOUS ACTIVITY DETECTED".to_string(), "=".repeat(30), String::new()];

        lines.push(format!("Wallet: {wallet_short}{}", wallet_age_suffix(assessment)));
        lines.push(format!("Risk Score: {:.2} ({level})", assessment.weighted_score));

        let market_title = trade
            .event_title
            .clone()
            .or_else(|| trade.market_slug.clone())
            .unwrap_or_else(|| "Unknown Market".to_string());
        lines.push(format!("Market: {market_title}"));

        lines.push(format!(
            "Trade: {} {} @ ${:.3} | {}",
            trade.side.as_str(),
            trade.outcome,
            trade.price.inner(),
            format_usdc(trade.notional().inner())
        ));

        if !signals.is_empty() {
            lines.push(format!("Signals: {}", signals.join(", ")));
        }

        lines.push(String::new());
        if let Some(url) = links.get("wallet") {
            lines.push(format!("Wallet: {url}"));
        }
        if let Some(url) = links.get("market") {
            lines.push(format!("Market: {url}"));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use tw_core::{Price, Side, TradeEvent, Usdc};

    fn assessment(market_slug: Option<String>) -> RiskAssessment {
        let trade = TradeEvent {
            market_id: "0xmkt".into(),
            trade_id: "0xtx".into(),
            wallet_address: "0x1234567890abcdef1234567890abcdef12345678".into(),
            side: Side::Buy,
            outcome: "Yes".into(),
            outcome_index: 0,
            price: Price::new(Decimal::new(5, 1)),
            size: Usdc::new(Decimal::from(1000)),
            timestamp: Utc::now(),
            asset_id: "asset".into(),
            market_slug,
            event_title: Some("Will it rain?".into()),
            trader_alias: None,
            timestamp_was_fallback: false,
        };
        RiskAssessment {
            wallet_address: trade.wallet_address.clone(),
            market_id: trade.market_id.clone(),
            trade_event: trade,
            fresh_wallet_signal: None,
            size_anomaly_signal: None,
            sniper_cluster_signal: None,
            signals_triggered: 0,
            weighted_score: 0.75,
            should_alert: true,
            assessment_id: "assessment-1".into(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn truncates_long_addresses() {
        assert_eq!(
            truncate_address("0x1234567890abcdef1234567890abcdef12345678", 4),
            "0x1234...5678"
        );
    }

    #[test]
    fn high_score_maps_to_high_risk() {
        assert_eq!(risk_level(0.9), "HIGH");
        assert_eq!(risk_level(0.55), "MEDIUM");
        assert_eq!(risk_level(0.1), "LOW");
    }

    #[test]
    fn markdown_escapes_special_characters() {
        assert_eq!(escape_markdown("a.b!c"), "a\\.b\\!c");
    }

    #[test]
    fn plain_text_includes_market_link_when_slug_present() {
        let formatter = AlertFormatter::default();
        let alert = formatter.format(&assessment(Some("rain-market".into())));
        assert!(alert.plain_text.contains("polymarket.com/event/rain-market"));
    }

    #[test]
    fn compact_body_is_single_line() {
        let formatter = AlertFormatter::new(Verbosity::Compact);
        let alert = formatter.format(&assessment(None));
        assert_eq!(alert.body.lines().count(), 1);
    }
}
