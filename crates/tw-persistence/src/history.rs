//! Alert History: the audit trail every dispatched assessment is appended
//! to, backed today by date-rotated JSON Lines plus a replay-built index.
//!
//! `AlertHistory` is the operator extension point — a real database-backed
//! repository would implement the same trait; none is built here.

use std::io::BufRead;
use std::sync::Mutex;

use tracing::warn;
use tw_core::AlertRecord;

use crate::error::Result;
use crate::index::AlertIndex;
use crate::writer::JsonLinesWriter;

pub trait AlertHistory: Send + Sync {
    fn record(&self, record: AlertRecord) -> Result<()>;
    fn by_wallet(&self, wallet_address: &str) -> Vec<AlertRecord>;
    fn by_market(&self, market_id: &str) -> Vec<AlertRecord>;
    fn len(&self) -> usize;
}

pub struct JsonLinesHistory {
    writer: Mutex<JsonLinesWriter>,
    index: AlertIndex,
}

impl JsonLinesHistory {
    /// Opens (creating if absent) the base directory and replays today's
    /// file into the secondary index.
    pub fn open(base_dir: impl Into<String>) -> Result<Self> {
        let writer = JsonLinesWriter::new(base_dir)?;
        let index = AlertIndex::new();

        let path = writer.current_file_path();
        if path.exists() {
            let file = std::fs::File::open(&path)?;
            for line in std::io::BufReader::new(file).lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<AlertRecord>(&line) {
                    Ok(record) => index.insert(record),
                    Err(e) => warn!(error = %e, "skipping malformed alert history line on replay"),
                }
            }
        }

        Ok(Self { writer: Mutex::new(writer), index })
    }
}

impl AlertHistory for JsonLinesHistory {
    fn record(&self, record: AlertRecord) -> Result<()> {
        self.index.insert(record.clone());
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        writer.append(record)
    }

    fn by_wallet(&self, wallet_address: &str) -> Vec<AlertRecord> {
        self.index.by_wallet(wallet_address)
    }

    fn by_market(&self, market_id: &str) -> Vec<AlertRecord> {
        self.index.by_market(market_id)
    }

    fn len(&self) -> usize {
        self.index.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn record(id: &str) -> AlertRecord {
        AlertRecord {
            assessment_id: id.to_string(),
            wallet_address: "0xabc".into(),
            market_id: "market-1".into(),
            weighted_score: 0.8,
            signals_triggered: 2,
            channels_attempted: vec!["discord".into()],
            channels_succeeded: vec!["discord".into()],
            dedup_key: "0xabc:market-1:1".into(),
            user_feedback: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn record_is_queryable_immediately() {
        let dir = TempDir::new().unwrap();
        let history = JsonLinesHistory::open(dir.path().to_str().unwrap()).unwrap();
        history.record(record("a1")).unwrap();
        assert_eq!(history.by_wallet("0xabc").len(), 1);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn reopening_replays_todays_file_into_index() {
        let dir = TempDir::new().unwrap();
        {
            let history = JsonLinesHistory::open(dir.path().to_str().unwrap()).unwrap();
            history.record(record("a1")).unwrap();
        }

        let reopened = JsonLinesHistory::open(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.by_market("market-1").len(), 1);
    }
}
