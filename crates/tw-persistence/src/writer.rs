//! Date-rotated JSON Lines writer for [`AlertRecord`]s.
//!
//! Each line is an independent JSON object, so a write interrupted mid-line
//! only corrupts that one entry and the file can still be replayed.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};

use chrono::Utc;
use tracing::{debug, info, warn};
use tw_core::AlertRecord;

use crate::error::Result;

const DEFAULT_MAX_BUFFER_SIZE: usize = 1;

struct ActiveWriter {
    writer: BufWriter<File>,
    date: String,
    records_written: usize,
}

/// Appends alert records to `{base_dir}/{YYYY-MM-DD}.jsonl`, rotating the
/// underlying file when the wall-clock date changes.
pub struct JsonLinesWriter {
    base_dir: String,
    buffer: Vec<AlertRecord>,
    max_buffer_size: usize,
    active: Option<ActiveWriter>,
}

impl JsonLinesWriter {
    pub fn new(base_dir: impl Into<String>) -> Result<Self> {
        Self::with_buffer_size(base_dir, DEFAULT_MAX_BUFFER_SIZE)
    }

    pub fn with_buffer_size(base_dir: impl Into<String>, max_buffer_size: usize) -> Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            buffer: Vec::with_capacity(max_buffer_size.max(1)),
            max_buffer_size: max_buffer_size.max(1),
            active: None,
        })
    }

    pub fn base_dir(&self) -> &str {
        &self.base_dir
    }

    /// Path to today's file, regardless of whether it has been opened yet.
    pub fn current_file_path(&self) -> std::path::PathBuf {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        std::path::Path::new(&self.base_dir).join(format!("{today}.jsonl"))
    }

    pub fn append(&mut self, record: AlertRecord) -> Result<()> {
        self.buffer.push(record);
        if self.buffer.len() >= self.max_buffer_size {
            self.flush()?;
        }
        Ok(())
    }

    fn close_active(&mut self) {
        if let Some(mut active) = self.active.take() {
            if let Err(e) = active.writer.flush() {
                warn!(error = %e, "failed to flush alert history writer on close");
            }
            info!(date = %active.date, records = active.records_written, "closed alert history writer");
        }
    }

    fn open_for(&mut self, date: &str) -> Result<()> {
        let path = std::path::Path::new(&self.base_dir).join(format!("{date}.jsonl"));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        self.active = Some(ActiveWriter {
            writer: BufWriter::new(file),
            date: date.to_string(),
            records_written: 0,
        });
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let needs_rotation = self.active.as_ref().is_some_and(|a| a.date != today);
        if needs_rotation {
            self.close_active();
        }
        if self.active.is_none() {
            self.open_for(&today)?;
        }

        let active = self.active.as_mut().expect("opened above");
        let count = self.buffer.len();
        for record in &self.buffer {
            let json = serde_json::to_string(record)?;
            writeln!(active.writer, "{json}")?;
        }
        active.writer.flush()?;
        active.records_written += count;

        debug!(date = %today, records = count, "flushed alert history");
        self.buffer.clear();
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        self.flush()?;
        self.close_active();
        Ok(())
    }
}

impl Drop for JsonLinesWriter {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(error = %e, "failed to flush alert history buffer on drop");
        }
        self.close_active();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use tempfile::TempDir;
    use tw_core::AlertRecord;

    fn record(id: &str) -> AlertRecord {
        AlertRecord {
            assessment_id: id.to_string(),
            wallet_address: "0xabc".into(),
            market_id: "market-1".into(),
            weighted_score: 0.7,
            signals_triggered: 2,
            channels_attempted: vec!["discord".into()],
            channels_succeeded: vec!["discord".into()],
            dedup_key: "0xabc:market-1:1".into(),
            user_feedback: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn append_and_flush_writes_one_line_per_record() {
        let dir = TempDir::new().unwrap();
        let mut writer = JsonLinesWriter::with_buffer_size(dir.path().to_str().unwrap(), 100).unwrap();
        writer.append(record("a1")).unwrap();
        writer.append(record("a2")).unwrap();
        writer.flush().unwrap();

        let path = writer.current_file_path();
        let lines: Vec<_> = BufReader::new(File::open(path).unwrap()).lines().filter_map(|l| l.ok()).collect();
        assert_eq!(lines.len(), 2);
        let parsed: AlertRecord = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(parsed.assessment_id, "a1");
    }

    #[test]
    fn default_buffer_flushes_immediately() {
        let dir = TempDir::new().unwrap();
        let mut writer = JsonLinesWriter::new(dir.path().to_str().unwrap()).unwrap();
        writer.append(record("a1")).unwrap();

        let path = writer.current_file_path();
        let lines: Vec<_> = BufReader::new(File::open(path).unwrap()).lines().filter_map(|l| l.ok()).collect();
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn append_across_sessions_does_not_truncate() {
        let dir = TempDir::new().unwrap();
        {
            let mut writer = JsonLinesWriter::new(dir.path().to_str().unwrap()).unwrap();
            writer.append(record("a1")).unwrap();
        }
        {
            let mut writer = JsonLinesWriter::new(dir.path().to_str().unwrap()).unwrap();
            writer.append(record("a2")).unwrap();
        }

        let writer = JsonLinesWriter::new(dir.path().to_str().unwrap()).unwrap();
        let path = writer.current_file_path();
        let lines: Vec<_> = BufReader::new(File::open(path).unwrap()).lines().filter_map(|l| l.ok()).collect();
        assert_eq!(lines.len(), 2);
    }
}
