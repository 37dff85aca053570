//! Record sinks
//!
//! A [`RecordSink`] is where downloaded or pushed records end up. Storage
//! is up to the implementor; the sink decides what counts as a duplicate.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tracing::info;

use anviz_types::Record;

/// What a sink did with a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accepted {
    Stored,
    /// Already held; discarded
    Duplicate,
}

#[async_trait]
pub trait RecordSink: Send {
    /// Store one record reported by `device_id`
    async fn accept(&mut self, device_id: u32, record: Record) -> anyhow::Result<Accepted>;

    /// Number of records held
    async fn stored_count(&self) -> anyhow::Result<u64>;
}

/// In-memory sink, deduplicating on user code and timestamp
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Vec<(u32, Record)>,
    seen: HashSet<(u64, NaiveDateTime)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored records with their source device id, in arrival order
    pub fn records(&self) -> &[(u32, Record)] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<(u32, Record)> {
        self.records
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn accept(&mut self, device_id: u32, record: Record) -> anyhow::Result<Accepted> {
        if !self.seen.insert(record.dedup_key()) {
            return Ok(Accepted::Duplicate);
        }
        self.records.push((device_id, record));
        Ok(Accepted::Stored)
    }

    async fn stored_count(&self) -> anyhow::Result<u64> {
        Ok(self.records.len() as u64)
    }
}

/// Writes every record to the log and keeps nothing
#[derive(Debug, Default)]
pub struct LogSink {
    count: u64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordSink for LogSink {
    async fn accept(&mut self, device_id: u32, record: Record) -> anyhow::Result<Accepted> {
        self.count += 1;
        info!(
            device_id,
            user = record.code,
            time = %record.datetime.format("%Y-%m-%dT%H:%M:%S"),
            backup = %record.backup,
            direction = %record.direction,
            work = record.work,
            "Record"
        );
        Ok(Accepted::Stored)
    }

    async fn stored_count(&self) -> anyhow::Result<u64> {
        Ok(self.count)
    }
}
