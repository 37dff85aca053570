//! Chunked bulk downloads
//!
//! Records and staff entries are fetched in fixed-size chunks. The first
//! request carries a selector, every later one a continuation marker, and
//! each asks for `min(chunk, remaining)` entries until nothing remains.
//! The first request is sent even when the total is zero, and a download of
//! new records always ends with one clear call.

use std::collections::VecDeque;
use std::fmt;

use bytes::Bytes;
use tracing::{debug, info, warn};

use anviz_core::constants::transfer;
use anviz_core::{fields, Command, Status};
use anviz_types::{Record, StaffInfo};

use crate::device::Device;
use crate::error::Result;

/// Which records a download covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordSelection {
    /// Every stored record
    All,
    /// Records not yet marked as collected
    New,
}

impl fmt::Display for RecordSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::New => write!(f, "new"),
        }
    }
}

/// One kind of chunked download
pub trait Transfer {
    type Item;

    /// Download command
    const COMMAND: Command;

    /// Largest number of entries per request
    const CHUNK: u32;

    /// Selector byte of the first request
    fn first_param(&self) -> u8;

    /// Decode one count-prefixed chunk
    fn decode(payload: &[u8]) -> anviz_core::Result<Vec<Self::Item>>;

    /// Clear new-record marks once every entry was delivered
    fn clears_on_completion(&self) -> bool {
        false
    }
}

/// Attendance record download
#[derive(Debug, Clone, Copy)]
pub struct RecordTransfer {
    selection: RecordSelection,
}

impl RecordTransfer {
    pub fn new(selection: RecordSelection) -> Self {
        Self { selection }
    }

    pub fn selection(&self) -> RecordSelection {
        self.selection
    }
}

impl Transfer for RecordTransfer {
    type Item = Record;

    const COMMAND: Command = Command::DownloadRecords;
    const CHUNK: u32 = transfer::RECORD_CHUNK;

    fn first_param(&self) -> u8 {
        match self.selection {
            RecordSelection::All => transfer::RECORDS_ALL,
            RecordSelection::New => transfer::RECORDS_NEW,
        }
    }

    fn decode(payload: &[u8]) -> anviz_core::Result<Vec<Record>> {
        fields::decode_records(payload)
    }

    fn clears_on_completion(&self) -> bool {
        self.selection == RecordSelection::New
    }
}

/// Staff table download
#[derive(Debug, Clone, Copy)]
pub struct StaffTransfer;

impl Transfer for StaffTransfer {
    type Item = StaffInfo;

    const COMMAND: Command = Command::DownloadStaffInfo;
    const CHUNK: u32 = transfer::STAFF_CHUNK;

    fn first_param(&self) -> u8 {
        transfer::STAFF_FIRST
    }

    fn decode(payload: &[u8]) -> anviz_core::Result<Vec<StaffInfo>> {
        fields::decode_staff_entries(payload)
    }
}

/// Receives download progress
pub trait Progress {
    /// Called after each delivered entry
    fn step(&mut self, current: u32, total: u32);

    /// Called once the download is exhausted
    fn finish(&mut self) {}
}

impl<F: FnMut(u32, u32)> Progress for F {
    fn step(&mut self, current: u32, total: u32) {
        self(current, total)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Streaming,
    Done,
}

/// A lazy, forward-only download
///
/// Holds the device exclusively until dropped. Entries are requested one
/// chunk at a time as [`BulkDownload::next`] drains the buffer. After an
/// error the download is finished and yields nothing more.
pub struct BulkDownload<'a, T: Transfer> {
    device: &'a mut Device,
    transfer: T,
    total: u32,
    remaining: u32,
    requests: u32,
    delivered: u32,
    buffer: VecDeque<T::Item>,
    state: State,
    progress: Option<Box<dyn Progress + Send + 'a>>,
}

impl<'a, T: Transfer> BulkDownload<'a, T> {
    pub(crate) fn new(device: &'a mut Device, transfer: T, total: u32) -> Self {
        Self {
            device,
            transfer,
            total,
            remaining: total,
            requests: 0,
            delivered: 0,
            buffer: VecDeque::new(),
            state: State::Streaming,
            progress: None,
        }
    }

    /// Report progress to `progress`
    pub fn with_progress(mut self, progress: impl Progress + Send + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Number of entries the device announced
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Entries handed out so far
    pub fn delivered(&self) -> u32 {
        self.delivered
    }

    /// Chunk requests sent so far
    pub fn requests(&self) -> u32 {
        self.requests
    }

    pub fn is_finished(&self) -> bool {
        self.state == State::Done && self.buffer.is_empty()
    }

    /// Next entry, or `None` once the download is exhausted
    pub async fn next(&mut self) -> Result<Option<T::Item>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                self.delivered += 1;
                if let Some(progress) = self.progress.as_mut() {
                    progress.step(self.delivered, self.total);
                }
                return Ok(Some(item));
            }

            if self.state == State::Done {
                return Ok(None);
            }

            let step = if self.remaining > 0 || self.requests == 0 {
                self.fetch().await
            } else {
                self.complete().await
            };
            if let Err(e) = step {
                self.state = State::Done;
                return Err(e);
            }
        }
    }

    /// Drain the rest of the download
    pub async fn collect(mut self) -> Result<Vec<T::Item>> {
        let mut items = Vec::with_capacity(self.remaining as usize + self.buffer.len());
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }

    async fn fetch(&mut self) -> Result<()> {
        let quantity = self.remaining.min(T::CHUNK);
        let param = if self.requests == 0 {
            self.transfer.first_param()
        } else {
            transfer::CONTINUATION
        };

        // CHUNK fits in a byte, so quantity does too
        let payload = match self.device.call(T::COMMAND, &[param, quantity as u8]).await {
            Ok(payload) => payload,
            // An empty user table answers with a status instead of a zero-count chunk
            Err(e) if e.device_status() == Some(Status::UserTableEmpty) => {
                debug!(command = %T::COMMAND, "Device reports an empty table");
                Bytes::from_static(&[0])
            }
            Err(e) => return Err(e),
        };
        self.requests += 1;

        let items = T::decode(&payload)?;
        if items.len() != quantity as usize {
            warn!(
                command = %T::COMMAND,
                requested = quantity,
                received = items.len(),
                "Chunk size differs from request"
            );
        }
        debug!(
            command = %T::COMMAND,
            request = self.requests,
            received = items.len(),
            remaining = self.remaining - quantity,
            "Chunk received"
        );

        self.remaining -= quantity;
        self.buffer.extend(items);
        Ok(())
    }

    async fn complete(&mut self) -> Result<()> {
        self.state = State::Done;

        if self.transfer.clears_on_completion() {
            self.device.clear_records(None).await?;
        }
        if let Some(progress) = self.progress.as_mut() {
            progress.finish();
        }

        info!(
            command = %T::COMMAND,
            delivered = self.delivered,
            requests = self.requests,
            "Download complete"
        );
        Ok(())
    }
}

impl<T: Transfer> fmt::Debug for BulkDownload<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkDownload")
            .field("command", &T::COMMAND)
            .field("total", &self.total)
            .field("remaining", &self.remaining)
            .field("requests", &self.requests)
            .field("delivered", &self.delivered)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}
