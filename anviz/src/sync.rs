//! Device to sink synchronisation

use std::fmt;

use tracing::info;

use crate::bulk::{Progress, RecordSelection};
use crate::device::Device;
use crate::error::{Error, Result};
use crate::sink::{Accepted, RecordSink};

/// Which records a sync pulls
pub type SyncMode = RecordSelection;

impl RecordSelection {
    /// New records when the sink already holds some, otherwise everything
    pub fn choose(stored: u64, force_all: bool) -> Self {
        if stored == 0 || force_all {
            Self::All
        } else {
            Self::New
        }
    }
}

/// Outcome of [`sync_records`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub mode: SyncMode,
    /// Records received from the device
    pub received: u32,
    pub stored: u32,
    pub duplicates: u32,
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "synced {} records: {} received, {} stored, {} duplicates",
            self.mode, self.received, self.stored, self.duplicates
        )
    }
}

/// Copy records from `device` into `sink`
///
/// Picks the mode with [`SyncMode::choose`]. A sink error stops the
/// download before completion, so new-record marks are left untouched.
pub async fn sync_records<'a, S, P>(
    device: &'a mut Device,
    sink: &mut S,
    force_all: bool,
    progress: P,
) -> Result<SyncReport>
where
    S: RecordSink + ?Sized,
    P: Progress + Send + 'a,
{
    let stored = sink.stored_count().await.map_err(Error::Sink)?;
    let mode = SyncMode::choose(stored, force_all);
    let device_id = device.device_id();

    let mut report = SyncReport {
        mode,
        received: 0,
        stored: 0,
        duplicates: 0,
    };

    let mut download = device.download_records(mode).await?.with_progress(progress);
    while let Some(record) = download.next().await? {
        report.received += 1;
        match sink.accept(device_id, record).await.map_err(Error::Sink)? {
            Accepted::Stored => report.stored += 1,
            Accepted::Duplicate => report.duplicates += 1,
        }
    }

    info!(device_id, "{}", report);
    Ok(report)
}
