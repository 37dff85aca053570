//! # anviz
//!
//! Rust implementation of the Anviz time clock communication protocol.
//!
//! ## Features
//!
//! - Type-safe frame codec and payload layouts
//! - Async/await API using Tokio
//! - Chunked record and staff downloads
//! - Passive listener for records pushed by the device
//!
//! ## Quick Start
//!
//! ```no_run
//! use anviz::{Device, RecordSelection};
//!
//! #[tokio::main]
//! async fn main() -> anviz::Result<()> {
//!     let mut device = Device::new(1, "192.168.1.218", 5010);
//!
//!     let counts = device.get_record_info().await?;
//!     println!("{}", counts);
//!
//!     let mut records = device.download_records(RecordSelection::All).await?;
//!     while let Some(record) = records.next().await? {
//!         println!("{}", record);
//!     }
//!     drop(records);
//!
//!     device.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod bulk;
pub mod config;
pub mod device;
pub mod error;
pub mod listener;
pub mod sink;
pub mod sync;

// Re-exports
pub use bulk::{BulkDownload, Progress, RecordSelection, RecordTransfer, StaffTransfer, Transfer};
pub use config::{Config, DeviceConfig, ListenerConfig};
pub use device::Device;
pub use error::{Error, ErrorKind, Result};
pub use listener::{decode_pushed_frame, Listener, ListenerStats};
pub use sink::{Accepted, LogSink, MemorySink, RecordSink};
pub use sync::{sync_records, SyncMode, SyncReport};

// Re-export types
pub use anviz_core::{Command, Status, Violation};
pub use anviz_types::{
    BackupType, DeviceInfo, Direction, MacAddress, NetParams, Record, RecordsInfo, StaffInfo,
};
