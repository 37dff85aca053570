//! Type definitions for anviz

pub mod device_info;
pub mod error;
pub mod net;
pub mod record;
pub mod records_info;
pub mod staff;

pub use device_info::DeviceInfo;
pub use error::{Error, Result};
pub use net::{MacAddress, NetParams};
pub use record::{BackupType, Direction, Record};
pub use records_info::RecordsInfo;
pub use staff::StaffInfo;
