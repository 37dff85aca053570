//! Staff (enrolled user) entries

use std::fmt;

use crate::device_info::trim_padded;

/// Width of the name field on the wire
pub const NAME_WIDTH: usize = 10;

/// One enrolled user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffInfo {
    pub code: u64,

    /// Keypad password, `None` when not enrolled
    pub password: Option<u32>,

    /// Card number, `None` when not enrolled
    pub card: Option<u32>,

    /// Raw name bytes; the encoding depends on the device language setting
    pub name: [u8; NAME_WIDTH],

    pub department: u8,

    pub group: u8,

    pub mode: u8,

    /// Enrolled fingerprint count
    pub fingerprints: u16,

    pub special: u8,
}

impl StaffInfo {
    /// Best-effort text rendering of the name field
    pub fn name_lossy(&self) -> String {
        trim_padded(&self.name)
    }
}

impl fmt::Display for StaffInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Staff[{}] {}", self.code, self.name_lossy())
    }
}
