//! Attendance records

use std::fmt;

use chrono::NaiveDateTime;

/// How the user identified at the terminal
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BackupType {
    Fingerprint1,
    Fingerprint2,
    Password,
    Card,
    /// Any value the firmware reports outside the documented set
    Other(u8),
}

impl From<u8> for BackupType {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Fingerprint1,
            1 => Self::Fingerprint2,
            2 => Self::Password,
            3 => Self::Card,
            other => Self::Other(other),
        }
    }
}

impl From<BackupType> for u8 {
    fn from(value: BackupType) -> u8 {
        match value {
            BackupType::Fingerprint1 => 0,
            BackupType::Fingerprint2 => 1,
            BackupType::Password => 2,
            BackupType::Card => 3,
            BackupType::Other(other) => other,
        }
    }
}

impl fmt::Display for BackupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fingerprint1 => f.write_str("FP1"),
            Self::Fingerprint2 => f.write_str("FP2"),
            Self::Password => f.write_str("PWD"),
            Self::Card => f.write_str("CARD"),
            Self::Other(v) => write!(f, "BKP({v})"),
        }
    }
}

/// Punch direction
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Direction {
    In,
    Out,
    Other(u8),
}

impl From<u8> for Direction {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::In,
            1 => Self::Out,
            other => Self::Other(other),
        }
    }
}

impl From<Direction> for u8 {
    fn from(value: Direction) -> u8 {
        match value {
            Direction::In => 0,
            Direction::Out => 1,
            Direction::Other(other) => other,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::In => f.write_str("IN"),
            Self::Out => f.write_str("OUT"),
            Self::Other(v) => write!(f, "TYPE({v})"),
        }
    }
}

/// One attendance event as stored by the device
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record {
    /// User code (40 bits on the wire)
    pub code: u64,

    /// Punch time, naive device-local time
    pub datetime: NaiveDateTime,

    pub backup: BackupType,

    pub direction: Direction,

    /// Work code (24 bits on the wire, passed through untouched)
    pub work: u32,
}

impl Record {
    /// Key used by stores to discard records they already hold
    pub fn dedup_key(&self) -> (u64, NaiveDateTime) {
        (self.code, self.datetime)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "user={} {} bkp={} {} work={}",
            self.code,
            self.datetime.format("%Y-%m-%dT%H:%M:%S"),
            self.backup,
            self.direction,
            self.work
        )
    }
}
