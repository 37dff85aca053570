//! Response status codes

use std::fmt;

/// Status byte carried by every response
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    Failure,
    UserTableFull,
    UserTableEmpty,
    UserNotFound,
    CaptureTimeout,
    UserAlreadyExists,
    FingerprintAlreadyExists,
    /// Code outside the documented set
    Unknown(u8),
}

impl Status {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    pub fn code(self) -> u8 {
        self.into()
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Success => "operation successful",
            Self::Failure => "operation failed",
            Self::UserTableFull => "user table full",
            Self::UserTableEmpty => "user table empty",
            Self::UserNotFound => "user does not exist",
            Self::CaptureTimeout => "capture timeout",
            Self::UserAlreadyExists => "user already exists",
            Self::FingerprintAlreadyExists => "fingerprint already exists",
            Self::Unknown(_) => "unknown status",
        }
    }
}

impl From<u8> for Status {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Self::Success,
            0x01 => Self::Failure,
            0x04 => Self::UserTableFull,
            0x05 => Self::UserTableEmpty,
            0x06 => Self::UserNotFound,
            0x08 => Self::CaptureTimeout,
            0x0A => Self::UserAlreadyExists,
            0x0B => Self::FingerprintAlreadyExists,
            other => Self::Unknown(other),
        }
    }
}

impl From<Status> for u8 {
    fn from(value: Status) -> u8 {
        match value {
            Status::Success => 0x00,
            Status::Failure => 0x01,
            Status::UserTableFull => 0x04,
            Status::UserTableEmpty => 0x05,
            Status::UserNotFound => 0x06,
            Status::CaptureTimeout => 0x08,
            Status::UserAlreadyExists => 0x0A,
            Status::FingerprintAlreadyExists => 0x0B,
            Status::Unknown(other) => other,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.description(), self.code())
    }
}
