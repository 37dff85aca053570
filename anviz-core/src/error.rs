//! Error types for anviz-core

use crate::{command::Command, status::Status};

/// Result type alias for anviz-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Trailing checksum disagrees with the recomputed one
    #[error("Checksum mismatch: expected 0x{expected:04X}, received 0x{received:04X}")]
    ChecksumMismatch {
        expected: u16,
        received: u16,
    },

    /// Frame or payload does not follow the protocol
    #[error("Protocol violation: {0}")]
    ProtocolViolation(#[from] Violation),

    /// Device answered with a non-success status
    #[error("Device returned {status} for {command}")]
    DeviceStatus {
        command: Command,
        status: Status,
    },

    /// Unknown command code
    #[error("Unknown command code: 0x{0:02X}")]
    UnknownCommand(u8),

    /// Payload does not fit the 16-bit length field
    #[error("Payload too large: {size} bytes (max: {max} bytes)")]
    PayloadTooLarge {
        size: usize,
        max: usize,
    },

    /// Value does not fit the wire width of its field
    #[error("Value {value} does not fit field `{field}` ({width} bytes)")]
    FieldOverflow {
        field: &'static str,
        value: u64,
        width: usize,
    },

    /// Timestamp cannot be expressed as seconds after the device epoch
    #[error("Timestamp {0} is outside the device clock range")]
    TimestampOutOfRange(chrono::NaiveDateTime),
}

/// The specific way a frame or payload broke the protocol
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error("bad start marker 0x{found:02X}")]
    BadMarker { found: u8 },

    #[error("device id mismatch: expected {expected}, got {actual}")]
    DeviceIdMismatch { expected: u32, actual: u32 },

    #[error("ack mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    AckMismatch { expected: u8, actual: u8 },

    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort { expected: usize, actual: usize },

    #[error("declared payload length {declared} but {actual} bytes present")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("{layout} entry must be {expected} bytes, got {actual}")]
    EntrySize {
        layout: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("chunk declares {declared} entries of {entry_size} bytes but carries {available} bytes")]
    EntryCountMismatch {
        declared: usize,
        entry_size: usize,
        available: usize,
    },

    #[error("field `{field}` lies outside the {size}-byte {layout} layout")]
    FieldOutOfRange {
        layout: &'static str,
        field: &'static str,
        size: usize,
    },

    #[error("invalid value for `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("{command} expects an empty response, got {len} bytes")]
    UnexpectedPayload { command: Command, len: usize },
}

impl Error {
    /// Status reported by the device, if this is a device status error
    pub fn device_status(&self) -> Option<Status> {
        match self {
            Self::DeviceStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if the byte stream may be out of step after this error
    ///
    /// Header violations are reported before the rest of the frame is read,
    /// so its length, payload and checksum are still pending on the stream.
    pub fn breaks_framing(&self) -> bool {
        matches!(
            self,
            Self::ProtocolViolation(
                Violation::BadMarker { .. }
                    | Violation::DeviceIdMismatch { .. }
                    | Violation::AckMismatch { .. }
                    | Violation::FrameTooShort { .. }
                    | Violation::LengthMismatch { .. }
            )
        )
    }
}
