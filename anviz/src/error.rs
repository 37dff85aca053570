//! High-level error types

use anviz_core::{Status, Violation};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] anviz_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] anviz_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] anviz_types::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("Record sink error: {0:#}")]
    Sink(anyhow::Error),
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Socket could not be opened, timed out, or closed mid-frame
    ConnectionFailure,
    ChecksumMismatch,
    ProtocolViolation,
    /// Device answered with a non-success status
    DeviceStatus,
    /// Caller-supplied value cannot be sent to the device
    InvalidArgument,
    Config,
    Sink,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        use anviz_core::Error as Core;

        match self {
            Self::Transport(_) => ErrorKind::ConnectionFailure,
            Self::Core(Core::ChecksumMismatch { .. }) => ErrorKind::ChecksumMismatch,
            Self::Core(Core::ProtocolViolation(_) | Core::UnknownCommand(_)) => {
                ErrorKind::ProtocolViolation
            }
            Self::Core(Core::DeviceStatus { .. }) => ErrorKind::DeviceStatus,
            Self::Core(
                Core::PayloadTooLarge { .. }
                | Core::FieldOverflow { .. }
                | Core::TimestampOutOfRange(_),
            )
            | Self::Types(_)
            | Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Config(_) => ErrorKind::Config,
            Self::Sink(_) => ErrorKind::Sink,
        }
    }

    /// Status code reported by the device, if any
    pub fn device_status(&self) -> Option<Status> {
        match self {
            Self::Core(e) => e.device_status(),
            _ => None,
        }
    }

    /// The protocol rule that was broken, if any
    pub fn violation(&self) -> Option<&Violation> {
        match self {
            Self::Core(anviz_core::Error::ProtocolViolation(v)) => Some(v),
            _ => None,
        }
    }

    /// Check if dropping the connection and connecting again may help
    pub fn is_reconnect_worthy(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_reconnect_worthy(),
            Self::Core(e) => e.breaks_framing(),
            _ => false,
        }
    }
}

impl From<Violation> for Error {
    fn from(violation: Violation) -> Self {
        Self::Core(violation.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anviz_core::Command;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_kinds() {
        let closed = Error::from(anviz_transport::Error::ConnectionClosed);
        assert_eq!(closed.kind(), ErrorKind::ConnectionFailure);
        assert!(closed.is_reconnect_worthy());

        let crc = Error::from(anviz_core::Error::ChecksumMismatch {
            expected: 1,
            received: 2,
        });
        assert_eq!(crc.kind(), ErrorKind::ChecksumMismatch);

        let id = Error::from(Violation::DeviceIdMismatch {
            expected: 1,
            actual: 2,
        });
        assert_eq!(id.kind(), ErrorKind::ProtocolViolation);
        assert!(matches!(id.violation(), Some(Violation::DeviceIdMismatch { .. })));
        assert!(id.is_reconnect_worthy());

        let overflow = Error::from(anviz_core::Error::FieldOverflow {
            field: "code",
            value: 1 << 40,
            width: 5,
        });
        assert_eq!(overflow.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_bad_mac_text_is_invalid_argument() {
        let err: Error = "00:11:22"
            .parse::<anviz_types::MacAddress>()
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(!err.is_reconnect_worthy());
    }

    #[test]
    fn test_device_status() {
        let err = Error::from(anviz_core::Error::DeviceStatus {
            command: Command::DownloadStaffInfo,
            status: Status::UserTableEmpty,
        });
        assert_eq!(err.kind(), ErrorKind::DeviceStatus);
        assert_eq!(err.device_status(), Some(Status::UserTableEmpty));
        assert_eq!(Error::InvalidArgument("x".into()).device_status(), None);
    }
}
