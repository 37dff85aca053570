//! Transport errors

use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not connected")]
    NotConnected,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("Read timeout")]
    ReadTimeout,

    #[error("Connection closed by remote")]
    ConnectionClosed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

impl Error {
    /// Peer went away or stopped talking; a fresh connection may succeed
    pub fn is_reconnect_worthy(&self) -> bool {
        match self {
            Self::ReadTimeout | Self::ConnectionClosed => true,
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_classification() {
        assert!(Error::ReadTimeout.is_reconnect_worthy());
        assert!(Error::ConnectionClosed.is_reconnect_worthy());
        assert!(Error::Io(io::ErrorKind::ConnectionReset.into()).is_reconnect_worthy());
        assert!(!Error::Io(io::ErrorKind::PermissionDenied.into()).is_reconnect_worthy());
        assert!(!Error::NotConnected.is_reconnect_worthy());
    }
}
