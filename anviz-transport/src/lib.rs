//! Transport layer for the Anviz protocol
//!
//! Provides TCP communication with devices.

pub mod error;
pub mod tcp;

pub use error::{Error, Result};
pub use tcp::TcpTransport;

use async_trait::async_trait;
use bytes::BytesMut;

/// Transport trait for different communication methods
///
/// The protocol is half-duplex: callers write a whole request, then read
/// the response field by field with [`Transport::receive_exact`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to device
    async fn connect(&mut self) -> Result<()>;

    /// Disconnect from device
    async fn disconnect(&mut self) -> Result<()>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Send raw bytes
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive exactly `len` bytes (with the read timeout)
    ///
    /// A peer that closes before `len` bytes arrive yields
    /// [`Error::ConnectionClosed`]; partial data is discarded.
    async fn receive_exact(&mut self, len: usize) -> Result<BytesMut>;

    /// Get remote address
    fn remote_addr(&self) -> String;
}
