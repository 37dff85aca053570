//! Passive listener for pushed records
//!
//! Devices configured for real-time upload connect to this side and push
//! one frame per attendance event. Nothing is ever sent back.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::BytesMut;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use anviz_core::constants::STX;
use anviz_core::frame::{CHECKSUM_SIZE, LENGTH_SIZE, RESPONSE_HEADER_SIZE};
use anviz_core::{fields, Response, Violation};
use anviz_transport::{TcpTransport, Transport};
use anviz_types::Record;

use crate::config::ListenerConfig;
use crate::error::{Error, Result};
use crate::sink::{Accepted, RecordSink};

const PREFIX_SIZE: usize = RESPONSE_HEADER_SIZE + LENGTH_SIZE;

/// Pause after a failed accept (e.g. out of file descriptors)
const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// Counters reported when the listener stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    /// Device connections accepted
    pub connections: u64,
    /// Records handed to the sink
    pub records: u64,
    /// Frames that failed checksum or decoding
    pub rejected: u64,
}

/// Decode one pushed frame into its source device id and record
///
/// The checksum is verified over every byte but the trailing two. Ack and
/// status are not judged: a pushed frame answers no request.
pub fn decode_pushed_frame(frame: &[u8]) -> anviz_core::Result<(u32, Record)> {
    let response = Response::decode(frame)?;
    debug!(
        device_id = response.device_id,
        ack = response.ack,
        status = %response.status,
        "Pushed frame"
    );
    let record = fields::decode_record(&response.payload)?;
    Ok((response.device_id, record))
}

enum Closed {
    /// Peer went away, went quiet, or the socket failed
    Peer,
    /// Framing lost; the connection cannot be trusted further
    Desync,
    Cancelled,
}

/// Accepts device connections one at a time
pub struct Listener {
    socket: TcpListener,
    read_timeout: Option<Duration>,
}

impl Listener {
    /// Bind the listening socket
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = TcpListener::bind(addr)
            .await
            .map_err(anviz_transport::Error::from)?;
        info!("Listening on {}", socket.local_addr().map_err(anviz_transport::Error::from)?);
        Ok(Self {
            socket,
            read_timeout: None,
        })
    }

    pub async fn from_config(config: &ListenerConfig) -> Result<Self> {
        Ok(Self::bind(config.socket_addr()?)
            .await?
            .with_read_timeout(config.read_timeout()))
    }

    /// Drop connections that stay silent for `timeout`
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self
            .socket
            .local_addr()
            .map_err(anviz_transport::Error::from)?)
    }

    /// Serve pushed records into `sink` until `shutdown` is cancelled
    ///
    /// Peer resets, idle timeouts and corrupt streams end the current
    /// connection and the listener waits for the next one. Sink errors stop
    /// the listener.
    pub async fn run<S>(&self, sink: &mut S, shutdown: CancellationToken) -> Result<ListenerStats>
    where
        S: RecordSink + ?Sized,
    {
        let mut stats = ListenerStats::default();

        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.socket.accept() => accepted,
            };

            let (stream, peer) = match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };

            stats.connections += 1;
            info!("Connected by {}", peer);

            let mut transport = TcpTransport::from_stream(stream);
            transport = match self.read_timeout {
                Some(timeout) => transport.with_read_timeout(timeout),
                None => transport.without_read_timeout(),
            };

            let closed = self.serve(&mut transport, sink, &shutdown, &mut stats).await;
            let _ = transport.disconnect().await;

            match closed? {
                Closed::Cancelled => break,
                Closed::Peer => info!("Connection from {} closed, waiting for device", peer),
                Closed::Desync => warn!("Dropped connection from {} after a corrupt frame", peer),
            }
        }

        info!(
            connections = stats.connections,
            records = stats.records,
            rejected = stats.rejected,
            "Listener stopped"
        );
        Ok(stats)
    }

    async fn serve<S>(
        &self,
        transport: &mut TcpTransport,
        sink: &mut S,
        shutdown: &CancellationToken,
        stats: &mut ListenerStats,
    ) -> Result<Closed>
    where
        S: RecordSink + ?Sized,
    {
        loop {
            let frame = tokio::select! {
                _ = shutdown.cancelled() => return Ok(Closed::Cancelled),
                frame = read_frame(transport) => frame,
            };

            let frame = match frame {
                Ok(frame) => frame,
                Err(Error::Transport(e)) => {
                    debug!("Read ended: {}", e);
                    return Ok(Closed::Peer);
                }
                Err(e) => {
                    warn!("Read failed: {}", e);
                    stats.rejected += 1;
                    return Ok(Closed::Desync);
                }
            };

            let (device_id, record) = match decode_pushed_frame(&frame) {
                Ok(decoded) => decoded,
                Err(e @ anviz_core::Error::ChecksumMismatch { .. }) => {
                    warn!("Skipping pushed frame: {}", e);
                    stats.rejected += 1;
                    continue;
                }
                Err(e) => {
                    warn!("Undecodable pushed frame: {}", e);
                    stats.rejected += 1;
                    return Ok(Closed::Desync);
                }
            };

            match sink.accept(device_id, record).await.map_err(Error::Sink)? {
                Accepted::Stored => {}
                Accepted::Duplicate => debug!(device_id, "Duplicate pushed record"),
            }
            stats.records += 1;
        }
    }
}

/// Read one whole frame: header and length, payload, checksum
async fn read_frame(transport: &mut TcpTransport) -> Result<BytesMut> {
    let mut frame = transport.receive_exact(PREFIX_SIZE).await?;
    if frame[0] != STX {
        return Err(Violation::BadMarker { found: frame[0] }.into());
    }

    let declared = usize::from(u16::from_be_bytes([
        frame[RESPONSE_HEADER_SIZE],
        frame[RESPONSE_HEADER_SIZE + 1],
    ]));
    let rest = transport.receive_exact(declared + CHECKSUM_SIZE).await?;
    frame.extend_from_slice(&rest);
    Ok(frame)
}
