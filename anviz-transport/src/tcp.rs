//! TCP transport

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::{error::*, Transport};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP transport for Anviz devices
///
/// Either dials out lazily ([`TcpTransport::new`]) or wraps a connection a
/// device opened towards us ([`TcpTransport::from_stream`]).
pub struct TcpTransport {
    /// `host:port` as given by the caller
    target: String,
    /// Resolved peer, cached after the first lookup
    peer: Option<SocketAddr>,
    stream: Option<TcpStream>,
    connect_timeout: Duration,
    read_timeout: Option<Duration>,
}

impl TcpTransport {
    /// Transport that will dial `host:port` on [`Transport::connect`]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            target: format!("{}:{}", host.into(), port),
            peer: None,
            stream: None,
            connect_timeout: DEFAULT_TIMEOUT,
            read_timeout: Some(DEFAULT_TIMEOUT),
        }
    }

    /// Wrap a stream that is already connected (an accepted push connection)
    pub fn from_stream(stream: TcpStream) -> Self {
        let peer = stream.peer_addr().ok();
        Self {
            target: peer.map(|p| p.to_string()).unwrap_or_default(),
            peer,
            stream: Some(stream),
            connect_timeout: DEFAULT_TIMEOUT,
            read_timeout: Some(DEFAULT_TIMEOUT),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Give up on a read after `timeout`
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Block on reads until data arrives or the peer goes away
    pub fn without_read_timeout(mut self) -> Self {
        self.read_timeout = None;
        self
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    async fn peer(&mut self) -> Result<SocketAddr> {
        if let Some(peer) = self.peer {
            return Ok(peer);
        }

        let peer = tokio::net::lookup_host(self.target.as_str())
            .await
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", self.target, e)))?
            .next()
            .ok_or_else(|| Error::InvalidAddress(format!("{} resolves to nothing", self.target)))?;

        self.peer = Some(peer);
        Ok(peer)
    }

    fn stream(&mut self) -> Result<&mut TcpStream> {
        self.stream.as_mut().ok_or(Error::NotConnected)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        let peer = self.peer().await?;
        debug!(%peer, "Connecting");

        let stream = match timeout(self.connect_timeout, TcpStream::connect(peer)).await {
            Ok(connected) => connected?,
            Err(_) => return Err(Error::ConnectionTimeout),
        };
        // Requests are small and strictly request/response
        stream.set_nodelay(true)?;

        debug!(%peer, "Connected");

        self.stream = Some(stream);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            debug!(peer = %self.remote_addr(), "Disconnecting");
            // The peer may already be gone
            let _ = stream.shutdown().await;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream()?;
        stream.write_all(data).await?;
        stream.flush().await?;

        trace!(len = data.len(), bytes = %hex::encode(data), "Sent");
        Ok(())
    }

    async fn receive_exact(&mut self, len: usize) -> Result<BytesMut> {
        let limit = self.read_timeout;
        let stream = self.stream()?;

        let mut buf = BytesMut::zeroed(len);
        if len == 0 {
            return Ok(buf);
        }

        let read = stream.read_exact(&mut buf[..]);
        let filled = match limit {
            Some(limit) => timeout(limit, read).await.map_err(|_| Error::ReadTimeout)?,
            None => read.await,
        };
        if let Err(e) = filled {
            return Err(match e.kind() {
                io::ErrorKind::UnexpectedEof => Error::ConnectionClosed,
                _ => Error::Io(e),
            });
        }

        trace!(len, bytes = %hex::encode(&buf), "Received");
        Ok(buf)
    }

    fn remote_addr(&self) -> String {
        match self.peer {
            Some(peer) => peer.to_string(),
            None => self.target.clone(),
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if self.is_connected() {
            warn!(peer = %self.remote_addr(), "TCP transport dropped while still connected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_transport_create() {
        let transport = TcpTransport::new("192.168.1.218", 5010);
        assert!(!transport.is_connected());
        assert_eq!(transport.remote_addr(), "192.168.1.218:5010");
    }

    #[tokio::test]
    async fn test_tcp_transport_invalid_address() {
        let mut transport =
            TcpTransport::new("invalid..address", 5010).with_connect_timeout(Duration::from_millis(100));

        let result = transport.connect().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_send_before_connect() {
        let mut transport = TcpTransport::new("127.0.0.1", 5010);
        assert!(matches!(transport.send(&[0xA5]).await, Err(Error::NotConnected)));
        assert!(matches!(transport.receive_exact(1).await, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn test_receive_exact_across_writes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let peer = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 3];
            socket.read_exact(&mut request).await.unwrap();
            socket.write_all(&[1, 2]).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            socket.write_all(&[3, 4, 5]).await.unwrap();
            request
        });

        let mut transport = TcpTransport::new("127.0.0.1", port);
        transport.connect().await.unwrap();
        assert!(matches!(transport.connect().await, Err(Error::AlreadyConnected)));

        transport.send(&[7, 8, 9]).await.unwrap();
        let first = transport.receive_exact(4).await.unwrap();
        let second = transport.receive_exact(1).await.unwrap();

        assert_eq!(&first[..], &[1, 2, 3, 4]);
        assert_eq!(&second[..], &[5]);
        assert_eq!(peer.await.unwrap(), [7, 8, 9]);

        transport.disconnect().await.unwrap();
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_short_read_is_connection_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(&[0xA5, 0x00]).await.unwrap();
            // dropped here: the peer closes mid-frame
        });

        let mut transport = TcpTransport::new("127.0.0.1", port);
        transport.connect().await.unwrap();

        let result = transport.receive_exact(11).await;
        assert!(matches!(result, Err(Error::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let _peer = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let mut transport = TcpTransport::new("127.0.0.1", port)
            .with_read_timeout(Duration::from_millis(50));
        transport.connect().await.unwrap();

        let result = transport.receive_exact(1).await;
        assert!(matches!(result, Err(Error::ReadTimeout)));
    }

    #[tokio::test]
    async fn test_from_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"push").await.unwrap();
        });

        let (socket, peer) = listener.accept().await.unwrap();
        let mut transport = TcpTransport::from_stream(socket).without_read_timeout();
        assert!(transport.is_connected());
        assert_eq!(transport.read_timeout(), None);
        assert_eq!(transport.remote_addr(), peer.to_string());

        let data = transport.receive_exact(4).await.unwrap();
        assert_eq!(&data[..], b"push");
        client.await.unwrap();
    }
}
