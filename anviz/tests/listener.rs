//! Passive listener tests

mod common;

use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use anviz::{Listener, ListenerStats, Record};
use common::{pushed_frame, record, ChannelSink};

const WAIT: Duration = Duration::from_secs(5);

struct Running {
    addr: std::net::SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<anviz::Result<ListenerStats>>,
    records: UnboundedReceiver<(u32, Record)>,
}

impl Running {
    async fn start(read_timeout: Option<Duration>) -> Self {
        let listener = Listener::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap()
            .with_read_timeout(read_timeout);
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let (mut sink, records) = ChannelSink::new();

        let token = shutdown.clone();
        let task = tokio::spawn(async move { listener.run(&mut sink, token).await });

        Self {
            addr,
            shutdown,
            task,
            records,
        }
    }

    async fn next_record(&mut self) -> (u32, Record) {
        timeout(WAIT, self.records.recv())
            .await
            .expect("record in time")
            .expect("listener alive")
    }

    async fn stop(self) -> ListenerStats {
        self.shutdown.cancel();
        timeout(WAIT, self.task)
            .await
            .expect("listener stops")
            .unwrap()
            .unwrap()
    }
}

/// Wait until the listener closes `stream`
async fn closed_by_listener(stream: &mut TcpStream) -> bool {
    let mut buf = [0u8; 1];
    matches!(timeout(WAIT, stream.read(&mut buf)).await, Ok(Ok(0)) | Ok(Err(_)))
}

#[tokio::test]
async fn test_receives_pushed_records() {
    let mut running = Running::start(None).await;
    let mut device = TcpStream::connect(running.addr).await.unwrap();

    let first = record(42, 1);
    let second = record(43, 2);
    let third = record(44, 3);

    // Two frames coalesced, then one split mid-frame
    let mut both = pushed_frame(7, &first);
    both.extend(pushed_frame(7, &second));
    device.write_all(&both).await.unwrap();

    let split = pushed_frame(8, &third);
    device.write_all(&split[..5]).await.unwrap();
    device.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    device.write_all(&split[5..]).await.unwrap();

    assert_eq!(running.next_record().await, (7, first));
    assert_eq!(running.next_record().await, (7, second));
    assert_eq!(running.next_record().await, (8, third));

    let stats = running.stop().await;
    assert_eq!(
        stats,
        ListenerStats {
            connections: 1,
            records: 3,
            rejected: 0,
        }
    );
}

#[tokio::test]
async fn test_accepts_again_after_peer_reset() {
    let mut running = Running::start(None).await;

    let mut device = TcpStream::connect(running.addr).await.unwrap();
    device.write_all(&pushed_frame(1, &record(1, 1))).await.unwrap();
    assert_eq!(running.next_record().await.1, record(1, 1));
    drop(device);

    let mut device = TcpStream::connect(running.addr).await.unwrap();
    device.write_all(&pushed_frame(1, &record(2, 2))).await.unwrap();
    assert_eq!(running.next_record().await.1, record(2, 2));

    let stats = running.stop().await;
    assert_eq!(stats.connections, 2);
    assert_eq!(stats.records, 2);
}

#[tokio::test]
async fn test_skips_bad_checksum() {
    let mut running = Running::start(None).await;
    let mut device = TcpStream::connect(running.addr).await.unwrap();

    let mut corrupt = pushed_frame(3, &record(5, 5));
    corrupt[12] ^= 0x40;
    device.write_all(&corrupt).await.unwrap();
    device.write_all(&pushed_frame(3, &record(6, 6))).await.unwrap();

    assert_eq!(running.next_record().await, (3, record(6, 6)));

    let stats = running.stop().await;
    assert_eq!(stats.connections, 1);
    assert_eq!(stats.rejected, 1);
}

#[tokio::test]
async fn test_bad_marker_drops_connection() {
    let mut running = Running::start(None).await;

    let mut garbage = TcpStream::connect(running.addr).await.unwrap();
    garbage.write_all(&[0x00; 25]).await.unwrap();
    assert!(closed_by_listener(&mut garbage).await);

    let mut device = TcpStream::connect(running.addr).await.unwrap();
    device.write_all(&pushed_frame(4, &record(9, 9))).await.unwrap();
    assert_eq!(running.next_record().await, (4, record(9, 9)));

    let stats = running.stop().await;
    assert_eq!(stats.connections, 2);
    assert_eq!(stats.rejected, 1);
}

#[tokio::test]
async fn test_idle_connection_times_out() {
    let running = Running::start(Some(Duration::from_millis(100))).await;

    let mut idle = TcpStream::connect(running.addr).await.unwrap();
    assert!(closed_by_listener(&mut idle).await);

    let stats = running.stop().await;
    assert_eq!(stats.connections, 1);
    assert_eq!(stats.rejected, 0);
}

#[tokio::test]
async fn test_cancel_while_waiting_for_device() {
    let running = Running::start(None).await;
    let stats = running.stop().await;
    assert_eq!(stats, ListenerStats::default());
}

#[tokio::test]
async fn test_cancel_while_connected() {
    let running = Running::start(None).await;
    let mut device = TcpStream::connect(running.addr).await.unwrap();
    // Half a frame; the listener is blocked reading the rest
    device.write_all(&pushed_frame(1, &record(1, 1))[..10]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let stats = running.stop().await;
    assert_eq!(stats.connections, 1);
    assert!(closed_by_listener(&mut device).await);
}
