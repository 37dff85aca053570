//! In-process stand-ins for a time clock

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use anviz::{Accepted, BackupType, Direction, Record, RecordSink, StaffInfo};
use anviz_core::frame::encode_response;
use anviz_core::{checksum, fields, Command, Status};

pub const DEVICE_ID: u32 = 0x0000_0001;

/// A request as the fake device received it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seen {
    pub device_id: u32,
    pub command: u8,
    pub args: Vec<u8>,
}

impl Seen {
    pub fn is(&self, command: Command) -> bool {
        self.command == u8::from(command)
    }
}

/// Read one request frame, checking its checksum
pub async fn read_request(stream: &mut TcpStream) -> Option<Seen> {
    let mut head = [0u8; 8];
    stream.read_exact(&mut head).await.ok()?;
    let len = usize::from(u16::from_be_bytes([head[6], head[7]]));
    let mut rest = vec![0u8; len + 2];
    stream.read_exact(&mut rest).await.ok()?;

    let mut body = head.to_vec();
    body.extend_from_slice(&rest[..len]);
    let crc = u16::from_le_bytes([rest[len], rest[len + 1]]);
    assert_eq!(crc, checksum::calculate(&body), "request checksum");
    assert_eq!(head[0], 0xA5, "request marker");

    Some(Seen {
        device_id: u32::from_be_bytes([head[1], head[2], head[3], head[4]]),
        command: head[5],
        args: rest[..len].to_vec(),
    })
}

pub fn record(code: u64, n: u32) -> Record {
    let base = NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap();
    Record {
        code,
        datetime: base + chrono::Duration::minutes(i64::from(n)),
        backup: if n % 2 == 0 {
            BackupType::Fingerprint1
        } else {
            BackupType::Card
        },
        direction: if n % 3 == 0 { Direction::In } else { Direction::Out },
        work: n,
    }
}

pub fn records(count: u32) -> Vec<Record> {
    (0..count).map(|n| record(u64::from(n % 7) + 1, n)).collect()
}

pub fn staff(count: u32) -> Vec<StaffInfo> {
    (0..count)
        .map(|n| {
            let mut name = [0u8; 10];
            let label = format!("user{n}");
            name[..label.len()].copy_from_slice(label.as_bytes());
            StaffInfo {
                code: u64::from(n) + 100,
                password: (n % 2 == 0).then_some(1234),
                card: None,
                name,
                department: 1,
                group: 1,
                mode: 0,
                fingerprints: 2,
                special: 0,
            }
        })
        .collect()
}

/// Device state behind the fake
#[derive(Debug)]
pub struct Appliance {
    pub device_id: u32,
    pub records: Vec<Record>,
    /// Index of the first record still marked new
    pub new_from: usize,
    pub staff: Vec<StaffInfo>,
    pub clock: NaiveDateTime,
    pub uploaded: Vec<Record>,
    pub log: Vec<Seen>,
    cursor: usize,
}

impl Appliance {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            device_id: DEVICE_ID,
            new_from: 0,
            records,
            staff: Vec::new(),
            clock: NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            uploaded: Vec::new(),
            log: Vec::new(),
            cursor: 0,
        }
    }

    fn new_count(&self) -> usize {
        self.records.len() - self.new_from
    }

    fn respond(&mut self, seen: &Seen) -> (Status, Vec<u8>) {
        let Ok(command) = Command::try_from(seen.command) else {
            return (Status::Failure, Vec::new());
        };

        match command {
            Command::GetRecordInfo => {
                let mut payload = Vec::new();
                for n in [
                    self.staff.len(),
                    0,
                    0,
                    0,
                    self.records.len(),
                    self.new_count(),
                ] {
                    // Split across both parts of the group; the device sums them
                    let hi = n.min(0xFF);
                    payload.push(hi as u8);
                    payload.extend_from_slice(&((n - hi) as u16).to_be_bytes());
                }
                (Status::Success, payload)
            }
            Command::DownloadRecords => {
                let (param, quantity) = (seen.args[0], usize::from(seen.args[1]));
                match param {
                    1 => self.cursor = 0,
                    2 => self.cursor = self.new_from,
                    _ => {}
                }
                let end = (self.cursor + quantity).min(self.records.len());
                let chunk = &self.records[self.cursor..end];
                self.cursor = end;
                let payload = fields::encode_entries(chunk, fields::encode_record).unwrap();
                (Status::Success, payload)
            }
            Command::DownloadStaffInfo => {
                if self.staff.is_empty() {
                    return (Status::UserTableEmpty, Vec::new());
                }
                let (param, quantity) = (seen.args[0], usize::from(seen.args[1]));
                if param == 1 {
                    self.cursor = 0;
                }
                let end = (self.cursor + quantity).min(self.staff.len());
                let chunk = &self.staff[self.cursor..end];
                self.cursor = end;
                let payload = fields::encode_entries(chunk, fields::encode_staff).unwrap();
                (Status::Success, payload)
            }
            Command::ClearRecords => {
                let cleared = match seen.args[0] {
                    1 => self.new_count(),
                    _ => {
                        let amount =
                            u32::from_be_bytes([0, seen.args[1], seen.args[2], seen.args[3]]);
                        (amount as usize).min(self.new_count())
                    }
                };
                self.new_from += cleared;
                // Three bytes, as the device does; the client left-fills
                let bytes = (cleared as u32).to_be_bytes();
                (Status::Success, bytes[1..].to_vec())
            }
            Command::GetDateTime => (Status::Success, fields::encode_clock(self.clock).unwrap()),
            Command::SetDateTime => {
                self.clock = fields::decode_clock(&seen.args).unwrap();
                (Status::Success, Vec::new())
            }
            Command::UploadRecords => {
                let chunk = fields::decode_records(&seen.args).unwrap();
                self.uploaded.extend(chunk);
                (Status::Success, Vec::new())
            }
            Command::GetDeviceSn => (Status::Success, b"AZ0123456\0\0\0\0\0\0\0".to_vec()),
            Command::GetInfo => {
                let mut payload = b"01.23.45".to_vec();
                payload.extend_from_slice(&[0u8; 10]);
                (Status::Success, payload)
            }
            _ => (Status::Success, Vec::new()),
        }
    }
}

/// Fake device serving one connection from an [`Appliance`]
pub struct FakeDevice {
    pub addr: SocketAddr,
    pub state: Arc<Mutex<Appliance>>,
    task: JoinHandle<()>,
}

impl FakeDevice {
    pub async fn start(appliance: Appliance) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(appliance));
        let shared = Arc::clone(&state);

        let task = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            while let Some(seen) = read_request(&mut stream).await {
                let frame = {
                    let mut device = shared.lock().unwrap();
                    device.log.push(seen.clone());
                    let (status, payload) = device.respond(&seen);
                    encode_response(device.device_id, seen.command.wrapping_add(0x80), status, &payload)
                        .unwrap()
                };
                if stream.write_all(&frame).await.is_err() {
                    break;
                }
            }
        });

        Self { addr, state, task }
    }

    pub fn device(&self) -> anviz::Device {
        anviz::Device::new(DEVICE_ID, self.addr.ip().to_string(), self.addr.port())
    }

    /// Requests received so far
    pub fn log(&self) -> Vec<Seen> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn requests_for(&self, command: Command) -> Vec<Vec<u8>> {
        self.log()
            .into_iter()
            .filter(|s| s.is(command))
            .map(|s| s.args)
            .collect()
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Fake device answering each request with the next canned byte string
///
/// The connection is closed after the last answer. Returns the address and
/// a handle yielding the requests received.
pub async fn scripted(answers: Vec<Vec<u8>>) -> (SocketAddr, JoinHandle<Vec<Seen>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let task = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut seen = Vec::new();
        for answer in answers {
            let Some(request) = read_request(&mut stream).await else {
                break;
            };
            seen.push(request);
            stream.write_all(&answer).await.unwrap();
        }
        let _ = stream.shutdown().await;
        seen
    });

    (addr, task)
}

/// A well-formed response frame
pub fn answer(device_id: u32, command: Command, status: Status, payload: &[u8]) -> Vec<u8> {
    encode_response(device_id, command.ack(), status, payload)
        .unwrap()
        .to_vec()
}

/// Sink that forwards every record to a channel
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<(u32, Record)>,
    count: u64,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(u32, Record)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, count: 0 }, rx)
    }
}

#[async_trait::async_trait]
impl RecordSink for ChannelSink {
    async fn accept(&mut self, device_id: u32, record: Record) -> anyhow::Result<Accepted> {
        self.count += 1;
        self.tx.send((device_id, record))?;
        Ok(Accepted::Stored)
    }

    async fn stored_count(&self) -> anyhow::Result<u64> {
        Ok(self.count)
    }
}

/// A pushed record frame as the device sends it
pub fn pushed_frame(device_id: u32, record: &Record) -> Vec<u8> {
    let payload = fields::encode_record(record).unwrap();
    encode_response(device_id, Command::DownloadRecords.ack(), Status::Success, &payload)
        .unwrap()
        .to_vec()
}
