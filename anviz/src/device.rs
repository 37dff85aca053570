//! High-level device interface

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use chrono::{Datelike, NaiveDateTime};
use tracing::{debug, info, trace, warn};

use anviz_core::constants::{clear, transfer, CLOCK_BASE_YEAR};
use anviz_core::frame::{CHECKSUM_SIZE, LENGTH_SIZE, RESPONSE_HEADER_SIZE};
use anviz_core::{checksum, fields, Command, Request, ResponseHeader, Violation};
use anviz_transport::{TcpTransport, Transport};
use anviz_types::device_info::trim_padded;
use anviz_types::{DeviceInfo, NetParams, Record, RecordsInfo, StaffInfo};

use crate::bulk::{BulkDownload, RecordSelection, RecordTransfer, StaffTransfer};
use crate::config::DeviceConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    /// No connection attempted yet
    Idle,
    Open,
    /// Torn down by [`Device::disconnect`] or a header violation; never reopened
    Closed,
}

/// Anviz time clock
///
/// High-level interface for one appliance. The connection is opened on the
/// first command and every command waits for its response before the next
/// one is sent.
///
/// # Examples
///
/// ```no_run
/// use anviz::Device;
///
/// #[tokio::main]
/// async fn main() -> anviz::Result<()> {
///     let mut device = Device::new(1, "192.168.1.218", 5010);
///
///     let info = device.get_information().await?;
///     println!("Device: {}", info);
///
///     let now = device.get_datetime().await?;
///     println!("Clock: {}", now);
///
///     device.disconnect().await?;
///     Ok(())
/// }
/// ```
pub struct Device {
    device_id: u32,
    transport: Box<dyn Transport>,
    link: Link,
}

impl Device {
    /// Create a new device instance (TCP transport, 5 s timeouts)
    pub fn new(device_id: u32, addr: impl Into<String>, port: u16) -> Self {
        Self::with_transport(device_id, TcpTransport::new(addr, port))
    }

    /// Create a device from its configuration section
    pub fn from_config(config: &DeviceConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        let transport = TcpTransport::new(config.addr.clone(), config.port)
            .with_connect_timeout(timeout)
            .with_read_timeout(timeout);
        Self::with_transport(config.device_id, transport)
    }

    /// Create a device over any transport
    pub fn with_transport(device_id: u32, transport: impl Transport + 'static) -> Self {
        Self {
            device_id,
            transport: Box::new(transport),
            link: Link::Idle,
        }
    }

    pub fn device_id(&self) -> u32 {
        self.device_id
    }

    pub fn remote_addr(&self) -> String {
        self.transport.remote_addr()
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.link == Link::Open && self.transport.is_connected()
    }

    /// Close the connection
    ///
    /// The device cannot be used afterwards: every further command fails
    /// with a connection error.
    pub async fn disconnect(&mut self) -> Result<()> {
        let was_open = self.link == Link::Open;
        self.link = Link::Closed;
        if was_open {
            info!("Disconnecting from {}...", self.transport.remote_addr());
            self.transport.disconnect().await?;
        }
        Ok(())
    }

    /// Send one command and return the response payload
    ///
    /// # Errors
    ///
    /// - connection failures (including a short read) from the transport
    /// - [`Violation`]s for a foreign marker, device id or ack byte, reported
    ///   before anything past the 7-byte header is read. The rest of that
    ///   frame is never consumed, so the connection is closed and later
    ///   commands fail with a connection error.
    /// - [`anviz_core::Error::ChecksumMismatch`]
    /// - [`anviz_core::Error::DeviceStatus`] for a non-success status, after
    ///   the whole frame has been consumed
    pub async fn call(&mut self, command: Command, args: &[u8]) -> Result<Bytes> {
        let request = Request::with_payload(self.device_id, command, Bytes::copy_from_slice(args));
        let encoded = request.encode()?;
        self.ensure_connected().await?;

        debug!(device_id = self.device_id, %command, args = args.len(), "Sending request");
        trace!(?request, "Request frame");
        self.transport.send(&encoded).await?;

        let head = self.transport.receive_exact(RESPONSE_HEADER_SIZE).await?;
        let header = match ResponseHeader::parse(&head).and_then(|h| {
            h.check(self.device_id, command)?;
            Ok(h)
        }) {
            Ok(header) => header,
            Err(e) => return Err(self.abandon(e.into()).await),
        };

        let length = self.transport.receive_exact(LENGTH_SIZE).await?;
        let declared = usize::from(u16::from_be_bytes([length[0], length[1]]));
        let payload = self.transport.receive_exact(declared).await?;
        let trailer = self.transport.receive_exact(CHECKSUM_SIZE).await?;

        let mut frame = BytesMut::with_capacity(head.len() + length.len() + payload.len());
        frame.extend_from_slice(&head);
        frame.extend_from_slice(&length);
        frame.extend_from_slice(&payload);

        let expected = checksum::calculate(&frame);
        let received = u16::from_le_bytes([trailer[0], trailer[1]]);
        if expected != received {
            return Err(anviz_core::Error::ChecksumMismatch { expected, received }.into());
        }

        header.status_result(command)?;

        trace!(%command, status = %header.status, len = declared, "Response accepted");
        Ok(payload.freeze())
    }

    /// Get device information
    pub async fn get_information(&mut self) -> Result<DeviceInfo> {
        let payload = self.call(Command::GetInfo, &[]).await?;
        let info = DeviceInfo::from_payload(&payload);
        debug!("Device info: {}", info);
        Ok(info)
    }

    /// Write the information block back verbatim
    pub async fn set_information(&mut self, raw: &[u8]) -> Result<()> {
        self.call(Command::SetInfo, raw).await?;
        Ok(())
    }

    /// Second information block (model specific, returned as is)
    pub async fn get_information_2(&mut self) -> Result<Bytes> {
        self.call(Command::GetInfo2, &[]).await
    }

    pub async fn set_information_2(&mut self, raw: &[u8]) -> Result<()> {
        self.call(Command::SetInfo2, raw).await?;
        Ok(())
    }

    /// Read the device clock
    pub async fn get_datetime(&mut self) -> Result<NaiveDateTime> {
        let payload = self.call(Command::GetDateTime, &[]).await?;
        Ok(fields::decode_clock(&payload)?)
    }

    /// Set the device clock
    ///
    /// The device acknowledges with an empty payload; anything else is a
    /// protocol violation.
    pub async fn set_datetime(&mut self, datetime: NaiveDateTime) -> Result<()> {
        let offset = datetime.year() - CLOCK_BASE_YEAR;
        if !(0..=i32::from(u8::MAX)).contains(&offset) {
            return Err(Error::InvalidArgument(format!(
                "year {} outside {}..={}",
                datetime.year(),
                CLOCK_BASE_YEAR,
                CLOCK_BASE_YEAR + i32::from(u8::MAX)
            )));
        }

        let args = fields::encode_clock(datetime)?;
        let payload = self.call(Command::SetDateTime, &args).await?;
        if !payload.is_empty() {
            return Err(Violation::UnexpectedPayload {
                command: Command::SetDateTime,
                len: payload.len(),
            }
            .into());
        }

        info!("Device clock set to {}", datetime);
        Ok(())
    }

    /// Get TCP/IP parameters
    pub async fn get_net_params(&mut self) -> Result<NetParams> {
        let payload = self.call(Command::GetTcpIpParams, &[]).await?;
        Ok(fields::decode_net_params(&payload)?)
    }

    /// Set TCP/IP parameters
    pub async fn set_net_params(&mut self, params: &NetParams) -> Result<()> {
        let args = fields::encode_net_params(params)?;
        self.call(Command::SetTcpIpParams, &args).await?;
        info!("Network parameters updated: {}", params);
        Ok(())
    }

    /// Get user and record counters
    pub async fn get_record_info(&mut self) -> Result<RecordsInfo> {
        let payload = self.call(Command::GetRecordInfo, &[]).await?;
        Ok(fields::decode_records_info(&payload)?)
    }

    pub async fn get_serial_number(&mut self) -> Result<String> {
        let payload = self.call(Command::GetDeviceSn, &[]).await?;
        Ok(trim_padded(&payload))
    }

    pub async fn set_serial_number(&mut self, serial: &str) -> Result<()> {
        let args = text_arg("serial number", serial)?;
        self.call(Command::SetDeviceSn, args).await?;
        Ok(())
    }

    pub async fn get_device_type(&mut self) -> Result<String> {
        let payload = self.call(Command::GetDeviceType, &[]).await?;
        Ok(trim_padded(&payload))
    }

    pub async fn set_device_type(&mut self, device_type: &str) -> Result<()> {
        let args = text_arg("device type", device_type)?;
        self.call(Command::SetDeviceType, args).await?;
        Ok(())
    }

    /// Clear "new record" marks
    ///
    /// `None` clears every mark; `Some(n)` clears the oldest `n`. Returns
    /// the number of marks the device reports as cleared.
    pub async fn clear_records(&mut self, amount: Option<u32>) -> Result<u32> {
        let args = match amount {
            None => [clear::ALL_NEW_MARKS, 0, 0, 0],
            Some(n) if (1..=clear::MAX_AMOUNT).contains(&n) => {
                let [_, hi, mid, lo] = n.to_be_bytes();
                [clear::NEW_MARKS, hi, mid, lo]
            }
            Some(n) => {
                return Err(Error::InvalidArgument(format!(
                    "clear amount {} outside 1..={}",
                    n,
                    clear::MAX_AMOUNT
                )))
            }
        };

        let payload = self.call(Command::ClearRecords, &args).await?;
        let cleared = fields::decode_cleared(&payload)?;
        info!(cleared, "Cleared new record marks");
        Ok(cleared)
    }

    /// Download attendance records, chunk by chunk
    ///
    /// Queries the record counters first so the returned download knows
    /// its total. With [`RecordSelection::New`] the new-record marks are
    /// cleared once the last record has been taken.
    pub async fn download_records(
        &mut self,
        selection: RecordSelection,
    ) -> Result<BulkDownload<'_, RecordTransfer>> {
        let info = self.get_record_info().await?;
        let total = match selection {
            RecordSelection::All => info.all_records,
            RecordSelection::New => info.new_records,
        };
        info!(%selection, total, "Downloading records");
        Ok(BulkDownload::new(self, RecordTransfer::new(selection), total))
    }

    pub async fn download_all_records(&mut self) -> Result<BulkDownload<'_, RecordTransfer>> {
        self.download_records(RecordSelection::All).await
    }

    pub async fn download_new_records(&mut self) -> Result<BulkDownload<'_, RecordTransfer>> {
        self.download_records(RecordSelection::New).await
    }

    /// Download the staff table, chunk by chunk
    pub async fn download_staff(&mut self) -> Result<BulkDownload<'_, StaffTransfer>> {
        let total = self.get_record_info().await?.users;
        info!(total, "Downloading staff");
        Ok(BulkDownload::new(self, StaffTransfer, total))
    }

    /// Upload attendance records in chunks of 25
    pub async fn upload_records(&mut self, records: &[Record]) -> Result<()> {
        for chunk in records.chunks(transfer::RECORD_CHUNK as usize) {
            let args = fields::encode_entries(chunk, fields::encode_record)?;
            self.call(Command::UploadRecords, &args).await?;
        }
        info!(count = records.len(), "Uploaded records");
        Ok(())
    }

    /// Upload staff entries in chunks of 12
    pub async fn upload_staff(&mut self, staff: &[StaffInfo]) -> Result<()> {
        for chunk in staff.chunks(transfer::STAFF_CHUNK as usize) {
            let args = fields::encode_entries(chunk, fields::encode_staff)?;
            self.call(Command::UploadStaffInfo, &args).await?;
        }
        info!(count = staff.len(), "Uploaded staff");
        Ok(())
    }

    // Helper methods

    async fn ensure_connected(&mut self) -> Result<()> {
        match self.link {
            Link::Open => Ok(()),
            Link::Closed => Err(anviz_transport::Error::NotConnected.into()),
            Link::Idle => {
                info!("Connecting to {}...", self.transport.remote_addr());
                self.transport.connect().await?;
                self.link = Link::Open;
                Ok(())
            }
        }
    }

    /// Drop a connection whose response was only partly read
    async fn abandon(&mut self, error: Error) -> Error {
        warn!(%error, "Dropping connection to {}", self.transport.remote_addr());
        self.link = Link::Closed;
        if let Err(e) = self.transport.disconnect().await {
            debug!("Disconnect after protocol violation failed: {}", e);
        }
        error
    }
}

fn text_arg<'a>(what: &str, value: &'a str) -> Result<&'a [u8]> {
    if value.is_empty() {
        return Err(Error::InvalidArgument(format!("{} must not be empty", what)));
    }
    Ok(value.as_bytes())
}
