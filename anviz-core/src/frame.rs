//! Anviz frame structure and encoding/decoding

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

use crate::{
    checksum,
    command::Command,
    constants::STX,
    error::{Error, Result, Violation},
    status::Status,
};

/// Request header size: marker, device id, command, length
pub const REQUEST_HEADER_SIZE: usize = 8;

/// Fixed response prefix read before the length: marker, device id, ack, status
pub const RESPONSE_HEADER_SIZE: usize = 7;

/// Size of the big-endian payload length field
pub const LENGTH_SIZE: usize = 2;

/// Size of the trailing checksum
pub const CHECKSUM_SIZE: usize = 2;

/// Smallest complete response frame (empty payload)
pub const MIN_RESPONSE_SIZE: usize = RESPONSE_HEADER_SIZE + LENGTH_SIZE + CHECKSUM_SIZE;

/// Maximum payload size
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

/// Request frame sent to the device
///
/// # Frame Structure
///
/// ```text
/// ┌────────┬───────────┬─────────┬──────────┬─────────┬──────────┐
/// │  STX   │ Device ID │ Command │  Length  │ Payload │   CRC    │
/// │ 1 byte │  4 bytes  │ 1 byte  │ 2 bytes  │ N bytes │ 2 bytes  │
/// │ (0xA5) │  (BE u32) │         │ (BE u16) │         │ (LE u16) │
/// └────────┴───────────┴─────────┴──────────┴─────────┴──────────┘
/// ```
///
/// # Examples
///
/// ```
/// use anviz_core::{Command, Request};
///
/// let request = Request::new(1, Command::GetRecordInfo);
/// let encoded = request.encode().unwrap();
/// assert_eq!(encoded.len(), 10);
/// assert_eq!(encoded[0], 0xA5);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Request {
    pub device_id: u32,

    pub command: Command,

    /// Command arguments
    pub payload: Bytes,
}

impl Request {
    /// Create a request without arguments
    pub fn new(device_id: u32, command: Command) -> Self {
        Self {
            device_id,
            command,
            payload: Bytes::new(),
        }
    }

    /// Create a request with arguments
    pub fn with_payload(device_id: u32, command: Command, payload: impl Into<Bytes>) -> Self {
        Self {
            device_id,
            command,
            payload: payload.into(),
        }
    }

    /// Encode the request to bytes
    ///
    /// # Errors
    ///
    /// Returns [`Error::PayloadTooLarge`] if the payload exceeds the 16-bit
    /// length field.
    pub fn encode(&self) -> Result<BytesMut> {
        encode_request(self.device_id, self.command, &self.payload)
    }

    /// Total encoded size
    pub fn size(&self) -> usize {
        REQUEST_HEADER_SIZE + self.payload.len() + CHECKSUM_SIZE
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("device_id", &self.device_id)
            .field("command", &self.command)
            .field("payload", &hex::encode(&self.payload))
            .finish()
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Request[{}](device={}, len={})",
            self.command,
            self.device_id,
            self.payload.len()
        )
    }
}

fn payload_len(payload: &[u8]) -> Result<u16> {
    u16::try_from(payload.len()).map_err(|_| Error::PayloadTooLarge {
        size: payload.len(),
        max: MAX_PAYLOAD_SIZE,
    })
}

/// Build a complete request frame
pub fn encode_request(device_id: u32, command: Command, payload: &[u8]) -> Result<BytesMut> {
    let len = payload_len(payload)?;
    let mut buf = BytesMut::with_capacity(REQUEST_HEADER_SIZE + payload.len() + CHECKSUM_SIZE);

    buf.put_u8(STX);
    buf.put_u32(device_id);
    buf.put_u8(command.into());
    buf.put_u16(len);
    buf.put_slice(payload);

    let crc = checksum::calculate(&buf);
    buf.put_u16_le(crc);

    Ok(buf)
}

/// Build a complete response frame, as the device would send it
pub fn encode_response(
    device_id: u32,
    ack: u8,
    status: Status,
    payload: &[u8],
) -> Result<BytesMut> {
    let len = payload_len(payload)?;
    let mut buf = BytesMut::with_capacity(MIN_RESPONSE_SIZE + payload.len());

    buf.put_u8(STX);
    buf.put_u32(device_id);
    buf.put_u8(ack);
    buf.put_u8(status.into());
    buf.put_u16(len);
    buf.put_slice(payload);

    let crc = checksum::calculate(&buf);
    buf.put_u16_le(crc);

    Ok(buf)
}

/// The fixed 7-byte prefix of every response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub marker: u8,
    pub device_id: u32,
    pub ack: u8,
    pub status: Status,
}

impl ResponseHeader {
    /// Decode the header fields without judging them
    pub fn parse(mut buf: &[u8]) -> Result<Self> {
        if buf.len() < RESPONSE_HEADER_SIZE {
            return Err(Violation::FrameTooShort {
                expected: RESPONSE_HEADER_SIZE,
                actual: buf.len(),
            }
            .into());
        }

        Ok(Self {
            marker: buf.get_u8(),
            device_id: buf.get_u32(),
            ack: buf.get_u8(),
            status: Status::from(buf.get_u8()),
        })
    }

    /// Check that this header answers `command` sent to `device_id`
    ///
    /// The status is not judged here; see [`ResponseHeader::status_result`].
    pub fn check(&self, device_id: u32, command: Command) -> Result<()> {
        if self.marker != STX {
            return Err(Violation::BadMarker { found: self.marker }.into());
        }
        if self.device_id != device_id {
            return Err(Violation::DeviceIdMismatch {
                expected: device_id,
                actual: self.device_id,
            }
            .into());
        }
        if self.ack != command.ack() {
            return Err(Violation::AckMismatch {
                expected: command.ack(),
                actual: self.ack,
            }
            .into());
        }
        Ok(())
    }

    /// Map a non-success status to [`Error::DeviceStatus`]
    pub fn status_result(&self, command: Command) -> Result<()> {
        if self.status.is_success() {
            Ok(())
        } else {
            Err(Error::DeviceStatus {
                command,
                status: self.status,
            })
        }
    }
}

/// Check a raw response header against the request it answers
///
/// True iff the marker, device id and ack byte match and the status is
/// success.
pub fn validate_response_header(device_id: u32, command: Command, header: &[u8]) -> bool {
    ResponseHeader::parse(header)
        .and_then(|h| {
            h.check(device_id, command)?;
            h.status_result(command)
        })
        .is_ok()
}

/// A complete, checksum-verified response or pushed frame
#[derive(Clone, PartialEq, Eq)]
pub struct Response {
    pub device_id: u32,

    /// Ack byte (command + 0x80 for replies)
    pub ack: u8,

    pub status: Status,

    pub payload: Bytes,
}

impl Response {
    /// Decode a frame held entirely in `buf`
    ///
    /// The checksum is verified over every byte except the trailing two
    /// before any field is trusted.
    ///
    /// # Errors
    ///
    /// - [`Violation::FrameTooShort`] if `buf` cannot hold a frame
    /// - [`Error::ChecksumMismatch`] if the trailer disagrees
    /// - [`Violation::BadMarker`] / [`Violation::LengthMismatch`] for a
    ///   malformed header
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < MIN_RESPONSE_SIZE {
            return Err(Violation::FrameTooShort {
                expected: MIN_RESPONSE_SIZE,
                actual: buf.len(),
            }
            .into());
        }

        let (body, trailer) = buf.split_at(buf.len() - CHECKSUM_SIZE);
        let received = u16::from_le_bytes([trailer[0], trailer[1]]);
        let expected = checksum::calculate(body);
        if expected != received {
            return Err(Error::ChecksumMismatch { expected, received });
        }

        let header = ResponseHeader::parse(body)?;
        if header.marker != STX {
            return Err(Violation::BadMarker {
                found: header.marker,
            }
            .into());
        }

        let mut rest = &body[RESPONSE_HEADER_SIZE..];
        let declared = usize::from(rest.get_u16());
        if declared != rest.len() {
            return Err(Violation::LengthMismatch {
                declared,
                actual: rest.len(),
            }
            .into());
        }

        Ok(Self {
            device_id: header.device_id,
            ack: header.ack,
            status: header.status,
            payload: Bytes::copy_from_slice(rest),
        })
    }

    /// Command this frame acknowledges
    pub fn command(&self) -> Result<Command> {
        Command::from_ack(self.ack)
    }

    /// Encode back to wire bytes
    pub fn encode(&self) -> Result<BytesMut> {
        encode_response(self.device_id, self.ack, self.status, &self.payload)
    }

    /// Get total frame size
    pub fn size(&self) -> usize {
        MIN_RESPONSE_SIZE + self.payload.len()
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("device_id", &self.device_id)
            .field("ack", &format!("0x{:02X}", self.ack))
            .field("status", &self.status)
            .field("payload", &hex::encode(&self.payload))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encode_request_layout() {
        let encoded = encode_request(0x0102_0304, Command::DownloadRecords, &[1, 25]).unwrap();

        assert_eq!(
            &encoded[..10],
            &[0xA5, 0x01, 0x02, 0x03, 0x04, 0x40, 0x00, 0x02, 0x01, 0x19]
        );
        let crc = checksum::calculate(&encoded[..10]);
        assert_eq!(&encoded[10..], &crc.to_le_bytes());
    }

    #[test]
    fn test_request_size() {
        let request = Request::with_payload(1, Command::SetDateTime, vec![24, 3, 1, 8, 0, 0]);
        assert_eq!(request.encode().unwrap().len(), request.size());
    }

    #[test]
    fn test_payload_too_large() {
        let payload = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        let result = encode_request(1, Command::UploadRecords, &payload);
        assert!(matches!(result, Err(Error::PayloadTooLarge { .. })));
    }

    #[test]
    fn test_validate_response_header() {
        let frame = encode_response(7, Command::GetDateTime.ack(), Status::Success, &[]).unwrap();
        let header = &frame[..RESPONSE_HEADER_SIZE];

        assert!(validate_response_header(7, Command::GetDateTime, header));
        assert!(!validate_response_header(8, Command::GetDateTime, header));
        assert!(!validate_response_header(7, Command::SetDateTime, header));
        assert!(!validate_response_header(7, Command::GetDateTime, &header[..5]));

        let mut bad_marker = header.to_vec();
        bad_marker[0] = 0xA6;
        assert!(!validate_response_header(7, Command::GetDateTime, &bad_marker));

        let failed = encode_response(7, Command::GetDateTime.ack(), Status::Failure, &[]).unwrap();
        assert!(!validate_response_header(
            7,
            Command::GetDateTime,
            &failed[..RESPONSE_HEADER_SIZE]
        ));
    }

    #[test]
    fn test_header_check_reports_field() {
        let frame = encode_response(9, Command::GetInfo.ack(), Status::Success, &[]).unwrap();
        let header = ResponseHeader::parse(&frame).unwrap();

        let err = header.check(1, Command::GetInfo).unwrap_err();
        assert!(matches!(
            err,
            Error::ProtocolViolation(Violation::DeviceIdMismatch {
                expected: 1,
                actual: 9
            })
        ));

        let err = header.check(9, Command::GetInfo2).unwrap_err();
        assert!(matches!(
            err,
            Error::ProtocolViolation(Violation::AckMismatch { .. })
        ));
    }

    #[test]
    fn test_status_result() {
        let frame =
            encode_response(1, Command::GetInfo.ack(), Status::UserNotFound, &[]).unwrap();
        let header = ResponseHeader::parse(&frame).unwrap();

        header.check(1, Command::GetInfo).unwrap();
        let err = header.status_result(Command::GetInfo).unwrap_err();
        assert_eq!(err.device_status(), Some(Status::UserNotFound));
    }

    #[test]
    fn test_response_decode() {
        let payload = [1u8, 2, 3, 4, 5];
        let frame =
            encode_response(42, Command::GetRecordInfo.ack(), Status::Success, &payload).unwrap();

        let response = Response::decode(&frame).unwrap();
        assert_eq!(response.device_id, 42);
        assert_eq!(response.command().unwrap(), Command::GetRecordInfo);
        assert_eq!(response.status, Status::Success);
        assert_eq!(response.payload.as_ref(), &payload);
        assert_eq!(response.size(), frame.len());
        assert_eq!(response.encode().unwrap(), frame);
    }

    #[test]
    fn test_response_decode_checksum_mismatch() {
        let mut frame =
            encode_response(42, Command::GetRecordInfo.ack(), Status::Success, &[9, 9]).unwrap();
        frame[9] ^= 0x10;

        let result = Response::decode(&frame);
        if let Err(Error::ChecksumMismatch { expected, received }) = result {
            assert_ne!(expected, received);
        } else {
            panic!("Expected ChecksumMismatch error");
        }
    }

    #[test]
    fn test_response_decode_length_mismatch() {
        // Declares 3 payload bytes but carries 2, with a valid checksum
        let mut body = vec![STX, 0, 0, 0, 1, 0xBC, 0x00, 0x00, 0x03, 0xAA, 0xBB];
        let crc = checksum::calculate(&body);
        body.extend_from_slice(&crc.to_le_bytes());

        let result = Response::decode(&body);
        assert!(matches!(
            result,
            Err(Error::ProtocolViolation(Violation::LengthMismatch {
                declared: 3,
                actual: 2
            }))
        ));
    }

    #[test]
    fn test_response_too_short() {
        let result = Response::decode(&[STX, 0, 0]);
        assert!(matches!(
            result,
            Err(Error::ProtocolViolation(Violation::FrameTooShort { .. }))
        ));
    }
}
