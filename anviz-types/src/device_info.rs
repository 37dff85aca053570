//! Device information structures

use std::fmt;

/// Device information as returned by the "get information" command.
///
/// Only the firmware version has a stable position across models; the
/// rest of the payload is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Firmware version (first 8 payload bytes, NUL padded on the wire)
    pub firmware_version: String,

    /// Complete information payload
    pub raw: Vec<u8>,
}

impl DeviceInfo {
    /// Width of the firmware version field at the start of the payload
    pub const FIRMWARE_WIDTH: usize = 8;

    pub fn from_payload(payload: &[u8]) -> Self {
        let width = payload.len().min(Self::FIRMWARE_WIDTH);
        Self {
            firmware_version: trim_padded(&payload[..width]),
            raw: payload.to_vec(),
        }
    }
}

/// Decode a fixed-width, NUL or 0xFF padded text field
pub fn trim_padded(bytes: &[u8]) -> String {
    let end = bytes
        .iter()
        .rposition(|&b| b != 0x00 && b != 0xFF)
        .map_or(0, |i| i + 1);
    String::from_utf8_lossy(&bytes[..end]).trim().to_string()
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Device[FW: {}, {} info bytes]",
            self.firmware_version,
            self.raw.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_firmware_version_trimmed() {
        let mut payload = b"02.31\0\0\0".to_vec();
        payload.extend_from_slice(&[0x01, 0x02, 0x03]);

        let info = DeviceInfo::from_payload(&payload);
        assert_eq!(info.firmware_version, "02.31");
        assert_eq!(info.raw.len(), 11);
    }

    #[test]
    fn test_short_payload() {
        let info = DeviceInfo::from_payload(b"V1");
        assert_eq!(info.firmware_version, "V1");
    }

    #[test]
    fn test_trim_padded_all_padding() {
        assert_eq!(trim_padded(&[0xFF; 4]), "");
        assert_eq!(trim_padded(&[]), "");
    }
}
