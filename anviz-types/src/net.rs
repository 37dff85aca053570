//! Network configuration snapshot

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::Error;

/// Ethernet hardware address
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct MacAddress(pub [u8; 6]);

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');

        for octet in octets.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| Error::invalid_mac(s, "fewer than 6 octets"))?;
            *octet = u8::from_str_radix(part, 16)
                .map_err(|e| Error::invalid_mac(s, format!("octet {part:?}: {e}")))?;
        }

        if parts.next().is_some() {
            return Err(Error::invalid_mac(s, "more than 6 octets"));
        }

        Ok(Self(octets))
    }
}

/// Device TCP/IP parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetParams {
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub mac: MacAddress,
    pub gateway: Ipv4Addr,
    /// Server the device pushes real-time records to
    pub server: Ipv4Addr,
    pub far: u8,
    pub com: u16,
    pub mode: u8,
    pub dhcp: bool,
}

impl fmt::Display for NetParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ip={} netmask={} mac={} gw={} server={} dhcp={}",
            self.ip, self.netmask, self.mac, self.gateway, self.server, self.dhcp
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mac_display_lowercase() {
        let mac = MacAddress([0x00, 0x1B, 0x44, 0x11, 0x3A, 0xB7]);
        assert_eq!(mac.to_string(), "00:1b:44:11:3a:b7");
    }

    #[test]
    fn test_mac_parse() {
        let mac: MacAddress = "00:1B:44:11:3a:b7".parse().unwrap();
        assert_eq!(mac.0, [0x00, 0x1B, 0x44, 0x11, 0x3A, 0xB7]);

        assert!("00:1b:44".parse::<MacAddress>().is_err());
        assert!("00:1b:44:11:3a:b7:ff".parse::<MacAddress>().is_err());
        assert!("zz:1b:44:11:3a:b7".parse::<MacAddress>().is_err());
    }
}
