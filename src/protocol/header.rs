//! Request header decoding.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use thiserror::Error;

/// Smallest buffer worth inspecting at all.
pub const MIN_HEADER_LEN: usize = 24;

const IDENTITY_LEN: usize = 16;
const DNS_PORT: u16 = 53;

/// Header decoding failures. All are fatal and happen before any network action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("short header: need {needed} bytes, got {actual}")]
    ShortHeader { needed: usize, actual: usize },

    #[error("unauthenticated requester")]
    Unauthenticated,

    #[error("unsupported command {0}")]
    UnsupportedCommand(u8),

    #[error("udp is only supported for dns (port 53), got port {0}")]
    UnsupportedUdpTarget(u16),

    #[error("invalid address type {0}")]
    InvalidAddressType(u8),

    #[error("empty destination address")]
    EmptyAddress,

    #[error("destination domain is not ascii")]
    InvalidDomain,
}

/// Requested outbound transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Tcp,
    Udp,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Tcp => "tcp",
            Command::Udp => "udp",
        }
    }
}

/// Destination address as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Ipv4(Ipv4Addr),
    Domain(String),
    Ipv6(Ipv6Addr),
}

impl Address {
    /// Host string suitable for `TcpStream::connect((host, port))`.
    pub fn host(&self) -> String {
        match self {
            Address::Ipv4(ip) => ip.to_string(),
            Address::Domain(domain) => domain.clone(),
            Address::Ipv6(ip) => ip.to_string(),
        }
    }

    /// Domain name, if the destination was not a literal.
    pub fn domain(&self) -> Option<&str> {
        match self {
            Address::Domain(domain) => Some(domain),
            _ => None,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Ipv4(ip) => write!(f, "{}", ip),
            Address::Domain(domain) => f.write_str(domain),
            Address::Ipv6(ip) => write!(f, "[{}]", ip),
        }
    }
}

/// Decoded request header of one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRequest {
    pub version: u8,
    pub identity: [u8; 16],
    pub command: Command,
    pub address: Address,
    pub port: u16,
    /// Index of the first payload byte after the header.
    pub payload_offset: usize,
}

/// Parse the header at the start of `buf`, admitting only `identity`.
pub fn decode_header(buf: &[u8], identity: &[u8; 16]) -> Result<ConnectionRequest, DecodeError> {
    let short = |needed: usize| DecodeError::ShortHeader {
        needed,
        actual: buf.len(),
    };

    if buf.len() < MIN_HEADER_LEN {
        return Err(short(MIN_HEADER_LEN));
    }

    let version = buf[0];
    let mut requester = [0u8; IDENTITY_LEN];
    requester.copy_from_slice(&buf[1..1 + IDENTITY_LEN]);
    if &requester != identity {
        return Err(DecodeError::Unauthenticated);
    }

    let addon_len = buf[17] as usize;
    // command(1) + port(2) + addr_type(1) + at least one address byte
    let mut cursor = 18 + addon_len;
    if buf.len() < cursor + 5 {
        return Err(short(cursor + 5));
    }

    let command = match buf[cursor] {
        1 => Command::Tcp,
        2 => Command::Udp,
        other => return Err(DecodeError::UnsupportedCommand(other)),
    };
    cursor += 1;

    let port = u16::from_be_bytes([buf[cursor], buf[cursor + 1]]);
    cursor += 2;
    if command == Command::Udp && port != DNS_PORT {
        return Err(DecodeError::UnsupportedUdpTarget(port));
    }

    let addr_type = buf[cursor];
    cursor += 1;

    let address = match addr_type {
        1 => {
            let end = cursor + 4;
            let octets: [u8; 4] = buf.get(cursor..end).ok_or(short(end))?.try_into().map_err(|_| short(end))?;
            cursor = end;
            Address::Ipv4(Ipv4Addr::from(octets))
        }
        2 => {
            let len = buf[cursor] as usize;
            if len == 0 {
                return Err(DecodeError::EmptyAddress);
            }
            let start = cursor + 1;
            let end = start + len;
            let raw = buf.get(start..end).ok_or(short(end))?;
            if !raw.is_ascii() {
                return Err(DecodeError::InvalidDomain);
            }
            cursor = end;
            Address::Domain(String::from_utf8_lossy(raw).into_owned())
        }
        3 => {
            let end = cursor + 16;
            let octets: [u8; 16] = buf.get(cursor..end).ok_or(short(end))?.try_into().map_err(|_| short(end))?;
            cursor = end;
            Address::Ipv6(Ipv6Addr::from(octets))
        }
        other => return Err(DecodeError::InvalidAddressType(other)),
    };

    Ok(ConnectionRequest {
        version,
        identity: requester,
        command,
        address,
        port,
        payload_offset: cursor,
    })
}
