//! Layer 2 to layer 4 header parsing of raw frames.
//!
//! Parsing goes strictly layer by layer: Ethernet, IPv4, then TCP or UDP.
//! Before any field is read, the whole header it belongs to must lie inside
//! the frame. The slice length is the exclusive end of the frame.
//!
//! Frames outside our scope (another ethertype, another transport protocol,
//! a non-first fragment) are [`ParseError::NotApplicable`]. Frames that claim
//! to be in scope but don't fit are [`ParseError::Malformed`].

use std::{fmt, str::FromStr};

use thiserror::Error;

pub const ETH_HDR_LEN: usize = 14;
pub const ETH_P_IP: u16 = 0x0800;
pub const IPV4_MIN_HDR_LEN: usize = 20;
pub const TCP_HDR_LEN: usize = 20;
pub const UDP_HDR_LEN: usize = 8;

const ETH_PROTO_OFFSET: usize = 12;
const IPV4_FRAG_OFFSET: usize = 6;
const IPV4_PROTO_OFFSET: usize = 9;
const IPV4_FRAG_MASK: u16 = 0x1fff;
const SRC_PORT_OFFSET: usize = 0;
const DST_PORT_OFFSET: usize = 2;

/// Transport protocols we classify, with their IP protocol numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IpProto {
    Tcp = 6,
    Udp = 17,
}

impl IpProto {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            6 => Some(IpProto::Tcp),
            17 => Some(IpProto::Udp),
            _ => None,
        }
    }

    pub fn as_raw(self) -> u8 {
        self as u8
    }

    fn header_len(self) -> usize {
        match self {
            IpProto::Tcp => TCP_HDR_LEN,
            IpProto::Udp => UDP_HDR_LEN,
        }
    }

    fn layer(self) -> Layer {
        match self {
            IpProto::Tcp => Layer::Tcp,
            IpProto::Udp => Layer::Udp,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown transport protocol {0:?}, expected tcp or udp")]
pub struct UnknownProtocol(String);

impl FromStr for IpProto {
    type Err = UnknownProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" | "6" => Ok(IpProto::Tcp),
            "udp" | "17" => Ok(IpProto::Udp),
            _ => Err(UnknownProtocol(s.to_string())),
        }
    }
}

impl fmt::Display for IpProto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpProto::Tcp => write!(f, "tcp"),
            IpProto::Udp => write!(f, "udp"),
        }
    }
}

/// What we extract from a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L4Header {
    pub protocol: IpProto,
    pub src_port: u16,
    pub dst_port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Ethernet,
    Ipv4,
    Tcp,
    Udp,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Layer::Ethernet => "ethernet",
            Layer::Ipv4 => "ipv4",
            Layer::Tcp => "tcp",
            Layer::Udp => "udp",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("not applicable: {0}")]
    NotApplicable(Unsupported),
    #[error("malformed frame: {0}")]
    Malformed(Malformed),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unsupported {
    #[error("ethertype {0:#06x}")]
    EtherType(u16),
    #[error("ip protocol {0}")]
    IpProtocol(u8),
    #[error("non-first ipv4 fragment")]
    Fragment,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Malformed {
    #[error("{layer} header needs {needed} bytes at offset {offset}, frame has {len}")]
    Truncated {
        layer: Layer,
        offset: usize,
        needed: usize,
        len: usize,
    },
    #[error("ipv4 version {0}")]
    Ipv4Version(u8),
    #[error("ipv4 header length {0} words")]
    Ipv4HeaderLength(u8),
}

impl ParseError {
    pub fn is_malformed(&self) -> bool {
        matches!(self, ParseError::Malformed(_))
    }
}

/// Extract the transport protocol and ports of an Ethernet frame.
pub fn parse_l4(frame: &[u8]) -> Result<L4Header, ParseError> {
    let eth = header(frame, 0, ETH_HDR_LEN, Layer::Ethernet)?;
    let ether_type = read_u16(eth, ETH_PROTO_OFFSET);
    if ether_type != ETH_P_IP {
        return Err(ParseError::NotApplicable(Unsupported::EtherType(
            ether_type,
        )));
    }

    let ip_offset = ETH_HDR_LEN;
    let ip = header(frame, ip_offset, IPV4_MIN_HDR_LEN, Layer::Ipv4)?;
    let version = ip[0] >> 4;
    if version != 4 {
        return Err(ParseError::Malformed(Malformed::Ipv4Version(version)));
    }
    let ihl = ip[0] & 0x0f;
    if (ihl as usize) * 4 < IPV4_MIN_HDR_LEN {
        return Err(ParseError::Malformed(Malformed::Ipv4HeaderLength(ihl)));
    }
    let ip_len = ihl as usize * 4;
    header(frame, ip_offset, ip_len, Layer::Ipv4)?;

    let raw_proto = ip[IPV4_PROTO_OFFSET];
    let protocol = IpProto::from_raw(raw_proto).ok_or(ParseError::NotApplicable(
        Unsupported::IpProtocol(raw_proto),
    ))?;
    if read_u16(ip, IPV4_FRAG_OFFSET) & IPV4_FRAG_MASK != 0 {
        return Err(ParseError::NotApplicable(Unsupported::Fragment));
    }

    let l4 = header(
        frame,
        ip_offset + ip_len,
        protocol.header_len(),
        protocol.layer(),
    )?;
    Ok(L4Header {
        protocol,
        src_port: read_u16(l4, SRC_PORT_OFFSET),
        dst_port: read_u16(l4, DST_PORT_OFFSET),
    })
}

/// The `len` bytes at `offset`, or the reason they don't fit.
fn header(frame: &[u8], offset: usize, len: usize, layer: Layer) -> Result<&[u8], ParseError> {
    offset
        .checked_add(len)
        .and_then(|end| frame.get(offset..end))
        .ok_or(ParseError::Malformed(Malformed::Truncated {
            layer,
            offset,
            needed: len,
            len: frame.len(),
        }))
}

/// Callers pass slices already checked to contain `offset + 2` bytes.
fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}
