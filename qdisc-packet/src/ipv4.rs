use std::net::Ipv4Addr;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::ecn::{Ecn, EcnHeader};

/// Length of an IPv4 header without options.
pub const IPV4_HEADER_LEN: usize = 20;

/// Largest payload that fits in a datagram whose total length is a `u16`.
pub const IPV4_MAX_PAYLOAD: usize = u16::MAX as usize - IPV4_HEADER_LEN;

/// Largest DSCP value (6 bits).
pub const DSCP_MAX: u8 = 0b11_1111;

/// Errors from decoding or encoding IPv4 headers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// The buffer is shorter than a header.
    #[error("Buffer too short: {0} bytes")]
    Truncated(usize),
    /// The version field is not 4.
    #[error("Invalid IP version: {0}")]
    Version(u8),
    /// The header carries options.
    #[error("IPv4 options are not supported (IHL {0})")]
    Options(u8),
    /// The total length field disagrees with the buffer.
    #[error("Total length {total} does not match buffer length {actual}")]
    Length { total: u16, actual: usize },
    /// The header checksum is wrong.
    #[error("Header checksum mismatch: expected {expected:#06x}, found {found:#06x}")]
    Checksum { expected: u16, found: u16 },
    /// The payload does not fit in the 16-bit total length.
    #[error("Payload of {0} bytes exceeds the IPv4 maximum of 65515")]
    Oversized(usize),
    /// The DSCP value is wider than 6 bits.
    #[error("DSCP {0} does not fit in 6 bits")]
    Dscp(u8),
}

/// An IPv4 header without options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Header {
    /// Differentiated services code point (6 bits).
    pub dscp: u8,
    /// ECN codepoint (2 bits).
    pub ecn: Ecn,
    /// Fragment identification.
    pub identification: u16,
    /// Flags (3 bits) and fragment offset (13 bits), as found on the wire.
    pub flags_fragment: u16,
    /// Time to live.
    pub ttl: u8,
    /// Protocol number of the payload.
    pub protocol: u8,
    /// Source address.
    pub source: Ipv4Addr,
    /// Destination address.
    pub destination: Ipv4Addr,
}

impl Default for Ipv4Header {
    fn default() -> Self {
        Self {
            dscp: 0,
            ecn: Ecn::NotEct,
            identification: 0,
            // Don't fragment
            flags_fragment: 0x4000,
            ttl: 64,
            // TCP
            protocol: 6,
            source: Ipv4Addr::UNSPECIFIED,
            destination: Ipv4Addr::UNSPECIFIED,
        }
    }
}

impl Ipv4Header {
    /// Returns the combined TOS byte (DSCP and ECN). Only the low 6 bits of the DSCP are
    /// kept; [`encode`](Self::encode) rejects larger values.
    #[inline]
    pub fn tos(&self) -> u8 {
        ((self.dscp & DSCP_MAX) << 2) | self.ecn as u8
    }

    /// Returns the length of the header in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        IPV4_HEADER_LEN
    }

    /// Always `false`, a header is never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Writes the header for a datagram carrying `payload_len` bytes into `dst`,
    /// computing the header checksum. Nothing is written on error.
    pub fn encode(&self, payload_len: usize, dst: &mut BytesMut) -> Result<(), WireError> {
        if self.dscp > DSCP_MAX {
            return Err(WireError::Dscp(self.dscp));
        }

        if payload_len > IPV4_MAX_PAYLOAD {
            return Err(WireError::Oversized(payload_len));
        }

        let total = (IPV4_HEADER_LEN + payload_len) as u16;

        let start = dst.len();
        dst.reserve(IPV4_HEADER_LEN);
        // Version 4, IHL 5
        dst.put_u8(0x45);
        dst.put_u8(self.tos());
        dst.put_u16(total);
        dst.put_u16(self.identification);
        dst.put_u16(self.flags_fragment);
        dst.put_u8(self.ttl);
        dst.put_u8(self.protocol);
        dst.put_u16(0);
        dst.put_slice(&self.source.octets());
        dst.put_slice(&self.destination.octets());

        let checksum = checksum(&dst[start..start + IPV4_HEADER_LEN]);
        dst[start + 10..start + 12].copy_from_slice(&checksum.to_be_bytes());
        Ok(())
    }

    /// Parses a full IPv4 datagram, returning the header and the payload.
    pub fn decode(mut src: Bytes) -> Result<(Self, Bytes), WireError> {
        if src.len() < IPV4_HEADER_LEN {
            return Err(WireError::Truncated(src.len()));
        }

        let version = src[0] >> 4;
        if version != 4 {
            return Err(WireError::Version(version));
        }

        let ihl = src[0] & 0x0f;
        if ihl != 5 {
            return Err(WireError::Options(ihl));
        }

        let expected = checksum_with_field_zeroed(&src[..IPV4_HEADER_LEN]);
        let found = u16::from_be_bytes([src[10], src[11]]);
        if expected != found {
            return Err(WireError::Checksum { expected, found });
        }

        let actual = src.len();
        src.advance(1);
        let tos = src.get_u8();
        let total = src.get_u16();
        if total as usize != actual {
            return Err(WireError::Length { total, actual });
        }

        let identification = src.get_u16();
        let flags_fragment = src.get_u16();
        let ttl = src.get_u8();
        let protocol = src.get_u8();
        let _checksum = src.get_u16();
        let source = Ipv4Addr::from(src.get_u32());
        let destination = Ipv4Addr::from(src.get_u32());

        let header = Self {
            dscp: tos >> 2,
            // Two bits always form a valid codepoint
            ecn: Ecn::try_from(tos & 0b11).unwrap_or_default(),
            identification,
            flags_fragment,
            ttl,
            protocol,
            source,
            destination,
        };

        Ok((header, src))
    }
}

impl EcnHeader for Ipv4Header {
    #[inline]
    fn ecn(&self) -> Ecn {
        self.ecn
    }

    #[inline]
    fn set_ecn(&mut self, ecn: Ecn) {
        self.ecn = ecn;
    }
}

/// RFC 1071 internet checksum over `header`.
fn checksum(header: &[u8]) -> u16 {
    let mut sum: u32 = header
        .chunks(2)
        .map(|pair| u32::from(u16::from_be_bytes([pair[0], pair.get(1).copied().unwrap_or(0)])))
        .sum();

    while sum > 0xffff {
        sum = (sum & 0xffff) + (sum >> 16);
    }

    !(sum as u16)
}

fn checksum_with_field_zeroed(header: &[u8]) -> u16 {
    let mut copy = [0u8; IPV4_HEADER_LEN];
    copy.copy_from_slice(header);
    copy[10] = 0;
    copy[11] = 0;
    checksum(&copy)
}
