use std::sync::atomic::{AtomicU64, Ordering};

use bytes::{Bytes, BytesMut};

mod classify;
mod ecn;
mod ipv4;
pub use classify::*;
pub use ecn::*;
pub use ipv4::*;

/// Source of packet ids, unique for the lifetime of the process.
static NEXT_UID: AtomicU64 = AtomicU64::new(0);

/// A packet as seen by a queueing discipline: an optional network header and an opaque
/// payload.
///
/// Cloning is cheap: the payload is reference-counted and the header is a few bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    uid: u64,
    header: Option<Ipv4Header>,
    payload: Bytes,
}

impl Packet {
    /// Creates a packet without a network header.
    pub fn new(payload: Bytes) -> Self {
        Self { uid: NEXT_UID.fetch_add(1, Ordering::Relaxed), header: None, payload }
    }

    /// Creates an IPv4 packet.
    pub fn with_ipv4(header: Ipv4Header, payload: Bytes) -> Self {
        Self { header: Some(header), ..Self::new(payload) }
    }

    /// Parses a raw IPv4 datagram.
    pub fn from_wire(datagram: Bytes) -> Result<Self, WireError> {
        let (header, payload) = Ipv4Header::decode(datagram)?;
        Ok(Self::with_ipv4(header, payload))
    }

    /// Serializes the packet. Packets without a header yield their payload unchanged.
    pub fn to_wire(&self) -> Result<Bytes, WireError> {
        match &self.header {
            Some(header) => {
                let mut buf = BytesMut::with_capacity(self.len());
                header.encode(self.payload.len(), &mut buf)?;
                buf.extend_from_slice(&self.payload);
                Ok(buf.freeze())
            }
            None => Ok(self.payload.clone()),
        }
    }

    /// Process-unique id of this packet. Ids are handed out in creation order.
    #[inline]
    pub fn uid(&self) -> u64 {
        self.uid
    }

    /// Size of the packet in bytes, header included.
    #[inline]
    pub fn len(&self) -> usize {
        self.header.as_ref().map_or(0, Ipv4Header::len) + self.payload.len()
    }

    /// Returns `true` for a header-less packet with an empty payload.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Payload after the header, if any.
    #[inline]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Consumes the packet, returning its payload.
    #[inline]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// The IPv4 header, if the packet has one.
    #[inline]
    pub fn ipv4(&self) -> Option<&Ipv4Header> {
        self.header.as_ref()
    }

    /// Returns the packet's ECN codepoint, if it carries a header with an ECN field.
    #[inline]
    pub fn ecn(&self) -> Option<Ecn> {
        self.header.as_ref().map(EcnHeader::ecn)
    }

    /// Returns the header's ECN field, if any.
    #[inline]
    pub fn ecn_header_mut(&mut self) -> Option<&mut dyn EcnHeader> {
        self.header.as_mut().map(|header| header as &mut dyn EcnHeader)
    }

    /// Signals congestion experienced on this packet. Only ECT(1) packets can be marked;
    /// on error the packet is left untouched.
    pub fn mark_ce(&mut self) -> Result<(), MarkError> {
        let header = self.ecn_header_mut().ok_or(MarkError::NoEcnHeader)?;
        ecn::mark_ce(header)
    }
}
