use thiserror::Error;

/// Explicit Congestion Notification codepoint, as carried in the two low bits of the
/// IPv4 TOS / IPv6 traffic class byte (RFC 3168).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Ecn {
    /// Not ECN-capable transport.
    #[default]
    NotEct = 0b00,
    /// ECN-capable transport, ECT(1).
    Ect1 = 0b01,
    /// ECN-capable transport, ECT(0).
    Ect0 = 0b10,
    /// Congestion experienced.
    Ce = 0b11,
}

impl Ecn {
    /// Returns `true` if the codepoint signals an ECN-capable transport.
    #[inline]
    pub fn is_ect(self) -> bool {
        matches!(self, Ecn::Ect0 | Ecn::Ect1)
    }
}

impl TryFrom<u8> for Ecn {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0b00 => Ok(Ecn::NotEct),
            0b01 => Ok(Ecn::Ect1),
            0b10 => Ok(Ecn::Ect0),
            0b11 => Ok(Ecn::Ce),
            _ => Err(value),
        }
    }
}

/// A network header that carries an ECN field.
///
/// Queueing disciplines only need to read and rewrite the codepoint, so this is all they
/// get to see of a header.
pub trait EcnHeader {
    /// Returns the current ECN codepoint.
    fn ecn(&self) -> Ecn;

    /// Overwrites the ECN codepoint.
    fn set_ecn(&mut self, ecn: Ecn);
}

/// Reasons a congestion mark could not be applied to a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MarkError {
    /// The packet has no header to mark.
    #[error("Packet has no header with an ECN field")]
    NoEcnHeader,
    /// Only ECT(1) packets may be marked.
    #[error("ECN field is {0:?}, expected ECT(1)")]
    NotEct1(Ecn),
}

/// Rewrites an ECT(1) codepoint to CE. Any other codepoint is left untouched.
pub fn mark_ce(header: &mut dyn EcnHeader) -> Result<(), MarkError> {
    match header.ecn() {
        Ecn::Ect1 => {
            header.set_ecn(Ecn::Ce);
            Ok(())
        }
        other => Err(MarkError::NotEct1(other)),
    }
}
