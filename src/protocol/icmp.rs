//! ICMP error reports (RFC 792, RFC 1122 section 3.2.2)
//!
//! The ICMP engine itself lives outside the control plane. What crosses
//! the boundary is a decoded error report that the stack routes to the
//! transport protocol that sent the offending packet.

use std::fmt;

/// ICMP error categories that are reported upward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpErrorKind {
    DestinationUnreachable,
    TimeExceeded,
    ParameterProblem,
}

impl IcmpErrorKind {
    /// Map an ICMPv4 type number, `None` for non-error messages
    pub fn from_type(icmp_type: u8) -> Option<Self> {
        match icmp_type {
            3 => Some(IcmpErrorKind::DestinationUnreachable),
            11 => Some(IcmpErrorKind::TimeExceeded),
            12 => Some(IcmpErrorKind::ParameterProblem),
            _ => None,
        }
    }
}

/// Destination Unreachable codes (RFC 792)
pub mod dest_unreachable {
    pub const NET_UNREACHABLE: u8 = 0;
    pub const HOST_UNREACHABLE: u8 = 1;
    pub const PROTOCOL_UNREACHABLE: u8 = 2;
    pub const PORT_UNREACHABLE: u8 = 3;
    /// Fragmentation needed but DF set
    pub const FRAGMENTATION_NEEDED: u8 = 4;
}

/// A received ICMP error, decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcmpError {
    pub kind: IcmpErrorKind,
    pub code: u8,
    /// Next-hop MTU from a "fragmentation needed" message
    pub next_hop_mtu: Option<u16>,
}

impl IcmpError {
    pub fn new(kind: IcmpErrorKind, code: u8) -> Self {
        Self {
            kind,
            code,
            next_hop_mtu: None,
        }
    }

    /// Fragmentation-needed report carrying the path MTU
    pub fn fragmentation_needed(mtu: u16) -> Self {
        Self {
            kind: IcmpErrorKind::DestinationUnreachable,
            code: dest_unreachable::FRAGMENTATION_NEEDED,
            next_hop_mtu: Some(mtu),
        }
    }

    /// Path MTU discovery signal
    pub fn is_too_big(&self) -> bool {
        self.kind == IcmpErrorKind::DestinationUnreachable
            && self.code == dest_unreachable::FRAGMENTATION_NEEDED
    }

    /// Hard errors abort a connection attempt (RFC 1122 4.2.3.9)
    pub fn is_hard(&self) -> bool {
        self.kind == IcmpErrorKind::DestinationUnreachable
            && matches!(
                self.code,
                dest_unreachable::PROTOCOL_UNREACHABLE | dest_unreachable::PORT_UNREACHABLE
            )
    }
}

impl fmt::Display for IcmpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} (code {})", self.kind, self.code)?;
        if let Some(mtu) = self.next_hop_mtu {
            write!(f, ", mtu {}", mtu)?;
        }
        Ok(())
    }
}
