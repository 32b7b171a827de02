//! Protocol-level types shared by the control plane
//!
//! Address families, packet buffers, protocol numbers and ICMP error
//! reports. Wire encoding is owned by the protocol engines.

pub mod family;
pub mod icmp;
pub mod packet;
pub mod types;

pub use family::{AddressFamily, Ipv4, Ipv6};
pub use icmp::{IcmpError, IcmpErrorKind};
pub use packet::{IpPacket, Packet};
pub use types::*;
