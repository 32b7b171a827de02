//! inetstack - IP-layer control plane
//!
//! Filter hooks, link-address caching, address configuration, DHCP/DNS
//! bindings and forwarding control for a single network interface,
//! generic over the IP address family.

pub mod config;
pub mod dataplane;
pub mod driver;
pub mod error;
pub mod protocol;
pub mod smp;
pub mod telemetry;

pub use dataplane::{Inet, Stack};
pub use error::{Error, Result};
pub use protocol::{AddressFamily, IpPacket, Ipv4, Ipv6, MacAddr, Packet, Protocol};
