//! Data plane components
//!
//! The per-interface IP stack: configuration, filter chains, link cache,
//! routing hooks and the contracts for external DHCP, DNS and transport
//! components.

mod dhcp;
mod dns;
mod filter;
mod ifconfig;
mod inet;
mod link_cache;
mod routing;
mod stack;
mod transport;

pub use dhcp::{DhcpClient, DhcpTimeoutFn, Lease, SessionId, DEFAULT_DHCP_TIMEOUT};
pub use dns::{validate_hostname, ResolveFn, Resolver};
pub use filter::{FilterChain, FilterChains, Hook, Packetfilter, Verdict};
pub use ifconfig::{IfConfig, VipList};
pub use inet::{Inet, IpPacketFactory, OnConfigured, TransmitAvailFn};
pub use link_cache::{LinkCache, DEFAULT_FLUSH_INTERVAL};
pub use routing::{forwarder, ForwardDelg, Route, RouteChecker, RoutingTable};
pub use stack::Stack;
pub use transport::Transport;
