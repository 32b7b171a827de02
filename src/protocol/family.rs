//! IP address families
//!
//! The stack is written once against [`AddressFamily`] and instantiated
//! per IP version. Each family supplies its address type, the unspecified
//! sentinel and the handful of address predicates the control plane needs.

use std::fmt;
use std::hash::Hash;
use std::net::{Ipv4Addr, Ipv6Addr};

/// An IP version the stack can be instantiated for
pub trait AddressFamily: fmt::Debug + Send + Sync + 'static {
    /// Address value type
    type Addr: Copy + Eq + Ord + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// Unspecified address ("any")
    const ADDR_ANY: Self::Addr;

    /// Family name used in diagnostics
    const NAME: &'static str;

    /// Host loopback range (127/8, ::1)
    fn is_loopback(addr: Self::Addr) -> bool;

    /// True if `a` and `b` share the network selected by `mask`
    fn same_subnet(a: Self::Addr, b: Self::Addr, mask: Self::Addr) -> bool;

    /// Directed broadcast address for `ip`/`mask`, `ADDR_ANY` if the family
    /// has no broadcast
    fn broadcast(ip: Self::Addr, mask: Self::Addr) -> Self::Addr;

    /// True if the address is a broadcast destination for the given network
    fn is_broadcast(addr: Self::Addr, ip: Self::Addr, mask: Self::Addr) -> bool;
}

/// IPv4
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4;

/// IPv6
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6;

impl AddressFamily for Ipv4 {
    type Addr = Ipv4Addr;

    const ADDR_ANY: Ipv4Addr = Ipv4Addr::UNSPECIFIED;
    const NAME: &'static str = "ipv4";

    fn is_loopback(addr: Ipv4Addr) -> bool {
        addr.is_loopback()
    }

    fn same_subnet(a: Ipv4Addr, b: Ipv4Addr, mask: Ipv4Addr) -> bool {
        let mask = u32::from(mask);
        (u32::from(a) & mask) == (u32::from(b) & mask)
    }

    fn broadcast(ip: Ipv4Addr, mask: Ipv4Addr) -> Ipv4Addr {
        if ip.is_unspecified() {
            return Ipv4Addr::UNSPECIFIED;
        }
        Ipv4Addr::from(u32::from(ip) | !u32::from(mask))
    }

    fn is_broadcast(addr: Ipv4Addr, ip: Ipv4Addr, mask: Ipv4Addr) -> bool {
        addr.is_broadcast() || (!ip.is_unspecified() && addr == Self::broadcast(ip, mask))
    }
}

impl AddressFamily for Ipv6 {
    type Addr = Ipv6Addr;

    const ADDR_ANY: Ipv6Addr = Ipv6Addr::UNSPECIFIED;
    const NAME: &'static str = "ipv6";

    fn is_loopback(addr: Ipv6Addr) -> bool {
        addr.is_loopback()
    }

    fn same_subnet(a: Ipv6Addr, b: Ipv6Addr, mask: Ipv6Addr) -> bool {
        let mask = u128::from(mask);
        (u128::from(a) & mask) == (u128::from(b) & mask)
    }

    fn broadcast(_ip: Ipv6Addr, _mask: Ipv6Addr) -> Ipv6Addr {
        Ipv6Addr::UNSPECIFIED
    }

    fn is_broadcast(_addr: Ipv6Addr, _ip: Ipv6Addr, _mask: Ipv6Addr) -> bool {
        false
    }
}

/// Convert a prefix length into an IPv4 netmask
pub fn ipv4_mask(prefix_len: u8) -> Ipv4Addr {
    if prefix_len == 0 {
        Ipv4Addr::UNSPECIFIED
    } else {
        Ipv4Addr::from(!0u32 << (32 - prefix_len.min(32)))
    }
}

/// Convert an IPv4 netmask to its prefix length
pub fn ipv4_prefix_len(mask: Ipv4Addr) -> u8 {
    u32::from(mask).leading_ones() as u8
}
