//! Interface address configuration
//!
//! Holds the primary address, netmask, gateway, DNS server, domain name and
//! the virtual-IP set. Only the stack mutates it.

use crate::protocol::AddressFamily;
use std::collections::HashSet;

/// Virtual IP set
pub type VipList<F> = HashSet<<F as AddressFamily>::Addr>;

/// Address state of one interface
#[derive(Debug)]
pub struct IfConfig<F: AddressFamily> {
    ip: F::Addr,
    netmask: F::Addr,
    gateway: F::Addr,
    dns: F::Addr,
    domain_name: String,
    configured: bool,
    vips: VipList<F>,
}

impl<F: AddressFamily> IfConfig<F> {
    /// Unconfigured state, every address unspecified
    pub fn new() -> Self {
        Self {
            ip: F::ADDR_ANY,
            netmask: F::ADDR_ANY,
            gateway: F::ADDR_ANY,
            dns: F::ADDR_ANY,
            domain_name: String::new(),
            configured: false,
            vips: HashSet::new(),
        }
    }

    pub fn configure(&mut self, ip: F::Addr, netmask: F::Addr, gateway: F::Addr, dns: F::Addr) {
        self.ip = ip;
        self.netmask = netmask;
        self.gateway = gateway;
        self.dns = dns;
        self.configured = true;
    }

    /// Back to unconfigured. Virtual IPs are kept.
    pub fn reset(&mut self) {
        self.ip = F::ADDR_ANY;
        self.netmask = F::ADDR_ANY;
        self.gateway = F::ADDR_ANY;
        self.dns = F::ADDR_ANY;
        self.configured = false;
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn ip(&self) -> F::Addr {
        self.ip
    }

    pub fn netmask(&self) -> F::Addr {
        self.netmask
    }

    pub fn gateway(&self) -> F::Addr {
        self.gateway
    }

    pub fn dns(&self) -> F::Addr {
        self.dns
    }

    pub fn broadcast(&self) -> F::Addr {
        F::broadcast(self.ip, self.netmask)
    }

    pub fn set_gateway(&mut self, gateway: F::Addr) {
        self.gateway = gateway;
    }

    pub fn set_dns(&mut self, dns: F::Addr) {
        self.dns = dns;
    }

    pub fn domain_name(&self) -> &str {
        &self.domain_name
    }

    pub fn set_domain_name(&mut self, name: String) {
        self.domain_name = name;
    }

    pub fn vips(&self) -> &VipList<F> {
        &self.vips
    }

    pub fn add_vip(&mut self, addr: F::Addr) -> bool {
        self.vips.insert(addr)
    }

    pub fn remove_vip(&mut self, addr: &F::Addr) -> bool {
        self.vips.remove(addr)
    }

    /// Our primary address (once configured), a virtual IP, or host loopback
    pub fn is_loopback(&self, addr: F::Addr) -> bool {
        self.is_primary(addr) || self.vips.contains(&addr) || F::is_loopback(addr)
    }

    fn is_primary(&self, addr: F::Addr) -> bool {
        self.configured && addr != F::ADDR_ANY && addr == self.ip
    }

    /// True if `addr` is on the directly attached network
    pub fn is_on_link(&self, addr: F::Addr) -> bool {
        self.configured && F::same_subnet(addr, self.ip, self.netmask)
    }

    /// True if the packet destination is this host
    pub fn is_local_destination(&self, addr: F::Addr) -> bool {
        self.is_loopback(addr) || F::is_broadcast(addr, self.ip, self.netmask)
    }

    /// Source address for packets towards `dest`
    ///
    /// A destination that is host loopback or one of our virtual IPs is
    /// answered from itself. The primary address covers its own subnet; a
    /// virtual IP only wins for a destination outside it, and then the
    /// lowest VIP sharing the destination's subnet is chosen. Without a
    /// configuration there is no subnet to match, so the primary (unspecified)
    /// address is returned.
    pub fn source_for(&self, dest: F::Addr) -> F::Addr {
        if F::is_loopback(dest) || self.vips.contains(&dest) {
            return dest;
        }
        if !self.configured || self.is_on_link(dest) {
            return self.ip;
        }
        self.vips
            .iter()
            .copied()
            .filter(|vip| F::same_subnet(*vip, dest, self.netmask))
            .min()
            .unwrap_or(self.ip)
    }

    /// Primary address, a virtual IP, or a loopback address
    pub fn is_valid_source(&self, addr: F::Addr) -> bool {
        self.is_loopback(addr)
    }
}

impl<F: AddressFamily> Default for IfConfig<F> {
    fn default() -> Self {
        Self::new()
    }
}
