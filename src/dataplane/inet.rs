//! The IP stack interface
//!
//! [`Inet`] is the full capability set of one stack instance, written once
//! for every address family. Filter stages, forwarders and configuration
//! handlers all see the stack through this trait, so it stays object safe.

use crate::dataplane::{
    DhcpTimeoutFn, FilterChain, ForwardDelg, Hook, ResolveFn, RouteChecker, Transport, VipList,
};
use crate::driver::Nic;
use crate::protocol::{AddressFamily, IcmpError, IpPacket, MacAddr, Packet, Protocol};
use std::time::{Duration, Instant};

/// Handler fired every time the stack becomes configured
pub type OnConfigured<F> = Box<dyn FnMut(&mut dyn Inet<F>) + Send>;

/// Notification carrying the number of free transmit-queue slots
pub type TransmitAvailFn = Box<dyn FnMut(usize) + Send>;

/// Allocates IP packets from the driver's buffer store
pub type IpPacketFactory<F> = Box<dyn Fn(Protocol) -> Option<IpPacket<F>> + Send + Sync>;

pub trait Inet<F: AddressFamily> {
    //
    // Network configuration
    //

    /// IP address of this interface
    fn ip_addr(&self) -> F::Addr;

    fn netmask(&self) -> F::Addr;

    /// Default gateway
    fn gateway(&self) -> F::Addr;

    /// DNS server
    fn dns_addr(&self) -> F::Addr;

    fn broadcast_addr(&self) -> F::Addr;

    fn set_gateway(&mut self, gateway: F::Addr);

    fn set_dns_server(&mut self, server: F::Addr);

    /// Configure the interface; fires every `on_config` handler
    fn network_config(&mut self, ip: F::Addr, netmask: F::Addr, gateway: F::Addr, dns: F::Addr);

    /// Return to the unconfigured state
    fn reset_config(&mut self);

    /// Start DHCP; `on_timeout` receives `true` if the deadline passes first
    fn negotiate_dhcp(&mut self, timeout: Duration, on_timeout: Option<DhcpTimeoutFn>);

    fn is_configured(&self) -> bool;

    /// Register a handler for entering the configured state
    fn on_config(&mut self, handler: OnConfigured<F>);

    fn virtual_ips(&self) -> &VipList<F>;

    /// Our address, a virtual IP, or host loopback
    fn is_loopback(&self, addr: F::Addr) -> bool;

    fn add_vip(&mut self, addr: F::Addr);

    fn remove_vip(&mut self, addr: F::Addr);

    /// Source address to use towards `dest`
    fn get_source_addr(&self, dest: F::Addr) -> F::Addr;

    fn is_valid_source(&self, addr: F::Addr) -> bool;

    //
    // Packet filtering
    //

    fn chain(&self, hook: Hook) -> &FilterChain<F>;

    fn chain_mut(&mut self, hook: Hook) -> &mut FilterChain<F>;

    /// Before the routing decision
    fn prerouting_chain(&mut self) -> &mut FilterChain<F> {
        self.chain_mut(Hook::Prerouting)
    }

    /// After the routing decision
    fn postrouting_chain(&mut self) -> &mut FilterChain<F> {
        self.chain_mut(Hook::Postrouting)
    }

    /// Run by the forwarder
    fn forward_chain(&mut self) -> &mut FilterChain<F> {
        self.chain_mut(Hook::Forward)
    }

    /// Before protocol handlers
    fn input_chain(&mut self) -> &mut FilterChain<F> {
        self.chain_mut(Hook::Input)
    }

    /// After protocol handlers
    fn output_chain(&mut self) -> &mut FilterChain<F> {
        self.chain_mut(Hook::Output)
    }

    //
    // Protocol objects
    //

    fn set_transport(&mut self, protocol: Protocol, transport: Box<dyn Transport<F>>);

    fn transport(&mut self, protocol: Protocol) -> Option<&mut dyn Transport<F>>;

    fn tcp(&mut self) -> Option<&mut dyn Transport<F>> {
        self.transport(Protocol::Tcp)
    }

    fn udp(&mut self) -> Option<&mut dyn Transport<F>> {
        self.transport(Protocol::Udp)
    }

    fn icmp(&mut self) -> Option<&mut dyn Transport<F>> {
        self.transport(Protocol::Icmp)
    }

    /// An ICMP error arrived for `orig`; deliver it to the sending protocol
    fn error_report(&mut self, err: IcmpError, orig: IpPacket<F>);

    //
    // DNS
    //

    /// Resolve against the configured DNS server
    fn resolve(&mut self, hostname: &str, func: ResolveFn<F>, force: bool);

    /// Resolve against an explicit server
    fn resolve_with(&mut self, hostname: &str, server: F::Addr, func: ResolveFn<F>, force: bool);

    fn set_domain_name(&mut self, domain_name: String);

    fn domain_name(&self) -> &str;

    //
    // Link layer
    //

    /// Driver this stack is bound to
    fn nic(&self) -> &dyn Nic<F>;

    fn ifname(&self) -> &str;

    fn link_addr(&self) -> MacAddr;

    fn cache_link_addr(&mut self, addr: F::Addr, link_addr: MacAddr);

    /// Cached link address, `None` if unknown or expired
    fn lookup_link_addr(&self, addr: F::Addr) -> Option<MacAddr>;

    fn flush_link_cache(&mut self);

    /// Age after which cached link addresses are invalid
    fn set_link_cache_flush_interval(&mut self, interval: Duration);

    //
    // Routing
    //

    /// Install or clear the forwarding delegate
    fn set_forward_delg(&mut self, delg: Option<ForwardDelg<F>>);

    /// Install or clear the route checker
    fn set_route_checker(&mut self, checker: Option<RouteChecker<F>>);

    fn forward_delg(&self) -> Option<ForwardDelg<F>>;

    /// Route checker answer, `true` when none is installed
    fn has_route(&self, addr: F::Addr) -> bool;

    //
    // Packet pipeline
    //

    /// Inbound packet from the driver
    fn receive(&mut self, packet: IpPacket<F>);

    /// Outbound packet from a protocol handler
    fn transmit(&mut self, packet: IpPacket<F>);

    /// Routed packet leaving the stack (postrouting, link resolution, driver)
    fn ship(&mut self, packet: IpPacket<F>);

    /// Timer processing: DHCP deadlines, link cache expiry
    fn poll(&mut self, now: Instant);

    //
    // Packet management
    //

    fn mtu(&self) -> u16;

    /// Empty anonymous packet from the buffer store
    fn create_packet(&self) -> Option<Packet>;

    fn ip_packet_factory(&self) -> IpPacketFactory<F>;

    /// Empty IP packet sourced from this interface
    fn create_ip_packet(&self, protocol: Protocol) -> Option<IpPacket<F>>;

    /// Register a recurring transmit-queue notification
    fn on_transmit_queue_available(&mut self, func: TransmitAvailFn);

    fn transmit_queue_available(&self) -> usize;

    fn buffers_available(&self) -> usize;

    fn buffers_total(&self) -> usize;

    /// Kick send processing, e.g. after system suspension
    fn force_start_send_queues(&mut self);

    //
    // SMP
    //

    /// Bind this stack to the calling execution context
    fn move_to_this_cpu(&mut self);

    fn get_cpu_id(&self) -> usize;
}
