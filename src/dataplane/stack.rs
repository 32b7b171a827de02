//! Concrete IP stack
//!
//! One [`Stack`] is bound to one driver and owns its configuration, link
//! cache and filter chains outright. It is written against
//! [`AddressFamily`] and instantiated per IP version.
//!
//! Inbound: prerouting, then local packets go through input to their
//! transport and everything else goes to the forward delegate.
//! Outbound: output, postrouting, link resolution, driver.

use crate::dataplane::dhcp::DhcpSession;
use crate::dataplane::{
    dns, DhcpClient, DhcpTimeoutFn, FilterChain, FilterChains, ForwardDelg, Hook, IfConfig, Inet,
    IpPacketFactory, Lease, LinkCache, OnConfigured, ResolveFn, Resolver, RouteChecker, SessionId,
    Transport, TransmitAvailFn, VipList,
};
use crate::driver::Nic;
use crate::protocol::{AddressFamily, IcmpError, IpPacket, MacAddr, Packet, Protocol};
use crate::smp;
use crate::telemetry::StackStats;
use crate::Error;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// IP stack bound to one network interface
pub struct Stack<F: AddressFamily> {
    nic: Box<dyn Nic<F>>,
    config: IfConfig<F>,
    link_cache: LinkCache<F::Addr>,
    chains: FilterChains<F>,
    transports: HashMap<Protocol, Box<dyn Transport<F>>>,
    config_handlers: Vec<OnConfigured<F>>,
    transmit_handlers: Vec<TransmitAvailFn>,
    dhcp_client: Option<Box<dyn DhcpClient<F>>>,
    dhcp_session: Option<DhcpSession>,
    next_session: u64,
    resolver: Option<Box<dyn Resolver<F>>>,
    forward_delg: Option<ForwardDelg<F>>,
    route_checker: Option<RouteChecker<F>>,
    stats: Arc<StackStats>,
    cpu: usize,
}

impl<F: AddressFamily> Stack<F> {
    /// Create an unconfigured stack on top of `nic`, owned by the calling
    /// execution context
    pub fn new(nic: Box<dyn Nic<F>>) -> Self {
        info!(
            "{}: {} stack on {} (mtu {})",
            nic.ifname(),
            F::NAME,
            nic.link_addr(),
            nic.mtu()
        );
        Self {
            nic,
            config: IfConfig::new(),
            link_cache: LinkCache::default(),
            chains: FilterChains::new(),
            transports: HashMap::new(),
            config_handlers: Vec::new(),
            transmit_handlers: Vec::new(),
            dhcp_client: None,
            dhcp_session: None,
            next_session: 1,
            resolver: None,
            forward_delg: None,
            route_checker: None,
            stats: Arc::new(StackStats::new()),
            cpu: smp::current_cpu(),
        }
    }

    /// Attach the external DHCP client
    pub fn set_dhcp_client(&mut self, client: Box<dyn DhcpClient<F>>) {
        self.dhcp_client = Some(client);
    }

    /// Attach the external DNS resolver
    pub fn set_resolver(&mut self, resolver: Box<dyn Resolver<F>>) {
        self.resolver = Some(resolver);
    }

    /// Shared statistics handle
    pub fn stats(&self) -> &Arc<StackStats> {
        &self.stats
    }

    /// Id of the DHCP negotiation in progress
    pub fn dhcp_session(&self) -> Option<SessionId> {
        self.dhcp_session.as_ref().map(|s| s.id)
    }

    /// A DHCP client obtained `lease` for `session`.
    ///
    /// Returns false when the session is no longer current (superseded,
    /// reset or already timed out); the lease is then ignored.
    pub fn complete_dhcp(&mut self, session: SessionId, lease: Lease<F::Addr>) -> bool {
        self.check_affinity();
        let current = match self.dhcp_session.take() {
            Some(s) if s.id == session => s,
            other => {
                self.dhcp_session = other;
                warn!(
                    "{}: ignoring lease {} from stale {}",
                    self.ifname(),
                    lease.ip_addr,
                    session
                );
                return false;
            }
        };

        if current.is_expired(Instant::now()) {
            warn!("{}: {} completed after its deadline", self.ifname(), session);
            self.finish_dhcp_timeout(current);
            return false;
        }

        info!(
            "{}: {} bound {} (lease {}s)",
            self.ifname(),
            session,
            lease.ip_addr,
            lease.lease_time.as_secs()
        );
        if let Some(domain) = lease.domain_name {
            self.config.set_domain_name(domain);
        }
        self.network_config(lease.ip_addr, lease.netmask, lease.gateway, lease.dns);
        current.finish(false);
        true
    }

    /// The driver freed transmit-queue slots
    pub fn transmit_queue_freed(&mut self) {
        let free = self.nic.transmit_queue_available();
        trace!("{}: transmit queue has {} free slots", self.ifname(), free);
        for handler in self.transmit_handlers.iter_mut() {
            handler(free);
        }
    }

    fn check_affinity(&self) {
        debug_assert_eq!(
            self.cpu,
            smp::current_cpu(),
            "stack used outside its owning execution context"
        );
    }

    fn run_chain(&self, hook: Hook, pckt: IpPacket<F>) -> Option<IpPacket<F>> {
        let chain = self.chains.get(hook);
        if chain.is_empty() {
            return Some(pckt);
        }
        let out = chain.run(pckt, self);
        if out.is_none() {
            self.stats.record_drop(hook);
        }
        out
    }

    fn fire_config_handlers(&mut self) {
        let mut handlers = std::mem::take(&mut self.config_handlers);
        for handler in handlers.iter_mut() {
            handler(self);
        }
        // keep handlers registered while the others ran, after the originals
        handlers.append(&mut self.config_handlers);
        self.config_handlers = handlers;
    }

    fn finish_dhcp_timeout(&mut self, session: DhcpSession) {
        warn!(
            "{}: DHCP {} timed out, configured={}",
            self.ifname(),
            session.id,
            self.config.is_configured()
        );
        if let Some(client) = self.dhcp_client.as_mut() {
            client.stop(session.id);
        }
        session.finish(true);
    }

    fn deliver_local(&mut self, pckt: IpPacket<F>) {
        let Some(pckt) = self.run_chain(Hook::Input, pckt) else {
            return;
        };
        let protocol = pckt.protocol();
        match self.transports.get_mut(&protocol) {
            Some(transport) => transport.receive(pckt),
            None => {
                debug!("{}: no handler for {:?}, dropping", self.ifname(), protocol);
                self.stats.no_transport.inc();
            }
        }
    }

    fn next_hop(&self, dst: F::Addr) -> F::Addr {
        let gateway = self.config.gateway();
        if self.config.is_on_link(dst) || gateway == F::ADDR_ANY {
            dst
        } else {
            gateway
        }
    }
}

impl<F: AddressFamily> Inet<F> for Stack<F> {
    fn ip_addr(&self) -> F::Addr {
        self.config.ip()
    }

    fn netmask(&self) -> F::Addr {
        self.config.netmask()
    }

    fn gateway(&self) -> F::Addr {
        self.config.gateway()
    }

    fn dns_addr(&self) -> F::Addr {
        self.config.dns()
    }

    fn broadcast_addr(&self) -> F::Addr {
        self.config.broadcast()
    }

    fn set_gateway(&mut self, gateway: F::Addr) {
        self.check_affinity();
        self.config.set_gateway(gateway);
    }

    fn set_dns_server(&mut self, server: F::Addr) {
        self.check_affinity();
        self.config.set_dns(server);
    }

    fn network_config(&mut self, ip: F::Addr, netmask: F::Addr, gateway: F::Addr, dns: F::Addr) {
        self.check_affinity();
        self.config.configure(ip, netmask, gateway, dns);
        self.link_cache.flush();
        info!(
            "{}: configured ip={} netmask={} gateway={} dns={}",
            self.ifname(),
            ip,
            netmask,
            gateway,
            dns
        );
        self.fire_config_handlers();
    }

    fn reset_config(&mut self) {
        self.check_affinity();
        if let Some(session) = self.dhcp_session.take() {
            debug!("{}: reset abandons DHCP {}", self.ifname(), session.id);
            if let Some(client) = self.dhcp_client.as_mut() {
                client.stop(session.id);
            }
        }
        self.config.reset();
        self.link_cache.flush();
        info!("{}: configuration reset", self.ifname());
    }

    fn negotiate_dhcp(&mut self, timeout: Duration, on_timeout: Option<DhcpTimeoutFn>) {
        self.check_affinity();
        let id = SessionId(self.next_session);
        self.next_session += 1;

        if let Some(old) = self.dhcp_session.take() {
            debug!("{}: {} supersedes {}", self.ifname(), id, old.id);
            if let Some(client) = self.dhcp_client.as_mut() {
                client.stop(old.id);
            }
        }

        info!(
            "{}: negotiating DHCP ({}, timeout {:?})",
            self.ifname(),
            id,
            timeout
        );
        self.dhcp_session = Some(DhcpSession::new(id, timeout, on_timeout));

        let link_addr = self.nic.link_addr();
        match self.dhcp_client.as_mut() {
            Some(client) => client.start(id, link_addr),
            None => warn!("{}: {}", self.ifname(), Error::NoDhcpClient),
        }
    }

    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    fn on_config(&mut self, handler: OnConfigured<F>) {
        self.config_handlers.push(handler);
    }

    fn virtual_ips(&self) -> &VipList<F> {
        self.config.vips()
    }

    fn is_loopback(&self, addr: F::Addr) -> bool {
        self.config.is_loopback(addr)
    }

    fn add_vip(&mut self, addr: F::Addr) {
        self.check_affinity();
        if self.config.add_vip(addr) {
            debug!("{}: added virtual IP {}", self.ifname(), addr);
        }
    }

    fn remove_vip(&mut self, addr: F::Addr) {
        self.check_affinity();
        if self.config.remove_vip(&addr) {
            debug!("{}: removed virtual IP {}", self.ifname(), addr);
        }
    }

    fn get_source_addr(&self, dest: F::Addr) -> F::Addr {
        self.config.source_for(dest)
    }

    fn is_valid_source(&self, addr: F::Addr) -> bool {
        self.config.is_valid_source(addr)
    }

    fn chain(&self, hook: Hook) -> &FilterChain<F> {
        self.chains.get(hook)
    }

    fn chain_mut(&mut self, hook: Hook) -> &mut FilterChain<F> {
        self.chains.get_mut(hook)
    }

    fn set_transport(&mut self, protocol: Protocol, transport: Box<dyn Transport<F>>) {
        self.transports.insert(protocol, transport);
    }

    fn transport(&mut self, protocol: Protocol) -> Option<&mut dyn Transport<F>> {
        match self.transports.get_mut(&protocol) {
            Some(transport) => Some(&mut **transport),
            None => None,
        }
    }

    fn error_report(&mut self, err: IcmpError, orig: IpPacket<F>) {
        let protocol = orig.protocol();
        match self.transports.get_mut(&protocol) {
            Some(transport) => {
                debug!("ICMP error {} for {:?} packet to {}", err, protocol, orig.dst());
                self.stats.icmp_reports.inc();
                transport.error_report(err, orig);
            }
            None => {
                debug!("ICMP error {} for unhandled protocol {:?}", err, protocol);
                self.stats.icmp_unclaimed.inc();
            }
        }
    }

    fn resolve(&mut self, hostname: &str, func: ResolveFn<F>, force: bool) {
        let server = self.config.dns();
        if server == F::ADDR_ANY {
            debug!("{}: cannot resolve {}: no DNS server", self.ifname(), hostname);
            func(Err(Error::NoDnsServer));
            return;
        }
        self.resolve_with(hostname, server, func, force);
    }

    fn resolve_with(&mut self, hostname: &str, server: F::Addr, func: ResolveFn<F>, force: bool) {
        self.check_affinity();
        if let Err(e) = dns::validate_hostname(hostname) {
            func(Err(e));
            return;
        }
        match self.resolver.as_mut() {
            Some(resolver) => {
                trace!("resolving {} via {} (force={})", hostname, server, force);
                resolver.resolve(server, hostname, force, func);
            }
            None => func(Err(Error::NoResolver)),
        }
    }

    fn set_domain_name(&mut self, domain_name: String) {
        self.config.set_domain_name(domain_name);
    }

    fn domain_name(&self) -> &str {
        self.config.domain_name()
    }

    fn nic(&self) -> &dyn Nic<F> {
        &*self.nic
    }

    fn ifname(&self) -> &str {
        self.nic.ifname()
    }

    fn link_addr(&self) -> MacAddr {
        self.nic.link_addr()
    }

    fn cache_link_addr(&mut self, addr: F::Addr, link_addr: MacAddr) {
        self.check_affinity();
        trace!("{}: caching {} -> {}", self.ifname(), addr, link_addr);
        self.link_cache.insert(addr, link_addr, Instant::now());
    }

    fn lookup_link_addr(&self, addr: F::Addr) -> Option<MacAddr> {
        self.link_cache.lookup(&addr, Instant::now())
    }

    fn flush_link_cache(&mut self) {
        self.check_affinity();
        debug!(
            "{}: flushing {} link cache entries",
            self.ifname(),
            self.link_cache.len()
        );
        self.link_cache.flush();
    }

    fn set_link_cache_flush_interval(&mut self, interval: Duration) {
        self.check_affinity();
        self.link_cache.set_flush_interval(interval, Instant::now());
    }

    fn set_forward_delg(&mut self, delg: Option<ForwardDelg<F>>) {
        self.forward_delg = delg;
    }

    fn set_route_checker(&mut self, checker: Option<RouteChecker<F>>) {
        self.route_checker = checker;
    }

    fn forward_delg(&self) -> Option<ForwardDelg<F>> {
        self.forward_delg.clone()
    }

    fn has_route(&self, addr: F::Addr) -> bool {
        self.route_checker.as_ref().map_or(true, |check| check(addr))
    }

    fn receive(&mut self, pckt: IpPacket<F>) {
        self.check_affinity();
        self.stats.rx_packets.inc();

        let Some(pckt) = self.run_chain(Hook::Prerouting, pckt) else {
            return;
        };

        if self.config.is_local_destination(pckt.dst()) {
            self.deliver_local(pckt);
            return;
        }

        match self.forward_delg.clone() {
            Some(forward) => {
                self.stats.forwarded.inc();
                forward(self, pckt);
            }
            None => {
                trace!("{}: not for us and no forwarder: {:?}", self.ifname(), pckt);
                self.stats.no_forwarder.inc();
            }
        }
    }

    fn transmit(&mut self, mut pckt: IpPacket<F>) {
        self.check_affinity();
        if pckt.src() == F::ADDR_ANY {
            pckt.set_src(self.get_source_addr(pckt.dst()));
        }
        let Some(pckt) = self.run_chain(Hook::Output, pckt) else {
            return;
        };
        self.ship(pckt);
    }

    fn ship(&mut self, pckt: IpPacket<F>) {
        self.check_affinity();
        let Some(pckt) = self.run_chain(Hook::Postrouting, pckt) else {
            return;
        };
        let dst = pckt.dst();

        if self.config.is_loopback(dst) {
            trace!("{}: looping back {:?}", self.ifname(), pckt);
            self.deliver_local(pckt);
            return;
        }

        if F::is_broadcast(dst, self.config.ip(), self.config.netmask()) {
            self.stats.tx_packets.inc();
            self.nic.transmit(MacAddr::BROADCAST, pckt);
            return;
        }

        if !self.has_route(dst) {
            debug!("{}: no route to {}", self.ifname(), dst);
            self.stats.no_route.inc();
            return;
        }

        let next_hop = self.next_hop(dst);
        match self.link_cache.lookup(&next_hop, Instant::now()) {
            Some(mac) => {
                self.stats.link_cache_hits.inc();
                self.stats.tx_packets.inc();
                self.nic.transmit(mac, pckt);
            }
            None => {
                self.stats.link_cache_misses.inc();
                self.nic.resolve(next_hop, pckt);
            }
        }
    }

    fn poll(&mut self, now: Instant) {
        self.check_affinity();
        if self
            .dhcp_session
            .as_ref()
            .is_some_and(|s| s.is_expired(now))
        {
            if let Some(session) = self.dhcp_session.take() {
                self.finish_dhcp_timeout(session);
            }
        }

        let purged = self.link_cache.poll(now);
        if purged > 0 {
            debug!("{}: expired {} link cache entries", self.ifname(), purged);
        }
    }

    fn mtu(&self) -> u16 {
        self.nic.mtu()
    }

    fn create_packet(&self) -> Option<Packet> {
        self.nic.bufstore().allocate()
    }

    fn ip_packet_factory(&self) -> IpPacketFactory<F> {
        let store = self.nic.bufstore();
        let src = self.config.ip();
        Box::new(move |protocol| {
            store
                .clone()
                .allocate()
                .map(|buf| IpPacket::from_packet(buf, protocol).with_src(src))
        })
    }

    fn create_ip_packet(&self, protocol: Protocol) -> Option<IpPacket<F>> {
        self.create_packet()
            .map(|buf| IpPacket::from_packet(buf, protocol).with_src(self.config.ip()))
    }

    fn on_transmit_queue_available(&mut self, func: TransmitAvailFn) {
        self.transmit_handlers.push(func);
    }

    fn transmit_queue_available(&self) -> usize {
        self.nic.transmit_queue_available()
    }

    fn buffers_available(&self) -> usize {
        self.nic.bufstore().available()
    }

    fn buffers_total(&self) -> usize {
        self.nic.bufstore().total()
    }

    fn force_start_send_queues(&mut self) {
        self.check_affinity();
        let free = self.nic.transmit_queue_available();
        info!("{}: restarting send queues ({} free)", self.ifname(), free);
        for transport in self.transports.values_mut() {
            transport.resume_send(free);
        }
        self.transmit_queue_freed();
    }

    fn move_to_this_cpu(&mut self) {
        let cpu = smp::current_cpu();
        if cpu != self.cpu {
            info!("{}: moving from cpu {} to cpu {}", self.ifname(), self.cpu, cpu);
        }
        self.cpu = cpu;
    }

    fn get_cpu_id(&self) -> usize {
        self.cpu
    }
}
