//! Routing and forwarding control
//!
//! The stack itself only answers "is this packet for us". Everything
//! else goes to the forward delegate, and reachability questions go to
//! the route checker. Both are pluggable; [`RoutingTable`] and
//! [`forwarder`] are the in-crate implementations.

use crate::dataplane::{Hook, Inet};
use crate::protocol::{AddressFamily, IpPacket};
use std::sync::Arc;
use tracing::{debug, trace};

/// Relays a packet that is not locally destined
///
/// A forwarder must pass the packet through the stack's forward chain
/// before handing it back for transmission.
pub type ForwardDelg<F> = Arc<dyn Fn(&mut dyn Inet<F>, IpPacket<F>) + Send + Sync>;

/// Answers "do we have a route to this address"
pub type RouteChecker<F> = Box<dyn Fn(<F as AddressFamily>::Addr) -> bool + Send>;

/// Route entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route<A> {
    /// Destination network
    pub destination: A,
    /// Network mask
    pub netmask: A,
    /// Next hop (None for directly connected)
    pub next_hop: Option<A>,
    /// Route metric
    pub metric: u32,
}

/// Routing table using longest prefix match
#[derive(Debug)]
pub struct RoutingTable<F: AddressFamily> {
    routes: Vec<Route<F::Addr>>,
}

impl<F: AddressFamily> RoutingTable<F> {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Add a route, replacing one with the same destination and mask
    pub fn add(&mut self, route: Route<F::Addr>) {
        self.routes
            .retain(|r| r.destination != route.destination || r.netmask != route.netmask);

        self.routes.push(route);

        // Contiguous masks order like their prefix length; longest first,
        // then lowest metric.
        self.routes
            .sort_by(|a, b| b.netmask.cmp(&a.netmask).then(a.metric.cmp(&b.metric)));
    }

    pub fn remove(&mut self, destination: F::Addr, netmask: F::Addr) {
        self.routes
            .retain(|r| r.destination != destination || r.netmask != netmask);
    }

    /// Longest prefix match
    pub fn lookup(&self, addr: F::Addr) -> Option<&Route<F::Addr>> {
        self.routes
            .iter()
            .find(|r| F::same_subnet(addr, r.destination, r.netmask))
    }

    pub fn routes(&self) -> &[Route<F::Addr>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Freeze the table into a route checker
    pub fn into_route_checker(self) -> RouteChecker<F> {
        Box::new(move |addr| self.lookup(addr).is_some())
    }
}

impl<F: AddressFamily> Default for RoutingTable<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// Reference forwarder: decrement TTL, check reachability, run the forward
/// chain, then send the packet back out through the same stack.
pub fn forwarder<F: AddressFamily>() -> ForwardDelg<F> {
    Arc::new(|stack: &mut dyn Inet<F>, mut pckt: IpPacket<F>| {
        if !pckt.decrement_ttl() {
            debug!("TTL expired forwarding {:?}", pckt);
            return;
        }
        if !stack.has_route(pckt.dst()) {
            debug!("No route to {}, dropping", pckt.dst());
            return;
        }

        let pckt = {
            let view: &dyn Inet<F> = &*stack;
            view.chain(Hook::Forward).run(pckt, view)
        };
        if let Some(pckt) = pckt {
            trace!("Forwarding {:?}", pckt);
            stack.ship(pckt);
        }
    })
}
