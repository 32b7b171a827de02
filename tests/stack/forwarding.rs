use crate::common::{addr, lan_stack, packet, GATEWAY_MAC};
use inetstack::dataplane::{forwarder, Hook, Route, RoutingTable};
use inetstack::{Inet, IpPacket, Ipv4, Protocol};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn counting_stage(
    counter: Arc<AtomicUsize>,
) -> impl Fn(IpPacket<Ipv4>, &dyn Inet<Ipv4>) -> Option<IpPacket<Ipv4>> + Send + 'static {
    move |p: IpPacket<Ipv4>, _: &dyn Inet<Ipv4>| {
        counter.fetch_add(1, Ordering::SeqCst);
        Some(p)
    }
}

#[test]
fn test_reference_forwarder_runs_forward_chain() {
    let (mut stack, handle) = lan_stack();
    let seen = Arc::new(AtomicUsize::new(0));
    stack.forward_chain().append(counting_stage(seen.clone()));
    stack.set_forward_delg(Some(forwarder()));
    stack.cache_link_addr(addr("10.0.0.1"), GATEWAY_MAC);

    stack.receive(packet(Protocol::Udp, "10.0.0.9", "198.51.100.7"));

    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert_eq!(stack.stats().forwarded.get(), 1);

    let sent = handle.drain_transmitted();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, GATEWAY_MAC);
    assert_eq!(sent[0].1.dst(), addr("198.51.100.7"));
    assert_eq!(sent[0].1.ttl(), 63);
}

#[test]
fn test_forward_chain_drop_stops_forwarding() {
    let (mut stack, handle) = lan_stack();
    let blocked = addr("198.51.100.7");
    stack
        .forward_chain()
        .append(move |p: IpPacket<Ipv4>, _: &dyn Inet<Ipv4>| {
            if p.dst() == blocked {
                None
            } else {
                Some(p)
            }
        });
    stack.set_forward_delg(Some(forwarder()));

    stack.receive(packet(Protocol::Udp, "10.0.0.9", "198.51.100.7"));
    stack.receive(packet(Protocol::Udp, "10.0.0.9", "198.51.100.8"));

    assert!(handle.drain_transmitted().is_empty());
    let unresolved = handle.drain_unresolved();
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].1.dst(), addr("198.51.100.8"));
}

#[test]
fn test_forwarder_drops_expired_ttl() {
    let (mut stack, handle) = lan_stack();
    let seen = Arc::new(AtomicUsize::new(0));
    stack.forward_chain().append(counting_stage(seen.clone()));
    stack.set_forward_delg(Some(forwarder()));

    let mut pkt = packet(Protocol::Udp, "10.0.0.9", "198.51.100.7");
    pkt.set_ttl(1);
    stack.receive(pkt);

    assert_eq!(seen.load(Ordering::SeqCst), 0);
    assert!(handle.drain_unresolved().is_empty());
}

#[test]
fn test_dropped_forwards_return_buffers() {
    let (mut stack, handle) = lan_stack();
    stack.set_forward_delg(Some(forwarder()));
    stack.cache_link_addr(addr("10.0.0.1"), GATEWAY_MAC);
    let total = stack.buffers_total();

    let mut expired = stack
        .create_ip_packet(Protocol::Udp)
        .unwrap()
        .with_dst(addr("198.51.100.7"));
    expired.set_ttl(1);
    stack.receive(expired);
    assert_eq!(stack.buffers_available(), total);

    let live = stack
        .create_ip_packet(Protocol::Udp)
        .unwrap()
        .with_dst(addr("198.51.100.7"));
    stack.receive(live);
    assert_eq!(stack.buffers_available(), total - 1);

    assert_eq!(handle.drain_transmitted().len(), 1);
    assert_eq!(stack.buffers_available(), total);
}

#[test]
fn test_forwarder_honours_route_checker() {
    let (mut stack, handle) = lan_stack();
    let mut table = RoutingTable::<Ipv4>::new();
    table.add(Route {
        destination: addr("10.0.0.0"),
        netmask: addr("255.255.255.0"),
        next_hop: None,
        metric: 0,
    });
    table.add(Route {
        destination: addr("172.16.0.0"),
        netmask: addr("255.240.0.0"),
        next_hop: Some(addr("10.0.0.1")),
        metric: 10,
    });
    stack.set_route_checker(Some(table.into_route_checker()));
    stack.set_forward_delg(Some(forwarder()));

    stack.receive(packet(Protocol::Tcp, "10.0.0.9", "172.20.1.1"));
    stack.receive(packet(Protocol::Tcp, "10.0.0.9", "8.8.8.8"));

    let unresolved = handle.drain_unresolved();
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].0, addr("10.0.0.1"));
    assert_eq!(stack.stats().drops(Hook::Forward), 0);
}

#[test]
fn test_custom_forwarder_sees_stack() {
    let (mut stack, _) = lan_stack();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    stack.set_forward_delg(Some(Arc::new(
        move |s: &mut dyn Inet<Ipv4>, p: IpPacket<Ipv4>| {
            assert!(!s.is_loopback(p.dst()));
            counter.fetch_add(1, Ordering::SeqCst);
        },
    )));
    assert!(stack.forward_delg().is_some());

    stack.receive(packet(Protocol::Udp, "10.0.0.9", "192.0.2.1"));
    stack.receive(packet(Protocol::Udp, "10.0.0.9", "10.0.0.5"));
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    stack.set_forward_delg(None);
    stack.receive(packet(Protocol::Udp, "10.0.0.9", "192.0.2.1"));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(stack.stats().no_forwarder.get(), 1);
}
