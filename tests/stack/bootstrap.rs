use crate::common::{addr, lan_stack, packet, Sink, LAN_MAC};
use inetstack::config;
use inetstack::dataplane::{DhcpClient, Lease, ResolveFn, Resolver, SessionId};
use inetstack::driver::LoopbackNic;
use inetstack::protocol::IcmpError;
use inetstack::{smp, Error, Inet, IpPacket, Ipv4, Ipv6, MacAddr, Protocol, Stack};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn bare_stack() -> Stack<Ipv4> {
    Stack::new(Box::new(LoopbackNic::new("wan0", LAN_MAC, 1500, 8, 8)))
}

/// Client that only reports which sessions were started
struct ChannelDhcp(mpsc::Sender<(SessionId, MacAddr)>);

impl DhcpClient<Ipv4> for ChannelDhcp {
    fn start(&mut self, session: SessionId, link_addr: MacAddr) {
        let _ = self.0.send((session, link_addr));
    }
}

/// Resolver that answers on the next `flush`
#[derive(Clone, Default)]
struct DeferredResolver {
    pending: Arc<Mutex<Vec<(String, ResolveFn<Ipv4>)>>>,
}

impl DeferredResolver {
    fn flush(&self, answer: Ipv4Addr) {
        let pending = std::mem::take(&mut *self.pending.lock().unwrap());
        for (_, done) in pending {
            done(Ok(answer));
        }
    }
}

impl Resolver<Ipv4> for DeferredResolver {
    fn resolve(
        &mut self,
        _server: Ipv4Addr,
        hostname: &str,
        _force: bool,
        on_done: ResolveFn<Ipv4>,
    ) {
        self.pending
            .lock()
            .unwrap()
            .push((hostname.to_string(), on_done));
    }
}

#[test]
fn test_static_config_file_boots_stack() {
    let cfg = config::parse(
        r#"
interface = "wan0"
address = "192.0.2.10/24"
gateway = "192.0.2.1"
dns = "192.0.2.53"
virtual_ips = ["192.0.2.11"]
"#,
    )
    .unwrap();

    let mut stack = bare_stack();
    let booted = Arc::new(Mutex::new(Vec::new()));
    let sink = booted.clone();
    stack.on_config(Box::new(move |s: &mut dyn Inet<Ipv4>| {
        sink.lock().unwrap().push(s.ip_addr());
    }));

    config::apply(&cfg, &mut stack).unwrap();

    assert_eq!(*booted.lock().unwrap(), vec![addr("192.0.2.10")]);
    assert!(stack.is_loopback(addr("192.0.2.11")));
    assert_eq!(stack.get_source_addr(addr("192.0.2.99")), addr("192.0.2.10"));
    assert_eq!(stack.get_source_addr(addr("192.0.2.11")), addr("192.0.2.11"));
    assert_eq!(stack.get_source_addr(addr("198.51.100.1")), addr("192.0.2.10"));
}

#[test]
fn test_dhcp_without_server_times_out() {
    let mut stack = bare_stack();
    let outcome = Arc::new(Mutex::new(None));
    let sink = outcome.clone();

    stack.negotiate_dhcp(
        Duration::from_secs_f64(0.01),
        Some(Box::new(move |timed_out: bool| {
            *sink.lock().unwrap() = Some(timed_out)
        })),
    );
    std::thread::sleep(Duration::from_millis(20));
    stack.poll(Instant::now());

    assert_eq!(*outcome.lock().unwrap(), Some(true));
    assert!(!stack.is_configured());
}

#[test]
fn test_dhcp_client_completes_session() {
    let mut stack = bare_stack();
    let (tx, rx) = mpsc::channel();
    stack.set_dhcp_client(Box::new(ChannelDhcp(tx)));

    let order = Arc::new(Mutex::new(Vec::new()));
    let on_config = order.clone();
    stack.on_config(Box::new(move |_: &mut dyn Inet<Ipv4>| {
        on_config.lock().unwrap().push("configured")
    }));
    let on_timeout = order.clone();
    stack.negotiate_dhcp(
        Duration::from_secs(5),
        Some(Box::new(move |timed_out: bool| {
            assert!(!timed_out);
            on_timeout.lock().unwrap().push("callback")
        })),
    );

    let (session, mac) = rx.try_recv().unwrap();
    assert_eq!(mac, LAN_MAC);

    let lease = Lease {
        ip_addr: addr("100.64.3.4"),
        netmask: addr("255.255.252.0"),
        gateway: addr("100.64.0.1"),
        dns: addr("100.64.0.1"),
        domain_name: None,
        lease_time: Duration::from_secs(600),
    };
    assert!(stack.complete_dhcp(session, lease.clone()));
    assert!(!stack.complete_dhcp(session, lease));

    assert!(stack.is_configured());
    assert_eq!(stack.gateway(), addr("100.64.0.1"));
    assert_eq!(*order.lock().unwrap(), vec!["configured", "callback"]);
}

#[test]
fn test_deferred_resolution() {
    let (mut stack, _) = lan_stack();
    let resolver = DeferredResolver::default();
    stack.set_resolver(Box::new(resolver.clone()));

    let results = Arc::new(Mutex::new(Vec::new()));
    for host in ["a.example", "b.example"] {
        let results = results.clone();
        stack.resolve(
            host,
            Box::new(move |r: inetstack::Result<Ipv4Addr>| {
                results.lock().unwrap().push(r.map_err(|e| e.to_string()))
            }),
            false,
        );
    }
    assert!(results.lock().unwrap().is_empty());

    resolver.flush(addr("203.0.113.80"));
    assert_eq!(
        *results.lock().unwrap(),
        vec![Ok(addr("203.0.113.80")), Ok(addr("203.0.113.80"))]
    );
}

#[test]
fn test_resolve_after_reset_reports_error() {
    let (mut stack, _) = lan_stack();
    stack.reset_config();

    let result = Arc::new(Mutex::new(None));
    let sink = result.clone();
    stack.resolve(
        "example.com",
        Box::new(move |r| *sink.lock().unwrap() = Some(r)),
        true,
    );
    assert!(matches!(
        result.lock().unwrap().take(),
        Some(Err(Error::NoDnsServer))
    ));
}

#[test]
fn test_icmp_errors_reach_transport() {
    let (mut stack, _) = lan_stack();
    let tcp = Sink::attach(&mut stack, Protocol::Tcp);
    let udp = Sink::attach(&mut stack, Protocol::Udp);

    stack.error_report(
        IcmpError::fragmentation_needed(1280),
        packet(Protocol::Tcp, "10.0.0.5", "198.51.100.7"),
    );

    assert_eq!(tcp.errors.lock().unwrap().len(), 1);
    assert!(udp.errors.lock().unwrap().is_empty());
}

#[test]
fn test_stack_migrates_between_threads() {
    let (mut stack, handle) = lan_stack();
    let origin = stack.get_cpu_id();
    stack.cache_link_addr(addr("10.0.0.9"), MacAddr([0x02, 0, 0, 0, 0, 9]));

    let worker = std::thread::spawn(move || {
        stack.move_to_this_cpu();
        assert_eq!(stack.get_cpu_id(), smp::current_cpu());
        stack.transmit(packet(Protocol::Udp, "0.0.0.0", "10.0.0.9"));
        stack.get_cpu_id()
    });
    let moved_to = worker.join().unwrap();

    assert_ne!(moved_to, origin);
    assert_eq!(handle.transmitted_len(), 1);
}

fn v6(s: &str) -> Ipv6Addr {
    s.parse().unwrap()
}

#[test]
fn test_ipv6_stack_configures_and_transmits() {
    let nic = LoopbackNic::<Ipv6>::new("v6lan0", LAN_MAC, 1500, 8, 8);
    let handle = nic.handle();
    let mut stack: Stack<Ipv6> = Stack::new(Box::new(nic));
    let peer_mac = MacAddr([0x02, 0, 0, 0, 6, 9]);

    stack.network_config(
        v6("2001:db8::5"),
        v6("ffff:ffff:ffff:ffff::"),
        v6("2001:db8::1"),
        v6("2001:db8::53"),
    );
    assert!(stack.is_configured());
    assert_eq!(stack.ip_addr(), v6("2001:db8::5"));
    assert_eq!(stack.broadcast_addr(), Ipv6Addr::UNSPECIFIED);

    stack.add_vip(v6("2001:db8:7::1"));
    assert!(stack.is_loopback(v6("2001:db8:7::1")));
    assert!(stack.is_loopback(Ipv6Addr::LOCALHOST));
    assert!(!stack.is_loopback(v6("2001:db8::9")));

    assert_eq!(stack.get_source_addr(v6("2001:db8::9")), v6("2001:db8::5"));
    assert_eq!(stack.get_source_addr(v6("2001:db8:7::20")), v6("2001:db8:7::1"));
    assert_eq!(stack.get_source_addr(Ipv6Addr::LOCALHOST), Ipv6Addr::LOCALHOST);

    stack.cache_link_addr(v6("2001:db8::9"), peer_mac);
    stack.transmit(IpPacket::new(Protocol::Udp).with_dst(v6("2001:db8::9")));
    stack.transmit(IpPacket::new(Protocol::Udp).with_dst(v6("2001:db8:ffff::1")));

    let sent = handle.drain_transmitted();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, peer_mac);
    assert_eq!(sent[0].1.src(), v6("2001:db8::5"));

    let pending = handle.drain_unresolved();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].0, v6("2001:db8::1"));

    stack.reset_config();
    assert!(!stack.is_configured());
    assert_eq!(stack.ip_addr(), Ipv6Addr::UNSPECIFIED);
    assert_eq!(stack.gateway(), Ipv6Addr::UNSPECIFIED);
    assert_eq!(stack.lookup_link_addr(v6("2001:db8::9")), None);
    assert!(stack.is_loopback(v6("2001:db8:7::1")));
}
