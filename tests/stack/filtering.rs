use crate::common::{addr, lan_stack, packet, Sink};
use inetstack::dataplane::{FilterChain, Hook, Verdict};
use inetstack::{Inet, IpPacket, Ipv4, Protocol};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn recording_stage(
    id: usize,
    log: Arc<Mutex<Vec<usize>>>,
    drop: bool,
) -> impl Fn(IpPacket<Ipv4>, &dyn Inet<Ipv4>) -> Option<IpPacket<Ipv4>> + Send + 'static {
    move |p: IpPacket<Ipv4>, _: &dyn Inet<Ipv4>| {
        log.lock().unwrap().push(id);
        if drop {
            None
        } else {
            Some(p)
        }
    }
}

#[test]
fn test_chain_names() {
    let (mut stack, _) = lan_stack();
    assert_eq!(stack.prerouting_chain().name(), "prerouting");
    assert_eq!(stack.postrouting_chain().name(), "postrouting");
    assert_eq!(stack.forward_chain().name(), "forward");
    assert_eq!(stack.input_chain().name(), "input");
    assert_eq!(stack.output_chain().name(), "output");
    for hook in Hook::ALL {
        assert!(stack.chain(hook).is_empty());
    }
}

#[test]
fn test_empty_chain_is_noop() {
    let (stack, _) = lan_stack();
    let pkt = packet(Protocol::Udp, "10.0.0.9", "10.0.0.5").with_payload(b"abc".to_vec());
    let out = stack.chain(Hook::Input).run(pkt, &stack).unwrap();
    assert_eq!(out.payload(), b"abc");
    assert_eq!(out.dst(), addr("10.0.0.5"));
}

#[test]
fn test_stages_run_in_order_and_transform() {
    let (stack, _) = lan_stack();
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut chain = FilterChain::<Ipv4>::new("test", Vec::new());
    chain.append(recording_stage(1, log.clone(), false));
    chain.append(|mut p: IpPacket<Ipv4>, _: &dyn Inet<Ipv4>| {
        p.payload_mut().extend_from_slice(b"!");
        Some(p)
    });
    chain.append(recording_stage(3, log.clone(), false));

    let pkt = packet(Protocol::Udp, "10.0.0.9", "10.0.0.5").with_payload(b"hi".to_vec());
    match chain.evaluate(pkt, &stack) {
        Verdict::Accept(p) => assert_eq!(p.payload(), b"hi!"),
        Verdict::Drop { .. } => panic!("packet should pass"),
    }
    assert_eq!(*log.lock().unwrap(), vec![1, 3]);
}

#[test]
fn test_drop_skips_later_stages() {
    let (stack, _) = lan_stack();
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut chain = FilterChain::<Ipv4>::new("input", Vec::new());
    chain.append(recording_stage(1, log.clone(), false));
    chain.append(recording_stage(2, log.clone(), true));
    chain.append(recording_stage(3, log.clone(), false));

    let verdict = chain.evaluate(packet(Protocol::Udp, "10.0.0.9", "10.0.0.5"), &stack);
    assert!(matches!(
        verdict,
        Verdict::Drop {
            chain: "input",
            stage: 2
        }
    ));
    assert_eq!(*log.lock().unwrap(), vec![1, 2]);

    assert!(chain.remove(1));
    assert!(!chain.remove(5));
    let out = chain.run(packet(Protocol::Udp, "10.0.0.9", "10.0.0.5"), &stack);
    assert!(out.is_some());
    assert_eq!(*log.lock().unwrap(), vec![1, 2, 1, 3]);
}

#[test]
fn test_prerouting_blocks_address() {
    let (mut stack, _) = lan_stack();
    let sink = Sink::attach(&mut stack, Protocol::Udp);
    let blocked = addr("10.0.0.5");
    stack
        .prerouting_chain()
        .append(move |p: IpPacket<Ipv4>, _: &dyn Inet<Ipv4>| {
            if p.dst() == blocked {
                None
            } else {
                Some(p)
            }
        });

    let verdict = stack
        .chain(Hook::Prerouting)
        .evaluate(packet(Protocol::Udp, "10.0.0.9", "10.0.0.5"), &stack);
    match verdict {
        Verdict::Drop { chain, stage } => {
            assert_eq!(chain, "prerouting");
            assert_eq!(stage, 1);
        }
        Verdict::Accept(_) => panic!("blocked address passed prerouting"),
    }

    stack.receive(packet(Protocol::Udp, "10.0.0.9", "10.0.0.5"));
    assert_eq!(sink.received(), 0);
    assert_eq!(stack.stats().drops(Hook::Prerouting), 1);
}

#[test]
fn test_full_pipeline_order() {
    let (mut stack, handle) = lan_stack();
    let sink = Sink::attach(&mut stack, Protocol::Udp);
    let log = Arc::new(Mutex::new(Vec::new()));

    for (i, hook) in Hook::ALL.into_iter().enumerate() {
        stack.chain_mut(hook).append(recording_stage(i, log.clone(), false));
    }

    stack.receive(packet(Protocol::Udp, "10.0.0.9", "10.0.0.5"));
    assert_eq!(sink.received(), 1);
    // prerouting, input
    assert_eq!(*log.lock().unwrap(), vec![0, 3]);

    log.lock().unwrap().clear();
    stack.transmit(packet(Protocol::Udp, "0.0.0.0", "10.0.0.9"));
    // output, postrouting
    assert_eq!(*log.lock().unwrap(), vec![4, 1]);
    assert_eq!(handle.drain_unresolved().len(), 1);
}

#[test]
fn test_stage_can_inspect_stack() {
    let (mut stack, _) = lan_stack();
    let sink = Sink::attach(&mut stack, Protocol::Udp);
    let rejected = Arc::new(AtomicUsize::new(0));
    let counter = rejected.clone();

    // drop anything claiming to come from one of our own addresses
    stack
        .input_chain()
        .append(move |p: IpPacket<Ipv4>, s: &dyn Inet<Ipv4>| {
            if s.is_valid_source(p.src()) {
                counter.fetch_add(1, Ordering::SeqCst);
                None
            } else {
                Some(p)
            }
        });
    stack.add_vip(addr("10.0.0.77"));

    stack.receive(packet(Protocol::Udp, "10.0.0.77", "10.0.0.5"));
    stack.receive(packet(Protocol::Udp, "10.0.0.9", "10.0.0.5"));

    assert_eq!(rejected.load(Ordering::SeqCst), 1);
    assert_eq!(sink.received(), 1);
}
