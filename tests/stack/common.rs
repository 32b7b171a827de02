//! Shared fixtures

use inetstack::dataplane::Transport;
use inetstack::driver::{LoopbackHandle, LoopbackNic};
use inetstack::protocol::IcmpError;
use inetstack::{Inet, IpPacket, Ipv4, MacAddr, Protocol, Stack};
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

pub const LAN_MAC: MacAddr = MacAddr([0x02, 0, 0, 0, 1, 1]);
pub const GATEWAY_MAC: MacAddr = MacAddr([0x02, 0, 0, 0, 1, 254]);

pub fn addr(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

/// 10.0.0.5/24 via 10.0.0.1, DNS 10.0.0.53
pub fn lan_stack() -> (Stack<Ipv4>, LoopbackHandle<Ipv4>) {
    let nic = LoopbackNic::new("lan0", LAN_MAC, 1500, 32, 32);
    let handle = nic.handle();
    let mut stack = Stack::new(Box::new(nic));
    stack.network_config(
        addr("10.0.0.5"),
        addr("255.255.255.0"),
        addr("10.0.0.1"),
        addr("10.0.0.53"),
    );
    (stack, handle)
}

pub fn packet(proto: Protocol, src: &str, dst: &str) -> IpPacket<Ipv4> {
    IpPacket::new(proto).with_src(addr(src)).with_dst(addr(dst))
}

/// Transport that keeps every packet it is handed
#[derive(Clone, Default)]
pub struct Sink {
    pub packets: Arc<Mutex<Vec<IpPacket<Ipv4>>>>,
    pub errors: Arc<Mutex<Vec<IcmpError>>>,
}

impl Sink {
    pub fn attach(stack: &mut Stack<Ipv4>, proto: Protocol) -> Self {
        let sink = Sink::default();
        stack.set_transport(proto, Box::new(sink.clone()));
        sink
    }

    pub fn received(&self) -> usize {
        self.packets.lock().unwrap().len()
    }
}

impl Transport<Ipv4> for Sink {
    fn receive(&mut self, packet: IpPacket<Ipv4>) {
        self.packets.lock().unwrap().push(packet);
    }

    fn error_report(&mut self, err: IcmpError, _orig: IpPacket<Ipv4>) {
        self.errors.lock().unwrap().push(err);
    }
}
