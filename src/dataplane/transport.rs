//! Transport protocol seam
//!
//! TCP, UDP and ICMP engines are external. The stack holds them, hands
//! them packets that survived the input chain, and routes ICMP error
//! reports to the protocol that sent the offending packet.

use crate::protocol::{AddressFamily, IcmpError, IpPacket};

pub trait Transport<F: AddressFamily>: Send {
    /// Inbound packet addressed to this host
    fn receive(&mut self, packet: IpPacket<F>);

    /// An ICMP error was received for `orig`, a packet this protocol sent
    fn error_report(&mut self, err: IcmpError, orig: IpPacket<F>);

    /// Transmit capacity is available again; `free` is the queue room
    fn resume_send(&mut self, _free: usize) {}
}
