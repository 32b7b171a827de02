//! Link-layer driver interface
//!
//! The stack never owns driver internals. It transmits through [`Nic`],
//! queries capacity through it, and allocates buffers from the driver's
//! [`BufferStore`].

mod loopback;

pub use loopback::{LoopbackHandle, LoopbackNic, PacketPool};

use crate::protocol::{AddressFamily, IpPacket, MacAddr, Packet};
use std::sync::Arc;

/// Buffer pool backing packet allocation
pub trait BufferStore: Send + Sync {
    /// Take a buffer, `None` if the pool is exhausted
    ///
    /// The returned packet holds on to the store and releases its slot
    /// when dropped.
    fn allocate(self: Arc<Self>) -> Option<Packet>;

    /// Return a buffer's slot to the pool; called from `Packet`'s drop
    fn release(&self, buf: Vec<u8>);

    /// Buffers currently free
    fn available(&self) -> usize;

    /// Pool capacity
    fn total(&self) -> usize;
}

/// Network interface the stack is bound to
pub trait Nic<F: AddressFamily>: Send {
    /// Interface name, e.g. "eth0"
    fn ifname(&self) -> &str;

    /// Link-layer address of this interface
    fn link_addr(&self) -> MacAddr;

    /// Link MTU
    fn mtu(&self) -> u16;

    /// Queue a packet for transmission to `dst_mac`
    fn transmit(&mut self, dst_mac: MacAddr, packet: IpPacket<F>);

    /// Link address of `next_hop` is unknown; the driver's resolver (ARP /
    /// neighbor discovery) owns the packet until resolution completes
    fn resolve(&mut self, next_hop: F::Addr, packet: IpPacket<F>);

    /// Free slots in the transmit queue
    fn transmit_queue_available(&self) -> usize;

    /// Buffer store used for packet allocation
    fn bufstore(&self) -> Arc<dyn BufferStore>;
}
