//! Packet buffers
//!
//! Packets are move-only: every hand-off transfers ownership, and a
//! stage that wants to drop a packet simply returns `None`. Neither type
//! implements `Clone`. A buffer taken from a [`BufferStore`] goes back to
//! it when the packet holding it is dropped, whichever layer drops it.

use super::{AddressFamily, Protocol};
use crate::driver::BufferStore;
use std::fmt;
use std::sync::Arc;

/// Default TTL / hop limit for locally originated packets
pub const DEFAULT_TTL: u8 = 64;

/// Anonymous buffer taken from the driver's buffer store
pub struct Packet {
    buf: Vec<u8>,
    store: Option<Arc<dyn BufferStore>>,
}

impl Packet {
    /// Wrap a raw buffer that belongs to no store
    pub fn new(buf: Vec<u8>) -> Self {
        Self { buf, store: None }
    }

    /// Empty buffer with room for `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(Vec::with_capacity(capacity))
    }

    /// Buffer owned by `store`; released to it on drop
    pub fn pooled(buf: Vec<u8>, store: Arc<dyn BufferStore>) -> Self {
        Self {
            buf,
            store: Some(store),
        }
    }

    /// Whether dropping this packet returns a buffer to a store
    pub fn is_pooled(&self) -> bool {
        self.store.is_some()
    }

    pub fn data(&self) -> &[u8] {
        &self.buf
    }

    pub fn data_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Detach the bytes; a pooled buffer slot is released immediately
    pub fn into_inner(mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}

impl Drop for Packet {
    fn drop(&mut self) {
        if let Some(store) = self.store.take() {
            store.release(std::mem::take(&mut self.buf));
        }
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("len", &self.buf.len())
            .field("pooled", &self.is_pooled())
            .finish()
    }
}

/// IP-layer packet for address family `F`
pub struct IpPacket<F: AddressFamily> {
    src: F::Addr,
    dst: F::Addr,
    protocol: Protocol,
    ttl: u8,
    payload: Packet,
}

impl<F: AddressFamily> IpPacket<F> {
    /// New packet with unspecified addresses and an empty payload
    pub fn new(protocol: Protocol) -> Self {
        Self::from_packet(Packet::new(Vec::new()), protocol)
    }

    /// Initialize an IP packet inside an anonymous buffer
    pub fn from_packet(packet: Packet, protocol: Protocol) -> Self {
        Self {
            src: F::ADDR_ANY,
            dst: F::ADDR_ANY,
            protocol,
            ttl: DEFAULT_TTL,
            payload: packet,
        }
    }

    /// Builder-style source address
    pub fn with_src(mut self, src: F::Addr) -> Self {
        self.src = src;
        self
    }

    /// Builder-style destination address
    pub fn with_dst(mut self, dst: F::Addr) -> Self {
        self.dst = dst;
        self
    }

    /// Builder-style payload; the buffer keeps its store
    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        *self.payload.data_mut() = payload.into();
        self
    }

    pub fn src(&self) -> F::Addr {
        self.src
    }

    pub fn dst(&self) -> F::Addr {
        self.dst
    }

    pub fn set_src(&mut self, src: F::Addr) {
        self.src = src;
    }

    pub fn set_dst(&mut self, dst: F::Addr) {
        self.dst = dst;
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn ttl(&self) -> u8 {
        self.ttl
    }

    pub fn set_ttl(&mut self, ttl: u8) {
        self.ttl = ttl;
    }

    /// Decrement TTL, returning false if the packet must not be forwarded
    pub fn decrement_ttl(&mut self) -> bool {
        if self.ttl <= 1 {
            return false;
        }
        self.ttl -= 1;
        true
    }

    pub fn payload(&self) -> &[u8] {
        self.payload.data()
    }

    pub fn payload_mut(&mut self) -> &mut Vec<u8> {
        self.payload.data_mut()
    }

    /// Whether the underlying buffer belongs to a store
    pub fn is_pooled(&self) -> bool {
        self.payload.is_pooled()
    }

    /// Hand the payload buffer back as an anonymous packet
    pub fn into_packet(self) -> Packet {
        self.payload
    }
}

impl<F: AddressFamily> fmt::Debug for IpPacket<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IpPacket")
            .field("family", &F::NAME)
            .field("src", &self.src)
            .field("dst", &self.dst)
            .field("protocol", &self.protocol)
            .field("ttl", &self.ttl)
            .field("len", &self.payload.len())
            .finish()
    }
}
