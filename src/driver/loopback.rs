//! In-memory driver
//!
//! Records transmitted and unresolved packets instead of putting them on a
//! wire. Used by the CLI and by tests to observe what the stack emits.

use super::{BufferStore, Nic};
use crate::protocol::{AddressFamily, IpPacket, MacAddr, Packet};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{trace, warn};

/// Fixed-size buffer pool
#[derive(Debug)]
pub struct PacketPool {
    buffer_size: usize,
    total: usize,
    in_use: AtomicUsize,
}

impl PacketPool {
    pub fn new(total: usize, buffer_size: usize) -> Self {
        Self {
            buffer_size,
            total,
            in_use: AtomicUsize::new(0),
        }
    }
}

impl BufferStore for PacketPool {
    fn allocate(self: Arc<Self>) -> Option<Packet> {
        let mut used = self.in_use.load(Ordering::Relaxed);
        loop {
            if used >= self.total {
                return None;
            }
            match self.in_use.compare_exchange_weak(
                used,
                used + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    let buf = Vec::with_capacity(self.buffer_size);
                    return Some(Packet::pooled(buf, self));
                }
                Err(actual) => used = actual,
            }
        }
    }

    fn release(&self, _buf: Vec<u8>) {
        let _ = self
            .in_use
            .fetch_update(Ordering::AcqRel, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    fn available(&self) -> usize {
        self.total - self.in_use.load(Ordering::Relaxed).min(self.total)
    }

    fn total(&self) -> usize {
        self.total
    }
}

struct Queues<F: AddressFamily> {
    transmitted: VecDeque<(MacAddr, IpPacket<F>)>,
    unresolved: Vec<(F::Addr, IpPacket<F>)>,
}

/// Observer side of a [`LoopbackNic`]
pub struct LoopbackHandle<F: AddressFamily> {
    queues: Arc<Mutex<Queues<F>>>,
    queue_len: usize,
}

impl<F: AddressFamily> Clone for LoopbackHandle<F> {
    fn clone(&self) -> Self {
        Self {
            queues: Arc::clone(&self.queues),
            queue_len: self.queue_len,
        }
    }
}

impl<F: AddressFamily> LoopbackHandle<F> {
    fn lock(&self) -> MutexGuard<'_, Queues<F>> {
        // A poisoned queue still holds valid packets.
        self.queues.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Take every packet the stack handed to the driver for transmission
    pub fn drain_transmitted(&self) -> Vec<(MacAddr, IpPacket<F>)> {
        self.lock().transmitted.drain(..).collect()
    }

    /// Take every packet waiting on link-address resolution
    pub fn drain_unresolved(&self) -> Vec<(F::Addr, IpPacket<F>)> {
        std::mem::take(&mut self.lock().unresolved)
    }

    /// Packets currently sitting in the transmit queue
    pub fn transmitted_len(&self) -> usize {
        self.lock().transmitted.len()
    }

    /// Transmit queue capacity
    pub fn queue_len(&self) -> usize {
        self.queue_len
    }
}

/// In-memory NIC
pub struct LoopbackNic<F: AddressFamily> {
    ifname: String,
    mac: MacAddr,
    mtu: u16,
    handle: LoopbackHandle<F>,
    pool: Arc<PacketPool>,
}

impl<F: AddressFamily> LoopbackNic<F> {
    /// Create a driver with a transmit queue of `queue_len` packets and a
    /// pool of `buffers` MTU-sized buffers
    pub fn new(ifname: &str, mac: MacAddr, mtu: u16, queue_len: usize, buffers: usize) -> Self {
        let handle = LoopbackHandle {
            queues: Arc::new(Mutex::new(Queues {
                transmitted: VecDeque::new(),
                unresolved: Vec::new(),
            })),
            queue_len,
        };
        Self {
            ifname: ifname.to_string(),
            mac,
            mtu,
            handle,
            pool: Arc::new(PacketPool::new(buffers, mtu as usize)),
        }
    }

    /// Observer handle sharing this driver's queues
    pub fn handle(&self) -> LoopbackHandle<F> {
        self.handle.clone()
    }
}

impl<F: AddressFamily> Nic<F> for LoopbackNic<F> {
    fn ifname(&self) -> &str {
        &self.ifname
    }

    fn link_addr(&self) -> MacAddr {
        self.mac
    }

    fn mtu(&self) -> u16 {
        self.mtu
    }

    fn transmit(&mut self, dst_mac: MacAddr, packet: IpPacket<F>) {
        let mut queues = self.handle.lock();
        if queues.transmitted.len() >= self.handle.queue_len {
            warn!("{}: transmit queue full, dropping {:?}", self.ifname, packet);
            return;
        }
        trace!("{}: tx {:?} -> {}", self.ifname, packet, dst_mac);
        queues.transmitted.push_back((dst_mac, packet));
    }

    fn resolve(&mut self, next_hop: F::Addr, packet: IpPacket<F>) {
        trace!("{}: resolving {} for {:?}", self.ifname, next_hop, packet);
        self.handle.lock().unresolved.push((next_hop, packet));
    }

    fn transmit_queue_available(&self) -> usize {
        self.handle
            .queue_len
            .saturating_sub(self.handle.transmitted_len())
    }

    fn bufstore(&self) -> Arc<dyn BufferStore> {
        self.pool.clone()
    }
}
