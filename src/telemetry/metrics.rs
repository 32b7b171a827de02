//! Counters for stack activity.
//!
//! Counters are atomic so a snapshot can be exported from another thread
//! while the owning context keeps processing packets.

use crate::dataplane::Hook;
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counter for thread-safe increment operations.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Creates a new counter initialized to zero.
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Increments the counter by 1.
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds a value to the counter.
    pub fn add(&self, val: u64) {
        self.0.fetch_add(val, Ordering::Relaxed);
    }

    /// Gets the current value of the counter.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-stack statistics.
#[derive(Debug, Default)]
pub struct StackStats {
    /// Packets handed to the stack by the driver.
    pub rx_packets: Counter,
    /// Packets handed to the driver.
    pub tx_packets: Counter,
    /// Drops per filter hook, indexed like [`Hook::ALL`].
    chain_drops: [Counter; 5],
    /// Packets given to the forward delegate.
    pub forwarded: Counter,
    /// Non-local packets dropped because no forwarder is installed.
    pub no_forwarder: Counter,
    /// Outbound packets dropped by the route checker.
    pub no_route: Counter,
    /// Local packets with no matching transport.
    pub no_transport: Counter,
    /// Link cache hits on egress.
    pub link_cache_hits: Counter,
    /// Link cache misses handed to the driver's resolver.
    pub link_cache_misses: Counter,
    /// ICMP errors delivered to a transport.
    pub icmp_reports: Counter,
    /// ICMP errors for a protocol with no transport.
    pub icmp_unclaimed: Counter,
}

impl StackStats {
    /// Creates new statistics initialized to zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a drop in `hook`.
    pub fn record_drop(&self, hook: Hook) {
        self.chain_drops[hook as usize].inc();
    }

    /// Drops recorded for `hook`.
    pub fn drops(&self, hook: Hook) -> u64 {
        self.chain_drops[hook as usize].get()
    }

    /// Exports all counters as key-value pairs.
    pub fn export(&self) -> Vec<(String, u64)> {
        let mut result = vec![
            ("rx_packets".to_string(), self.rx_packets.get()),
            ("tx_packets".to_string(), self.tx_packets.get()),
            ("forwarded".to_string(), self.forwarded.get()),
            ("no_forwarder".to_string(), self.no_forwarder.get()),
            ("no_route".to_string(), self.no_route.get()),
            ("no_transport".to_string(), self.no_transport.get()),
            ("link_cache_hits".to_string(), self.link_cache_hits.get()),
            ("link_cache_misses".to_string(), self.link_cache_misses.get()),
            ("icmp_reports".to_string(), self.icmp_reports.get()),
            ("icmp_unclaimed".to_string(), self.icmp_unclaimed.get()),
        ];

        for hook in Hook::ALL {
            result.push((format!("{}_drops", hook.name()), self.drops(hook)));
        }

        result
    }
}
