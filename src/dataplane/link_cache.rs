//! Link-address cache (IP to MAC mapping)
//!
//! Entries age individually: an entry older than the flush interval is
//! treated as absent on lookup, and [`LinkCache::poll`] purges every
//! expired entry once per interval.

use crate::protocol::MacAddr;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Default flush interval (5 minutes)
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy)]
struct LinkEntry {
    mac: MacAddr,
    inserted_at: Instant,
}

/// Cache of resolved link addresses
#[derive(Debug)]
pub struct LinkCache<A> {
    entries: HashMap<A, LinkEntry>,
    /// Zero disables expiry
    flush_interval: Duration,
    next_purge: Instant,
}

impl<A: Copy + Eq + Hash> LinkCache<A> {
    pub fn new(flush_interval: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            flush_interval,
            next_purge: Instant::now() + flush_interval,
        }
    }

    /// Insert or overwrite the mapping for `addr`
    pub fn insert(&mut self, addr: A, mac: MacAddr, now: Instant) {
        self.entries.insert(
            addr,
            LinkEntry {
                mac,
                inserted_at: now,
            },
        );
    }

    /// Lookup the link address for `addr`, ignoring expired entries
    pub fn lookup(&self, addr: &A, now: Instant) -> Option<MacAddr> {
        self.entries
            .get(addr)
            .filter(|e| !self.is_expired(e, now))
            .map(|e| e.mac)
    }

    pub fn remove(&mut self, addr: &A) -> Option<MacAddr> {
        self.entries.remove(addr).map(|e| e.mac)
    }

    /// Drop every entry
    pub fn flush(&mut self) {
        self.entries.clear();
    }

    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    /// Change the flush interval; the next purge is one interval from `now`
    pub fn set_flush_interval(&mut self, interval: Duration, now: Instant) {
        self.flush_interval = interval;
        self.next_purge = now + interval;
    }

    /// Remove expired entries, returning how many were removed
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        let interval = self.flush_interval;
        if !interval.is_zero() {
            self.entries
                .retain(|_, e| now.saturating_duration_since(e.inserted_at) <= interval);
        }
        before - self.entries.len()
    }

    /// Periodic maintenance; purges when the interval has elapsed
    pub fn poll(&mut self, now: Instant) -> usize {
        if self.flush_interval.is_zero() || now < self.next_purge {
            return 0;
        }
        self.next_purge = now + self.flush_interval;
        self.purge_expired(now)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, entry: &LinkEntry, now: Instant) -> bool {
        !self.flush_interval.is_zero()
            && now.saturating_duration_since(entry.inserted_at) > self.flush_interval
    }
}

impl<A: Copy + Eq + Hash> Default for LinkCache<A> {
    fn default() -> Self {
        Self::new(DEFAULT_FLUSH_INTERVAL)
    }
}
