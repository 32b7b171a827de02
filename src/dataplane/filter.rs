//! Filter chains
//!
//! Each stack carries five hooks (prerouting, postrouting, forward, input,
//! output). A hook is an ordered list of stages; every stage takes
//! ownership of the packet and either hands it back to continue or returns
//! `None` to drop it. Evaluation stops at the first drop.

use crate::dataplane::Inet;
use crate::protocol::{AddressFamily, IpPacket};
use std::fmt;
use tracing::debug;

/// A single filter stage
pub type Packetfilter<F> =
    Box<dyn Fn(IpPacket<F>, &dyn Inet<F>) -> Option<IpPacket<F>> + Send>;

/// Pipeline points where filter chains run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    /// Before the routing decision
    Prerouting,
    /// After the routing decision, right before the driver
    Postrouting,
    /// Inside the forwarder, for packets not addressed to us
    Forward,
    /// Before protocol dispatch
    Input,
    /// After leaving a protocol handler
    Output,
}

impl Hook {
    pub const ALL: [Hook; 5] = [
        Hook::Prerouting,
        Hook::Postrouting,
        Hook::Forward,
        Hook::Input,
        Hook::Output,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Hook::Prerouting => "prerouting",
            Hook::Postrouting => "postrouting",
            Hook::Forward => "forward",
            Hook::Input => "input",
            Hook::Output => "output",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of running a packet through a chain
#[derive(Debug)]
pub enum Verdict<F: AddressFamily> {
    /// Every stage passed the packet on
    Accept(IpPacket<F>),
    /// Stage number `stage` (1-based) of chain `chain` dropped the packet
    Drop { chain: &'static str, stage: usize },
}

impl<F: AddressFamily> Verdict<F> {
    pub fn into_packet(self) -> Option<IpPacket<F>> {
        match self {
            Verdict::Accept(pkt) => Some(pkt),
            Verdict::Drop { .. } => None,
        }
    }
}

/// Ordered, named list of filter stages
pub struct FilterChain<F: AddressFamily> {
    chain: Vec<Packetfilter<F>>,
    name: &'static str,
}

impl<F: AddressFamily> FilterChain<F> {
    pub fn new(name: &'static str, filters: Vec<Packetfilter<F>>) -> Self {
        Self {
            chain: filters,
            name,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Append a stage at the end of the chain
    pub fn append<S>(&mut self, stage: S)
    where
        S: Fn(IpPacket<F>, &dyn Inet<F>) -> Option<IpPacket<F>> + Send + 'static,
    {
        self.chain.push(Box::new(stage));
    }

    /// Remove the stage at `index` (0-based). Returns false if out of range.
    pub fn remove(&mut self, index: usize) -> bool {
        if index >= self.chain.len() {
            return false;
        }
        self.chain.remove(index);
        true
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Run every stage in order and report where the packet stopped
    pub fn evaluate(&self, mut pckt: IpPacket<F>, stack: &dyn Inet<F>) -> Verdict<F> {
        for (i, filter) in self.chain.iter().enumerate() {
            match filter(pckt, stack) {
                Some(p) => pckt = p,
                None => {
                    return Verdict::Drop {
                        chain: self.name,
                        stage: i + 1,
                    }
                }
            }
        }
        Verdict::Accept(pckt)
    }

    /// Run every stage in order; `None` means a stage consumed the packet
    pub fn run(&self, pckt: IpPacket<F>, stack: &dyn Inet<F>) -> Option<IpPacket<F>> {
        match self.evaluate(pckt, stack) {
            Verdict::Accept(pckt) => Some(pckt),
            Verdict::Drop { chain, stage } => {
                debug!(chain, stage, "Packet dropped in {} chain, filter {}", chain, stage);
                None
            }
        }
    }
}

impl<F: AddressFamily> fmt::Debug for FilterChain<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("name", &self.name)
            .field("stages", &self.chain.len())
            .finish()
    }
}

/// The five hooks of one stack
#[derive(Debug)]
pub struct FilterChains<F: AddressFamily> {
    chains: [FilterChain<F>; 5],
}

impl<F: AddressFamily> FilterChains<F> {
    pub fn new() -> Self {
        Self {
            chains: Hook::ALL.map(|hook| FilterChain::new(hook.name(), Vec::new())),
        }
    }

    pub fn get(&self, hook: Hook) -> &FilterChain<F> {
        &self.chains[hook.index()]
    }

    pub fn get_mut(&mut self, hook: Hook) -> &mut FilterChain<F> {
        &mut self.chains[hook.index()]
    }
}

impl<F: AddressFamily> Default for FilterChains<F> {
    fn default() -> Self {
        Self::new()
    }
}
