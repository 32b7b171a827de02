//! DHCP negotiation binding
//!
//! The DHCP wire protocol runs in an external client. The stack opens a
//! session with a deadline, the client reports a lease through
//! [`crate::Stack::complete_dhcp`], and whichever comes first (lease or
//! deadline) decides the single outcome of the session.

use crate::protocol::{AddressFamily, MacAddr};
use std::fmt;
use std::time::{Duration, Instant};

/// Callback receiving `timed_out`
pub type DhcpTimeoutFn = Box<dyn FnOnce(bool) + Send>;

/// Default negotiation timeout
pub const DEFAULT_DHCP_TIMEOUT: Duration = Duration::from_secs(10);

/// Identifies one negotiation; a newer session supersedes older ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dhcp#{}", self.0)
    }
}

/// Configuration granted by a DHCP server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease<A> {
    pub ip_addr: A,
    pub netmask: A,
    pub gateway: A,
    pub dns: A,
    pub domain_name: Option<String>,
    pub lease_time: Duration,
}

/// External DHCP client driven by the stack
pub trait DhcpClient<F: AddressFamily>: Send {
    /// Begin negotiation for `session` using `link_addr` as client id
    fn start(&mut self, session: SessionId, link_addr: MacAddr);

    /// Abandon `session` (timed out or superseded)
    fn stop(&mut self, _session: SessionId) {}
}

/// An open negotiation
pub(crate) struct DhcpSession {
    pub(crate) id: SessionId,
    pub(crate) deadline: Instant,
    pub(crate) on_timeout: Option<DhcpTimeoutFn>,
}

impl DhcpSession {
    pub(crate) fn new(id: SessionId, timeout: Duration, on_timeout: Option<DhcpTimeoutFn>) -> Self {
        Self {
            id,
            deadline: Instant::now() + timeout,
            on_timeout,
        }
    }

    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    /// Deliver the session outcome
    pub(crate) fn finish(self, timed_out: bool) {
        if let Some(cb) = self.on_timeout {
            cb(timed_out);
        }
    }
}

impl fmt::Debug for DhcpSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DhcpSession")
            .field("id", &self.id)
            .field("deadline", &self.deadline)
            .field("has_callback", &self.on_timeout.is_some())
            .finish()
    }
}
