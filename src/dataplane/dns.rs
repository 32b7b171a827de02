//! DNS resolution binding
//!
//! Query construction, caching and response parsing belong to the external
//! resolver. The stack picks the server, rejects names that can never be
//! encoded, and hands the request over with its completion callback.

use crate::protocol::AddressFamily;
use crate::{Error, Result};

/// Completion callback: the resolved address or the reason it failed
pub type ResolveFn<F> = Box<dyn FnOnce(Result<<F as AddressFamily>::Addr>) + Send>;

/// Maximum length of a domain name in presentation form (RFC 1035 2.3.4)
const MAX_NAME_LEN: usize = 253;

/// Maximum length of a single label (RFC 1035 2.3.4)
const MAX_LABEL_LEN: usize = 63;

/// External DNS resolver
pub trait Resolver<F: AddressFamily>: Send {
    /// Resolve `hostname` against `server`. With `force` the resolver must
    /// bypass its own cache. `on_done` is invoked exactly once.
    fn resolve(&mut self, server: F::Addr, hostname: &str, force: bool, on_done: ResolveFn<F>);
}

/// Check that `hostname` can be put on the wire as a query name
pub fn validate_hostname(hostname: &str) -> Result<()> {
    let invalid = || Error::InvalidHostname(hostname.to_string());

    let name = hostname.strip_suffix('.').unwrap_or(hostname);
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(invalid());
    }

    for label in name.split('.') {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return Err(invalid());
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(invalid());
        }
        if !label
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(invalid());
        }
    }

    Ok(())
}
