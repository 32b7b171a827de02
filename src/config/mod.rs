//! Configuration management
//!
//! Loads config.toml, validates it and applies it to an IPv4 stack.

mod types;
mod validation;

pub use types::*;
pub use validation::{validate, ValidationResult};

use crate::dataplane::{Inet, Stack};
use crate::protocol::{Ipv4, MacAddr};
use crate::{Error, Result};
use std::path::Path;
use tracing::{info, warn};

/// Locally administered address used when the configuration has none
pub const DEFAULT_MAC: MacAddr = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);

/// Default MTU for the interface
pub const DEFAULT_MTU: u16 = 1500;

/// Load configuration from a TOML file
pub fn load<P: AsRef<Path>>(path: P) -> Result<StackConfig> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    parse(&content)
}

/// Parse configuration from TOML text
pub fn parse(content: &str) -> Result<StackConfig> {
    toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
}

impl StackConfig {
    pub fn link_addr(&self) -> Result<MacAddr> {
        match &self.mac {
            Some(mac) => mac.parse().map_err(|e| Error::Config(format!("mac: {}", e))),
            None => Ok(DEFAULT_MAC),
        }
    }
}

/// Apply a validated configuration to `stack`
///
/// Static addressing configures the interface immediately; DHCP starts a
/// negotiation whose timeout is logged.
pub fn apply(config: &StackConfig, stack: &mut Stack<Ipv4>) -> Result<()> {
    let result = validate(config);
    if result.has_errors() {
        return Err(Error::Config(result.errors.join("; ")));
    }

    stack.set_link_cache_flush_interval(config.link_cache_flush_interval());

    for vip in config.vip_addrs().map_err(Error::Config)? {
        stack.add_vip(vip);
    }

    if let Some(domain) = &config.domain {
        stack.set_domain_name(domain.clone());
    }

    match config.addressing {
        Addressing::Static => {
            let (ip, mask) = config
                .ip_and_mask()
                .map_err(Error::Config)?
                .ok_or_else(|| Error::Config("address: missing".into()))?;
            let gateway = config.gateway_addr().map_err(Error::Config)?;
            let dns = config.dns_addr().map_err(Error::Config)?;
            stack.network_config(ip, mask, gateway, dns);
        }
        Addressing::Dhcp => {
            let ifname = config.interface.clone();
            stack.negotiate_dhcp(
                config.dhcp_timeout(),
                Some(Box::new(move |timed_out: bool| {
                    if timed_out {
                        warn!("{}: DHCP timed out", ifname);
                    } else {
                        info!("{}: DHCP lease obtained", ifname);
                    }
                })),
            );
        }
    }

    Ok(())
}
