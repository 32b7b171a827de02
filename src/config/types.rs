//! Configuration types

use crate::dataplane::{DEFAULT_DHCP_TIMEOUT, DEFAULT_FLUSH_INTERVAL};
use crate::protocol::family::ipv4_mask;
use crate::telemetry::LogConfig;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;

/// Stack configuration (config.toml)
#[derive(Debug, Clone, Deserialize)]
pub struct StackConfig {
    #[serde(default = "default_interface")]
    pub interface: String,
    /// Link address of the interface; generated when absent
    pub mac: Option<String>,
    pub mtu: Option<u16>,
    #[serde(default)]
    pub addressing: Addressing,
    /// `a.b.c.d` or `a.b.c.d/len`
    pub address: Option<String>,
    pub netmask: Option<String>,
    pub gateway: Option<String>,
    pub dns: Option<String>,
    pub domain: Option<String>,
    #[serde(default)]
    pub virtual_ips: Vec<String>,
    #[serde(default = "default_flush_secs")]
    pub link_cache_flush_secs: u64,
    #[serde(default = "default_dhcp_timeout")]
    pub dhcp_timeout_secs: f64,
    pub log: Option<LogConfig>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Addressing {
    #[default]
    Static,
    Dhcp,
}

fn default_interface() -> String {
    "eth0".to_string()
}

fn default_flush_secs() -> u64 {
    DEFAULT_FLUSH_INTERVAL.as_secs()
}

fn default_dhcp_timeout() -> f64 {
    DEFAULT_DHCP_TIMEOUT.as_secs_f64()
}

impl StackConfig {
    /// Primary address and netmask, from CIDR notation or the separate
    /// `netmask` key
    pub fn ip_and_mask(&self) -> Result<Option<(Ipv4Addr, Ipv4Addr)>, String> {
        let Some(address) = self.address.as_deref() else {
            return Ok(None);
        };

        if let Some((ip, len)) = address.split_once('/') {
            let ip = parse_addr("address", ip)?;
            let len: u8 = len
                .parse()
                .map_err(|_| format!("address: invalid prefix length '{}'", len))?;
            if len > 32 {
                return Err(format!("address: prefix length {} out of range", len));
            }
            return Ok(Some((ip, ipv4_mask(len))));
        }

        let ip = parse_addr("address", address)?;
        let mask = match self.netmask.as_deref() {
            Some(mask) => parse_addr("netmask", mask)?,
            None => return Err("address: netmask required without a prefix length".into()),
        };
        Ok(Some((ip, mask)))
    }

    pub fn gateway_addr(&self) -> Result<Ipv4Addr, String> {
        parse_optional("gateway", self.gateway.as_deref())
    }

    pub fn dns_addr(&self) -> Result<Ipv4Addr, String> {
        parse_optional("dns", self.dns.as_deref())
    }

    pub fn vip_addrs(&self) -> Result<Vec<Ipv4Addr>, String> {
        self.virtual_ips
            .iter()
            .map(|v| parse_addr("virtual_ips", v))
            .collect()
    }

    pub fn link_cache_flush_interval(&self) -> Duration {
        Duration::from_secs(self.link_cache_flush_secs)
    }

    /// DHCP timeout; only valid once `validate` accepted the value
    pub fn dhcp_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.dhcp_timeout_secs).unwrap_or(DEFAULT_DHCP_TIMEOUT)
    }
}

fn parse_addr(key: &str, value: &str) -> Result<Ipv4Addr, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("{}: invalid address '{}'", key, value))
}

fn parse_optional(key: &str, value: Option<&str>) -> Result<Ipv4Addr, String> {
    match value {
        Some(v) => parse_addr(key, v),
        None => Ok(Ipv4Addr::UNSPECIFIED),
    }
}

/// Effective configuration with defaults filled in, as printed by `show`
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub interface: String,
    pub addressing: Addressing,
    pub address: String,
    pub netmask: String,
    pub gateway: String,
    pub dns: String,
    pub domain: String,
    pub virtual_ips: Vec<String>,
    pub link_cache_flush_secs: u64,
    pub dhcp_timeout_secs: f64,
}

impl EffectiveConfig {
    pub fn from_config(config: &StackConfig) -> Self {
        let (ip, mask) = config
            .ip_and_mask()
            .ok()
            .flatten()
            .unwrap_or((Ipv4Addr::UNSPECIFIED, Ipv4Addr::UNSPECIFIED));

        Self {
            interface: config.interface.clone(),
            addressing: config.addressing,
            address: ip.to_string(),
            netmask: mask.to_string(),
            gateway: config.gateway_addr().unwrap_or(Ipv4Addr::UNSPECIFIED).to_string(),
            dns: config.dns_addr().unwrap_or(Ipv4Addr::UNSPECIFIED).to_string(),
            domain: config.domain.clone().unwrap_or_default(),
            virtual_ips: config.virtual_ips.clone(),
            link_cache_flush_secs: config.link_cache_flush_secs,
            dhcp_timeout_secs: config.dhcp_timeout_secs,
        }
    }
}
