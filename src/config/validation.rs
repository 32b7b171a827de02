//! Configuration validation

use super::{Addressing, StackConfig};
use crate::protocol::MacAddr;
use crate::telemetry::LogConfig;

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn print_diagnostics(&self) {
        for warning in &self.warnings {
            println!("[WARN] {}", warning);
        }
        for error in &self.errors {
            println!("[ERROR] {}", error);
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate configuration and return warnings/errors
pub fn validate(config: &StackConfig) -> ValidationResult {
    let mut result = ValidationResult::new();

    validate_interface(config, &mut result);
    validate_addressing(config, &mut result);
    validate_vips(config, &mut result);
    validate_timers(config, &mut result);
    if let Some(log) = &config.log {
        validate_log(log, &mut result);
    }

    result
}

fn validate_interface(config: &StackConfig, result: &mut ValidationResult) {
    if config.interface.is_empty() {
        result.error("interface: name must not be empty");
    }

    if let Some(mac) = &config.mac {
        match mac.parse::<MacAddr>() {
            Ok(mac) if !mac.is_unicast() => {
                result.error(format!("mac: {} is not a unicast address", mac))
            }
            Ok(_) => {}
            Err(e) => result.error(format!("mac: {}", e)),
        }
    }

    if config.mtu.is_none() {
        result.warn("mtu not specified, using default 1500");
    }
}

fn validate_addressing(config: &StackConfig, result: &mut ValidationResult) {
    match config.ip_and_mask() {
        Ok(Some(_)) => {}
        Ok(None) => {
            if config.addressing == Addressing::Static {
                result.error("address: static addressing requires address");
            }
        }
        Err(e) => result.error(e),
    }

    if let Err(e) = config.gateway_addr() {
        result.error(e);
    } else if config.gateway.is_none() && config.addressing == Addressing::Static {
        result.warn("gateway not specified, only on-link destinations are reachable");
    }

    if let Err(e) = config.dns_addr() {
        result.error(e);
    } else if config.dns.is_none() && config.addressing == Addressing::Static {
        result.warn("dns not specified, hostname resolution will fail");
    }

    if config.addressing == Addressing::Dhcp && config.address.is_some() {
        result.warn("address: ignored with dhcp addressing");
    }

    if let Some(domain) = &config.domain {
        if let Err(e) = crate::dataplane::validate_hostname(domain) {
            result.error(format!("domain: {}", e));
        }
    }
}

fn validate_vips(config: &StackConfig, result: &mut ValidationResult) {
    let vips = match config.vip_addrs() {
        Ok(vips) => vips,
        Err(e) => {
            result.error(e);
            return;
        }
    };

    let primary = config.ip_and_mask().ok().flatten().map(|(ip, _)| ip);
    for (i, vip) in vips.iter().enumerate() {
        if Some(*vip) == primary {
            result.warn(format!("virtual_ips[{}]: {} equals the primary address", i, vip));
        }
        if vips[..i].contains(vip) {
            result.warn(format!("virtual_ips[{}]: duplicate {}", i, vip));
        }
    }
}

fn validate_timers(config: &StackConfig, result: &mut ValidationResult) {
    let timeout = config.dhcp_timeout_secs;
    if !timeout.is_finite() || timeout <= 0.0 {
        result.error(format!(
            "dhcp_timeout_secs: must be positive, got {}",
            timeout
        ));
    }

    if config.link_cache_flush_secs == 0 {
        result.warn("link_cache_flush_secs: 0 disables link cache expiry");
    }
}

fn validate_log(log: &LogConfig, result: &mut ValidationResult) {
    if !matches!(
        log.level.to_lowercase().as_str(),
        "error" | "warn" | "info" | "debug" | "trace"
    ) {
        result.warn(format!("log.level: unknown level '{}', using info", log.level));
    }
    if !matches!(log.format.as_str(), "pretty" | "compact" | "json") {
        result.warn(format!(
            "log.format: unknown format '{}', using pretty",
            log.format
        ));
    }
}
