//! Capability classification of DHCP leases.
//!
//! A capability is a named group of devices on a router, defined by a [`CapabilityRule`]: an
//! address prefix, an inclusive range for the last octet, and the MAC prefix that factory-default
//! devices report. [`matches`] decides membership for one lease and [`classify`] applies every
//! configured rule to every lease.
//!
//! Address membership is textual: the rule's `base_ip` only has to appear somewhere in the lease
//! address. Deployments lay out their subnets so that this is unambiguous; overlapping prefixes
//! (`10.0.1` vs `10.0.11`) are not told apart.
//!
//! Both functions are pure and never fail. A lease address that does not parse as an IP address
//! is treated as if its last octet were [`INVALID_ADDRESS_OCTET`].

use serde::{Deserialize, Serialize, Serializer, ser::SerializeMap};
use std::net::IpAddr;
use utoipa::ToSchema;

use crate::query::models::Lease;
use crate::types::CapabilityName;

/// Last octet assumed for lease addresses that fail to parse.
pub const INVALID_ADDRESS_OCTET: u32 = 11;

/// A classification rule, loaded from configuration at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CapabilityRule {
    pub name: CapabilityName,
    /// Address prefix, e.g. `192.168.100`
    pub base_ip: String,
    /// First last-octet value belonging to the capability
    #[serde(rename = "start")]
    pub start_octet: u8,
    /// Last last-octet value belonging to the capability (inclusive)
    #[serde(rename = "end")]
    pub end_octet: u8,
    /// MAC prefix reported by factory-default devices
    pub base_mac: String,
}

/// Per-request display flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DisplayOptions {
    /// Include leases that are disabled in the router configuration
    #[serde(default)]
    pub show_disabled: bool,
    /// Include devices still carrying the rule's default MAC prefix
    #[serde(default)]
    pub show_default: bool,
}

/// Leases matched by one rule. Health is computed once from the matches.
#[derive(Debug, Clone, PartialEq, ToSchema)]
#[schema(rename_all = "camelCase")]
pub struct CapabilityResult {
    /// False if one or more matched leases is not healthy
    is_healthy: bool,
    /// Matched leases, in the order the router reported them
    metadata: Vec<Lease>,
}

impl CapabilityResult {
    pub fn from_matches(metadata: Vec<Lease>) -> Self {
        let is_healthy = metadata.iter().all(|lease| lease.is_healthy);
        Self { is_healthy, metadata }
    }

    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }

    pub fn metadata(&self) -> &[Lease] {
        &self.metadata
    }
}

// A rule without matches is reported as an empty object.
impl Serialize for CapabilityResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.metadata.is_empty() {
            return serializer.serialize_map(Some(0))?.end();
        }
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("metadata", &self.metadata)?;
        map.serialize_entry("isHealthy", &self.is_healthy)?;
        map.end()
    }
}

/// Results per capability, in configured rule order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilityReport(Vec<(CapabilityName, CapabilityResult)>);

impl CapabilityReport {
    pub fn get(&self, name: CapabilityName) -> Option<&CapabilityResult> {
        self.0.iter().find(|(n, _)| *n == name).map(|(_, result)| result)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CapabilityName, &CapabilityResult)> {
        self.0.iter().map(|(name, result)| (*name, result))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for CapabilityReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, result) in &self.0 {
            map.serialize_entry(name.as_str(), result)?;
        }
        map.end()
    }
}

/// Last dot-separated component of `address`, or [`INVALID_ADDRESS_OCTET`] when the address is
/// not an IP address (or has no numeric dotted tail).
pub fn last_octet(address: &str) -> u32 {
    if address.parse::<IpAddr>().is_err() {
        return INVALID_ADDRESS_OCTET;
    }
    address
        .rsplit('.')
        .next()
        .and_then(|tail| tail.parse().ok())
        .unwrap_or(INVALID_ADDRESS_OCTET)
}

fn has_base_ip(lease: &Lease, base_ip: &str) -> bool {
    lease.address.contains(base_ip)
}

fn in_octet_range(lease: &Lease, rule: &CapabilityRule) -> bool {
    let octet = last_octet(&lease.address);
    u32::from(rule.start_octet) <= octet && octet <= u32::from(rule.end_octet)
}

fn is_not_default_mac(lease: &Lease, base_mac: &str, show_default: bool) -> bool {
    show_default || !lease.mac_address.contains(base_mac)
}

fn is_not_disabled(lease: &Lease, show_disabled: bool) -> bool {
    show_disabled || !lease.disabled
}

/// Whether `lease` belongs to the capability described by `rule`.
pub fn matches(lease: &Lease, rule: &CapabilityRule, options: DisplayOptions) -> bool {
    has_base_ip(lease, &rule.base_ip)
        && in_octet_range(lease, rule)
        && is_not_default_mac(lease, &rule.base_mac, options.show_default)
        && is_not_disabled(lease, options.show_disabled)
}

/// Apply every rule to every lease. Every rule appears in the report, matched or not.
pub fn classify(leases: &[Lease], rules: &[CapabilityRule], options: DisplayOptions) -> CapabilityReport {
    let entries = rules
        .iter()
        .map(|rule| {
            let matched: Vec<Lease> = leases
                .iter()
                .filter(|lease| matches(lease, rule, options))
                .cloned()
                .collect();
            (rule.name, CapabilityResult::from_matches(matched))
        })
        .collect();

    CapabilityReport(entries)
}
