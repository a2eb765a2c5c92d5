//! Typed views of router output.
//!
//! Each type is built from a normalized (camel-case) [`Record`]. Construction is total: absent
//! or oddly-typed fields fall back to empty values instead of failing the request.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{cmp::Ordering, fmt, str::FromStr};
use utoipa::ToSchema;

use crate::capability::CapabilityReport;
use crate::normalize::Normalized;
use crate::types::{LeaseStatus, NetwatchStatus, Record};

fn text(record: &Record, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn flag(record: &Record, key: &str) -> bool {
    match record.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.as_str(), "true" | "yes"),
        _ => false,
    }
}

/// A DHCP lease. `is_healthy` is derived from `status` when the lease is built.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Lease {
    /// Configuration comment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Leased IP address, empty when the router reported none
    pub address: String,
    pub mac_address: String,
    pub status: LeaseStatus,
    /// True if the lease has been disabled via configuration
    pub disabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
    /// False unless the lease is bound
    pub is_healthy: bool,
}

impl Lease {
    pub fn new(address: impl Into<String>, mac_address: impl Into<String>, status: LeaseStatus, disabled: bool) -> Self {
        Self {
            comment: None,
            address: address.into(),
            mac_address: mac_address.into(),
            status,
            disabled,
            last_seen: None,
            is_healthy: status == LeaseStatus::Bound,
        }
    }

    pub fn from_record(record: &Record) -> Self {
        let status = text(record, "status").map(|s| LeaseStatus::parse(&s)).unwrap_or(LeaseStatus::Unknown);
        Self {
            comment: text(record, "comment"),
            address: text(record, "address").unwrap_or_default(),
            mac_address: text(record, "macAddress").unwrap_or_default(),
            status,
            disabled: flag(record, "disabled"),
            last_seen: text(record, "lastSeen"),
            is_healthy: status == LeaseStatus::Bound,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct Identity {
    pub name: Option<String>,
}

impl Identity {
    pub fn from_record(record: &Record) -> Self {
        Self {
            name: text(record, "name"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetwatchEntry {
    pub host: Option<String>,
    pub status: NetwatchStatus,
    /// Time of the last status change, as reported by the router
    pub since: Option<String>,
    pub comment: Option<String>,
}

impl NetwatchEntry {
    pub fn from_record(record: &Record) -> Self {
        Self {
            host: text(record, "host"),
            status: text(record, "status")
                .map(|s| NetwatchStatus::parse(&s))
                .unwrap_or(NetwatchStatus::Unknown),
            since: text(record, "since"),
            comment: text(record, "comment"),
        }
    }
}

/// Pre-release stage of a firmware build. Stages order before the release they lead up to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PreRelease {
    Alpha(u64),
    Beta(u64),
    Rc(u64),
}

impl PreRelease {
    fn parse(tag: &str) -> Option<Self> {
        let split = tag.find(|c: char| c.is_ascii_digit()).unwrap_or(tag.len());
        let (stage, number) = tag.split_at(split);
        let number = if number.is_empty() { 0 } else { number.parse().ok()? };
        match stage {
            "alpha" => Some(PreRelease::Alpha(number)),
            "beta" => Some(PreRelease::Beta(number)),
            "rc" => Some(PreRelease::Rc(number)),
            _ => None,
        }
    }
}

impl fmt::Display for PreRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreRelease::Alpha(n) => write!(f, "alpha{n}"),
            PreRelease::Beta(n) => write!(f, "beta{n}"),
            PreRelease::Rc(n) => write!(f, "rc{n}"),
        }
    }
}

/// A RouterOS release version such as `6.44.5` or `7.15beta3`.
///
/// Components compare numerically; missing trailing components count as zero, so `6.44`
/// equals `6.44.0`. A pre-release sorts before its release: `7.15beta3 < 7.15rc1 < 7.15`.
#[derive(Debug, Clone, Eq)]
pub struct FirmwareVersion {
    release: Vec<u64>,
    pre: Option<PreRelease>,
}

impl FirmwareVersion {
    fn component(&self, i: usize) -> u64 {
        self.release.get(i).copied().unwrap_or(0)
    }

    pub fn pre_release(&self) -> Option<PreRelease> {
        self.pre
    }
}

/// Oldest firmware considered healthy unless configured otherwise.
impl Default for FirmwareVersion {
    fn default() -> Self {
        FirmwareVersion {
            release: vec![6, 44, 5],
            pre: None,
        }
    }
}

impl FromStr for FirmwareVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("empty firmware version".to_string());
        }
        let invalid = || format!("invalid firmware version: {s}");

        let (numbers, tag) = match trimmed.find(|c: char| c.is_ascii_alphabetic()) {
            Some(at) => trimmed.split_at(at),
            None => (trimmed, ""),
        };
        let pre = match tag {
            "" => None,
            tag => Some(PreRelease::parse(tag).ok_or_else(invalid)?),
        };
        let release = numbers
            .split('.')
            .map(|part| part.parse::<u64>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FirmwareVersion { release, pre })
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.release.iter().map(u64::to_string).collect();
        f.write_str(&parts.join("."))?;
        match self.pre {
            Some(pre) => write!(f, "{pre}"),
            None => Ok(()),
        }
    }
}

impl Ord for FirmwareVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.release.len().max(other.release.len());
        let release = (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal);

        release.then_with(|| match (self.pre, other.pre) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.cmp(&b),
        })
    }
}

impl PartialOrd for FirmwareVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FirmwareVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Serialize for FirmwareVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FirmwareVersion {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FirmwareMeta {
    pub current_firmware: Option<String>,
    pub upgrade_firmware: Option<String>,
    pub factory_firmware: Option<String>,
    pub model: Option<String>,
}

impl FirmwareMeta {
    pub fn from_record(record: &Record) -> Self {
        Self {
            current_firmware: text(record, "currentFirmware"),
            upgrade_firmware: text(record, "upgradeFirmware"),
            factory_firmware: text(record, "factoryFirmware"),
            model: text(record, "model"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Firmware {
    /// False if the running firmware is older than the configured baseline
    pub is_healthy: bool,
    pub meta_data: FirmwareMeta,
}

/// Capability section of an aggregate: the full report (v2) or the client-selected
/// projection of it (v1).
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CapabilityView {
    Report(CapabilityReport),
    Selected(Normalized),
}

/// The combined identity/firmware/capability/lease/netwatch report for one router.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct AggregateSnapshot {
    pub identity: Option<Identity>,
    pub firmware: Option<Firmware>,
    #[schema(value_type = Option<std::collections::HashMap<String, crate::capability::CapabilityResult>>)]
    pub capability: Option<CapabilityView>,
    pub leases: Option<Vec<Lease>>,
    pub netwatch: Option<Vec<NetwatchEntry>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_lease_from_record() {
        let lease = Lease::from_record(&record(json!({
            "comment": "TRS01",
            "address": "192.168.100.61",
            "macAddress": "93:FB:E5:3D:0E:BF",
            "status": "bound",
            "disabled": false,
            "lastSeen": "3m2s",
        })));

        assert_eq!(lease.comment.as_deref(), Some("TRS01"));
        assert_eq!(lease.status, LeaseStatus::Bound);
        assert!(lease.is_healthy);
        assert!(!lease.disabled);
        assert_eq!(lease.last_seen.as_deref(), Some("3m2s"));
    }

    #[test]
    fn test_lease_backfills_missing_fields() {
        let lease = Lease::from_record(&record(json!({
            "macAddress": "00:11:22:33:44:55",
            "status": "waiting",
            "disabled": "yes",
        })));

        assert_eq!(lease.address, "");
        assert!(lease.disabled);
        assert!(!lease.is_healthy);
    }

    #[test]
    fn test_lease_serializes_camel_case() {
        let lease = Lease::new("10.0.0.5", "AA:BB", LeaseStatus::Bound, false);
        let value = serde_json::to_value(&lease).unwrap();
        assert_eq!(
            value,
            json!({
                "address": "10.0.0.5",
                "macAddress": "AA:BB",
                "status": "bound",
                "disabled": false,
                "isHealthy": true,
            })
        );
    }

    #[test]
    fn test_firmware_version_ordering() {
        let baseline: FirmwareVersion = "6.44.5".parse().unwrap();
        assert!("6.44.4".parse::<FirmwareVersion>().unwrap() < baseline);
        assert!("6.44.5".parse::<FirmwareVersion>().unwrap() >= baseline);
        // ordinal, not lexicographic
        assert!("6.100.1".parse::<FirmwareVersion>().unwrap() > baseline);
        assert!("7.1".parse::<FirmwareVersion>().unwrap() > baseline);
        assert_eq!("6.44".parse::<FirmwareVersion>().unwrap(), "6.44.0".parse().unwrap());
    }

    #[test]
    fn test_firmware_version_pre_releases() {
        let beta: FirmwareVersion = "7.15beta3".parse().unwrap();
        let rc: FirmwareVersion = "7.15rc1".parse().unwrap();
        let release: FirmwareVersion = "7.15".parse().unwrap();

        assert_eq!(beta.pre_release(), Some(PreRelease::Beta(3)));
        assert!(beta < rc);
        assert!(rc < release);
        assert!(beta < release);
        assert!(beta > FirmwareVersion::default());
        assert!("7.15beta10".parse::<FirmwareVersion>().unwrap() > beta);
        assert!("7.14.3".parse::<FirmwareVersion>().unwrap() < beta);
        assert_eq!(beta.to_string(), "7.15beta3");
    }

    #[test]
    fn test_firmware_version_rejects_garbage() {
        assert!("".parse::<FirmwareVersion>().is_err());
        assert!("six".parse::<FirmwareVersion>().is_err());
        assert!("7.1gamma2".parse::<FirmwareVersion>().is_err());
        assert!("7.1beta2.4".parse::<FirmwareVersion>().is_err());
        assert!("beta2".parse::<FirmwareVersion>().is_err());
    }

    #[test]
    fn test_netwatch_entry_from_record() {
        let entry = NetwatchEntry::from_record(&record(json!({
            "host": "192.168.100.1",
            "status": "up",
            "since": "aug/02/2019 18:18:11",
            "comment": "system - TRS01",
        })));
        assert_eq!(entry.status, NetwatchStatus::Up);
        assert_eq!(entry.host.as_deref(), Some("192.168.100.1"));
    }
}
