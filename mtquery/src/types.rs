//! Common type definitions shared by the device, classification and API layers.
//!
//! - [`Record`]: one raw row returned by a router command
//! - [`CapabilityName`]: the closed set of capability identifiers a rule may carry
//! - [`LeaseStatus`] and [`NetwatchStatus`]: router-reported states, validated when rows are
//!   turned into typed values

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use utoipa::ToSchema;

/// One row of router output, keyed by field name. Key order follows the device reply.
pub type Record = serde_json::Map<String, Value>;

/// Capability identifiers known to the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum CapabilityName {
    Irr,
    Pwr,
    Tce,
    Vid,
    Srv,
}

impl CapabilityName {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityName::Irr => "IRR",
            CapabilityName::Pwr => "PWR",
            CapabilityName::Tce => "TCE",
            CapabilityName::Vid => "VID",
            CapabilityName::Srv => "SRV",
        }
    }
}

impl fmt::Display for CapabilityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// DHCP lease state as reported by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LeaseStatus {
    Waiting,
    Testing,
    Authorizing,
    Busy,
    Offered,
    Bound,
    Unknown,
}

impl LeaseStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "waiting" => LeaseStatus::Waiting,
            "testing" => LeaseStatus::Testing,
            "authorizing" => LeaseStatus::Authorizing,
            "busy" => LeaseStatus::Busy,
            "offered" => LeaseStatus::Offered,
            "bound" => LeaseStatus::Bound,
            _ => LeaseStatus::Unknown,
        }
    }
}

/// Reachability of a host monitored by the router's netwatch tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NetwatchStatus {
    Up,
    Down,
    Unknown,
}

impl NetwatchStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "up" => NetwatchStatus::Up,
            "down" => NetwatchStatus::Down,
            _ => NetwatchStatus::Unknown,
        }
    }
}
