//! Router health queries.
//!
//! [`RouterQueries`] turns device sessions into typed reports. Every query opens its own
//! session, so an aggregate touches the router once per section. Sections are fetched
//! sequentially and the first failure aborts the whole aggregate: partial snapshots are never
//! returned.

pub mod models;

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::capability::{self, CapabilityReport, CapabilityRule, DisplayOptions};
use crate::device::{self, DeviceConnector};
use crate::errors::{Error, Result};
use crate::normalize::{Normalized, normalize};
use crate::types::{CapabilityName, Record};
use models::{AggregateSnapshot, CapabilityView, Firmware, FirmwareMeta, FirmwareVersion, Identity, Lease, NetwatchEntry};

pub const IDENTITY_COMMAND: &str = "/system/identity/print";
pub const ROUTERBOARD_COMMAND: &str = "/system/routerboard/print";
pub const LEASE_COMMAND: &str = "/ip/dhcp-server/lease/print";
pub const NETWATCH_COMMAND: &str = "/tool/netwatch/print";

const FIRMWARE_KEYS: &[&str] = &["factory-firmware", "current-firmware", "upgrade-firmware", "model"];
const LEASE_KEYS: &[&str] = &["comment", "address", "mac-address", "status", "disabled", "last-seen"];
const NETWATCH_KEYS: &[&str] = &["comment", "host", "status", "since"];

pub struct RouterQueries {
    connector: Arc<dyn DeviceConnector>,
    rules: Arc<[CapabilityRule]>,
    firmware_baseline: FirmwareVersion,
}

impl RouterQueries {
    pub fn new(
        connector: Arc<dyn DeviceConnector>,
        rules: impl Into<Arc<[CapabilityRule]>>,
        firmware_baseline: FirmwareVersion,
    ) -> Self {
        Self {
            connector,
            rules: rules.into(),
            firmware_baseline,
        }
    }

    pub fn rules(&self) -> &[CapabilityRule] {
        &self.rules
    }

    async fn fetch(&self, host: &str, command: &str, keys: Option<&[&str]>) -> Result<Normalized> {
        let rows = device::run_once(self.connector.as_ref(), host, command).await?;
        debug!("{} returned {} rows", command, rows.len());
        Ok(normalize(rows, keys))
    }

    #[instrument(skip(self), err)]
    pub async fn identity(&self, host: &str) -> Result<Identity> {
        let record = self.fetch(host, IDENTITY_COMMAND, None).await?.into_first();
        Ok(record.map(|r| Identity::from_record(&r)).unwrap_or_default())
    }

    /// Healthy when the running firmware is at least the configured baseline. A router that
    /// reports no parseable `current-firmware` fails the query.
    #[instrument(skip(self), err)]
    pub async fn firmware(&self, host: &str) -> Result<Firmware> {
        let meta = self
            .fetch(host, ROUTERBOARD_COMMAND, Some(FIRMWARE_KEYS))
            .await?
            .into_first()
            .map(|r| FirmwareMeta::from_record(&r))
            .unwrap_or_default();

        let command_failed = |message: String| Error::CommandFailed {
            host: host.to_string(),
            command: ROUTERBOARD_COMMAND.to_string(),
            message,
        };
        let current: FirmwareVersion = meta
            .current_firmware
            .as_deref()
            .ok_or_else(|| command_failed("router reported no current firmware".to_string()))?
            .parse()
            .map_err(command_failed)?;

        Ok(Firmware {
            is_healthy: current >= self.firmware_baseline,
            meta_data: meta,
        })
    }

    #[instrument(skip(self), err)]
    pub async fn leases(&self, host: &str) -> Result<Vec<Lease>> {
        let records = self.fetch(host, LEASE_COMMAND, Some(LEASE_KEYS)).await?.into_records();
        Ok(records.iter().map(Lease::from_record).collect())
    }

    #[instrument(skip(self), err)]
    pub async fn netwatch(&self, host: &str) -> Result<Vec<NetwatchEntry>> {
        let records = self.fetch(host, NETWATCH_COMMAND, Some(NETWATCH_KEYS)).await?.into_records();
        Ok(records.iter().map(NetwatchEntry::from_record).collect())
    }

    #[instrument(skip(self), err)]
    pub async fn capability(&self, host: &str, options: DisplayOptions) -> Result<CapabilityReport> {
        let leases = self.leases(host).await?;
        Ok(capability::classify(&leases, &self.rules, options))
    }

    /// Capability report reduced to the requested names. An empty selection keeps every
    /// capability; a single surviving record is returned unwrapped.
    #[instrument(skip(self), err)]
    pub async fn capability_selection(
        &self,
        host: &str,
        options: DisplayOptions,
        names: &[CapabilityName],
    ) -> Result<Normalized> {
        let report = self.capability(host, options).await?;
        let record = match serde_json::to_value(&report).map_err(anyhow::Error::from)? {
            Value::Object(record) => record,
            _ => Record::new(),
        };

        let keys: Vec<&str> = names.iter().map(CapabilityName::as_str).collect();
        let keys = (!keys.is_empty()).then_some(keys.as_slice());
        Ok(normalize(vec![record], keys))
    }

    #[instrument(skip(self), err)]
    pub async fn aggregate(&self, host: &str, options: DisplayOptions) -> Result<AggregateSnapshot> {
        let identity = self.identity(host).await?;
        let firmware = self.firmware(host).await?;
        let capability = self.capability(host, options).await?;
        let leases = self.leases(host).await?;
        let netwatch = self.netwatch(host).await?;

        Ok(AggregateSnapshot {
            identity: Some(identity),
            firmware: Some(firmware),
            capability: Some(CapabilityView::Report(capability)),
            leases: Some(leases),
            netwatch: Some(netwatch),
        })
    }

    /// Same as [`Self::aggregate`], with the capability section limited to `names`.
    #[instrument(skip(self), err)]
    pub async fn aggregate_selection(
        &self,
        host: &str,
        options: DisplayOptions,
        names: &[CapabilityName],
    ) -> Result<AggregateSnapshot> {
        let identity = self.identity(host).await?;
        let firmware = self.firmware(host).await?;
        let capability = self.capability_selection(host, options, names).await?;
        let leases = self.leases(host).await?;
        let netwatch = self.netwatch(host).await?;

        Ok(AggregateSnapshot {
            identity: Some(identity),
            firmware: Some(firmware),
            capability: Some(CapabilityView::Selected(capability)),
            leases: Some(leases),
            netwatch: Some(netwatch),
        })
    }
}
