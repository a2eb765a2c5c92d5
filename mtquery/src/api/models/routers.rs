use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::capability::DisplayOptions;
use crate::types::CapabilityName;

/// Query parameters naming the router to query.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct HostQuery {
    /// Router address; defaults to the configured router
    pub host: Option<String>,
}

/// Query parameters for capability and aggregate reports.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CapabilityQuery {
    /// Router address; defaults to the configured router
    pub host: Option<String>,
    /// Include leases that are disabled in the router configuration
    #[serde(default)]
    pub show_disabled: bool,
    /// Include devices still reporting a factory-default MAC prefix
    #[serde(default)]
    pub show_default: bool,
}

impl CapabilityQuery {
    pub fn options(&self) -> DisplayOptions {
        DisplayOptions {
            show_disabled: self.show_disabled,
            show_default: self.show_default,
        }
    }
}

/// Capability selection request.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityRequest {
    /// Router address; defaults to the configured router
    pub host: Option<String>,
    /// Capabilities to report. Empty reports every configured capability.
    #[serde(default)]
    pub capabilities: Vec<CapabilityName>,
    #[serde(default)]
    pub show_disabled: bool,
    #[serde(default)]
    pub show_default: bool,
}

impl CapabilityRequest {
    pub fn options(&self) -> DisplayOptions {
        DisplayOptions {
            show_disabled: self.show_disabled,
            show_default: self.show_default,
        }
    }

    /// Requested names without repeats, first occurrence wins.
    pub fn names(&self) -> Vec<CapabilityName> {
        let mut names = Vec::with_capacity(self.capabilities.len());
        for name in &self.capabilities {
            if !names.contains(name) {
                names.push(*name);
            }
        }
        names
    }
}
