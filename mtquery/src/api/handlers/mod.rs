//! HTTP request handlers for all API endpoints.
//!
//! - [`routers`]: health queries (identity, firmware, leases, netwatch, capability, aggregate)
//! - [`backups`]: on-demand configuration backups and the backup inventory
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Result`]; [`crate::errors::Error`] maps each failure to
//! a status code and a client-safe message.

pub mod backups;
pub mod routers;

use crate::AppState;
use crate::errors::{Error, Result};

/// The router named in the request, or the configured router when none is given.
pub(crate) fn resolve_host(state: &AppState, host: Option<&str>) -> Result<String> {
    match host.map(str::trim) {
        None => Ok(state.config.router.host.clone()),
        Some("") => Err(Error::BadRequest {
            message: "host must not be empty".to_string(),
        }),
        Some(host) => Ok(host.to_string()),
    }
}
