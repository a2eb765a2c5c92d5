//! OpenAPI documentation for the HTTP API, served by Scalar at `/docs` and as JSON at
//! `/api-docs/openapi.json`.

use utoipa::OpenApi;

use crate::api;
use crate::backup::models as backup_models;
use crate::capability;
use crate::query::models;
use crate::types;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "mtquery",
        description = "Health reports and configuration backups for MikroTik routers."
    ),
    paths(
        api::handlers::routers::get_aggregate,
        api::handlers::routers::get_capability,
        api::handlers::routers::get_identity,
        api::handlers::routers::get_firmware,
        api::handlers::routers::get_leases,
        api::handlers::routers::get_netwatch,
        api::handlers::routers::select_capability,
        api::handlers::routers::select_aggregate,
        api::handlers::backups::trigger_backup,
        api::handlers::backups::get_backup_info,
    ),
    components(
        schemas(
            models::AggregateSnapshot,
            models::Identity,
            models::Firmware,
            models::FirmwareMeta,
            models::Lease,
            models::NetwatchEntry,
            types::LeaseStatus,
            types::NetwatchStatus,
            types::CapabilityName,
            capability::CapabilityResult,
            api::models::routers::CapabilityRequest,
            api::models::backups::BackupWritten,
            backup_models::BackupInfo,
            backup_models::BackupRecord,
            backup_models::ScheduledJobInfo,
        )
    ),
    tags(
        (name = "routers", description = "Health queries against a router.

Every endpoint accepts a `host` query parameter (or body field); without it the configured router is queried.

A **capability** is a group of devices defined by an address prefix, a range of last octets and the MAC prefix of factory-default units. A capability is healthy when every matched DHCP lease is bound."),
        (name = "backups", description = "Configuration exports of the managed router.

Backups run on a fixed interval and on demand. Only one export runs at a time; a request that cannot start within the configured wait is answered with 503."),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_route_is_documented() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();

        for path in [
            "/api/v2/aggregate",
            "/api/v2/capability",
            "/api/v2/identity",
            "/api/v2/firmware",
            "/api/v2/leases",
            "/api/v2/netwatch",
            "/api/v1/capability",
            "/api/v1/aggregate",
            "/api/v2/backups",
        ] {
            assert!(paths.iter().any(|p| p.as_str() == path), "{path} is not documented");
        }
    }

    #[test]
    fn test_capability_response_is_a_map_of_results() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let schema = &doc["paths"]["/api/v2/capability"]["get"]["responses"]["200"]["content"]["application/json"]["schema"];

        assert_eq!(schema["type"], serde_json::json!("object"));
        assert!(schema["additionalProperties"]["$ref"].as_str().unwrap().ends_with("CapabilityResult"));
    }
}
