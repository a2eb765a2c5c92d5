//! Handlers for router health queries.

use axum::{
    Json,
    extract::{Query, State},
};

use super::resolve_host;
use crate::AppState;
use crate::api::models::routers::{CapabilityQuery, CapabilityRequest, HostQuery};
use crate::capability::CapabilityReport;
use crate::errors::Result;
use crate::normalize::Normalized;
use crate::query::models::{AggregateSnapshot, Firmware, Identity, Lease, NetwatchEntry};

#[utoipa::path(
    get,
    path = "/api/v2/aggregate",
    tag = "routers",
    summary = "Aggregate health report",
    params(CapabilityQuery),
    responses(
        (status = 200, description = "Identity, firmware, capability, lease and netwatch reports", body = AggregateSnapshot),
        (status = 400, description = "Invalid credentials or request"),
        (status = 404, description = "Router unreachable"),
        (status = 502, description = "Router rejected a command")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_aggregate(
    State(state): State<AppState>,
    Query(query): Query<CapabilityQuery>,
) -> Result<Json<AggregateSnapshot>> {
    let host = resolve_host(&state, query.host.as_deref())?;
    let snapshot = state.queries.aggregate(&host, query.options()).await?;
    Ok(Json(snapshot))
}

#[utoipa::path(
    get,
    path = "/api/v2/capability",
    tag = "routers",
    summary = "Capability report",
    params(CapabilityQuery),
    responses(
        (status = 200, description = "One entry per configured capability", body = std::collections::HashMap<String, crate::capability::CapabilityResult>),
        (status = 400, description = "Invalid credentials or request"),
        (status = 404, description = "Router unreachable"),
        (status = 502, description = "Router rejected a command")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_capability(
    State(state): State<AppState>,
    Query(query): Query<CapabilityQuery>,
) -> Result<Json<CapabilityReport>> {
    let host = resolve_host(&state, query.host.as_deref())?;
    let report = state.queries.capability(&host, query.options()).await?;
    Ok(Json(report))
}

#[utoipa::path(
    get,
    path = "/api/v2/identity",
    tag = "routers",
    summary = "Router identity",
    params(HostQuery),
    responses(
        (status = 200, description = "Configured router name", body = Identity),
        (status = 400, description = "Invalid credentials or request"),
        (status = 404, description = "Router unreachable")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_identity(State(state): State<AppState>, Query(query): Query<HostQuery>) -> Result<Json<Identity>> {
    let host = resolve_host(&state, query.host.as_deref())?;
    Ok(Json(state.queries.identity(&host).await?))
}

#[utoipa::path(
    get,
    path = "/api/v2/firmware",
    tag = "routers",
    summary = "Firmware versions",
    params(HostQuery),
    responses(
        (status = 200, description = "Firmware versions and health against the baseline", body = Firmware),
        (status = 400, description = "Invalid credentials or request"),
        (status = 404, description = "Router unreachable"),
        (status = 502, description = "Router reported no usable firmware version")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_firmware(State(state): State<AppState>, Query(query): Query<HostQuery>) -> Result<Json<Firmware>> {
    let host = resolve_host(&state, query.host.as_deref())?;
    Ok(Json(state.queries.firmware(&host).await?))
}

#[utoipa::path(
    get,
    path = "/api/v2/leases",
    tag = "routers",
    summary = "DHCP leases",
    params(HostQuery),
    responses(
        (status = 200, description = "Every DHCP lease on the router", body = Vec<Lease>),
        (status = 400, description = "Invalid credentials or request"),
        (status = 404, description = "Router unreachable")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_leases(State(state): State<AppState>, Query(query): Query<HostQuery>) -> Result<Json<Vec<Lease>>> {
    let host = resolve_host(&state, query.host.as_deref())?;
    Ok(Json(state.queries.leases(&host).await?))
}

#[utoipa::path(
    get,
    path = "/api/v2/netwatch",
    tag = "routers",
    summary = "Netwatch entries",
    params(HostQuery),
    responses(
        (status = 200, description = "Hosts monitored by netwatch", body = Vec<NetwatchEntry>),
        (status = 400, description = "Invalid credentials or request"),
        (status = 404, description = "Router unreachable")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_netwatch(
    State(state): State<AppState>,
    Query(query): Query<HostQuery>,
) -> Result<Json<Vec<NetwatchEntry>>> {
    let host = resolve_host(&state, query.host.as_deref())?;
    Ok(Json(state.queries.netwatch(&host).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/capability",
    tag = "routers",
    summary = "Selected capabilities",
    request_body = CapabilityRequest,
    responses(
        (status = 200, description = "The requested capabilities only", body = std::collections::HashMap<String, crate::capability::CapabilityResult>),
        (status = 400, description = "Invalid credentials or request"),
        (status = 404, description = "Router unreachable")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn select_capability(
    State(state): State<AppState>,
    Json(request): Json<CapabilityRequest>,
) -> Result<Json<Normalized>> {
    let host = resolve_host(&state, request.host.as_deref())?;
    let selection = state
        .queries
        .capability_selection(&host, request.options(), &request.names())
        .await?;
    Ok(Json(selection))
}

#[utoipa::path(
    post,
    path = "/api/v1/aggregate",
    tag = "routers",
    summary = "Aggregate report with selected capabilities",
    request_body = CapabilityRequest,
    responses(
        (status = 200, description = "Aggregate report, capability section limited to the requested names", body = AggregateSnapshot),
        (status = 400, description = "Invalid credentials or request"),
        (status = 404, description = "Router unreachable"),
        (status = 502, description = "Router rejected a command")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn select_aggregate(
    State(state): State<AppState>,
    Json(request): Json<CapabilityRequest>,
) -> Result<Json<AggregateSnapshot>> {
    let host = resolve_host(&state, request.host.as_deref())?;
    let snapshot = state
        .queries
        .aggregate_selection(&host, request.options(), &request.names())
        .await?;
    Ok(Json(snapshot))
}
