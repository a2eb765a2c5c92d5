//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures
//!
//! # API Structure
//!
//! - **Routers** (`/api/v2/{aggregate,capability,identity,firmware,leases,netwatch}`): health
//!   queries against one router, selected with the `host` query parameter
//! - **Legacy capability selection** (`/api/v1/{aggregate,capability}`): the same reports, with
//!   the capability section limited to the names listed in the request body
//! - **Backups** (`/api/v2/backups`): trigger a configuration export, list stored backups
//!
//! All endpoints are documented with `utoipa`; the interactive reference is served at `/docs`.

pub mod handlers;
pub mod models;
