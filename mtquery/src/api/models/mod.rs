//! API request and response data models.
//!
//! Report bodies (leases, firmware, capability reports, backup inventories) are the domain
//! types from [`crate::query::models`], [`crate::capability`] and [`crate::backup::models`];
//! this module only holds the request shapes and the few responses owned by the HTTP layer.

pub mod backups;
pub mod routers;
