//! # mtquery: health reports and configuration backups for MikroTik routers
//!
//! `mtquery` is an HTTP service that sits in front of one or more RouterOS devices and turns
//! their raw API output into health reports a monitoring system can consume directly.
//!
//! ## Overview
//!
//! Every query opens a short-lived session against the RouterOS API (port 8728), runs one
//! print command and closes the session again. The raw rows are normalized: only the fields of
//! interest are kept, missing fields are backfilled with an empty string, and kebab-case keys
//! become camelCase. On top of that the service computes:
//!
//! - **Firmware health**: the running firmware compared against a configured baseline.
//! - **Capabilities**: DHCP leases grouped by address range into named device classes
//!   (`TCE`, `PWR`, ...). A capability is healthy when every lease in it is bound.
//! - **Aggregates**: identity, firmware, capabilities, leases and netwatch in one response.
//!
//! Alongside the query API, a background job exports the configuration of the managed router
//! over ssh on a fixed interval and writes it to the backup directory. Backups can also be
//! triggered on demand; a guard makes sure only one export runs at a time.
//!
//! ## Architecture
//!
//! The **API layer** ([`api`]) holds the axum handlers and their request models. Handlers
//! resolve the target host and delegate to [`query::RouterQueries`] or
//! [`backup::BackupCoordinator`].
//!
//! The **transport layer** is split in two seams: [`device::DeviceConnector`] opens RouterOS API
//! sessions and [`remote::RemoteExec`] runs commands over ssh. Production code uses
//! [`device::routeros::RouterOsConnector`] and [`remote::SshExec`]; tests substitute in-memory
//! fakes.
//!
//! **Background services** ([`BackgroundServices`]) own the backup scheduler and the shutdown
//! token that stops it.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use mtquery::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = mtquery::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     mtquery::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod backup;
pub mod capability;
pub mod config;
pub mod device;
pub mod errors;
pub mod normalize;
mod openapi;
pub mod query;
pub mod remote;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};
use bon::Builder;
pub use config::Config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::{CancellationToken, DropGuard};
use tower::ServiceBuilder;
use tower_http::{
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::backup::{BackupCoordinator, BackupScheduler};
use crate::device::{DeviceConnector, routeros::RouterOsConnector};
use crate::openapi::ApiDoc;
use crate::query::RouterQueries;
use crate::remote::{RemoteExec, SshExec};

/// Application state shared across all request handlers.
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .queries(queries)
///     .backups(coordinator)
///     .scheduler(scheduler)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub queries: Arc<RouterQueries>,
    pub backups: Arc<BackupCoordinator>,
    pub scheduler: BackupScheduler,
}

/// Build the application router with every route, the docs and the tracing layer.
pub fn build_router(state: &AppState) -> Router {
    let v2_routes = Router::new()
        .route("/aggregate", get(api::handlers::routers::get_aggregate))
        .route("/capability", get(api::handlers::routers::get_capability))
        .route("/identity", get(api::handlers::routers::get_identity))
        .route("/firmware", get(api::handlers::routers::get_firmware))
        .route("/leases", get(api::handlers::routers::get_leases))
        .route("/netwatch", get(api::handlers::routers::get_netwatch))
        .route(
            "/backups",
            post(api::handlers::backups::trigger_backup).get(api::handlers::backups::get_backup_info),
        );

    // Selection variants that take a capability list in the body
    let v1_routes = Router::new()
        .route("/capability", post(api::handlers::routers::select_capability))
        .route("/aggregate", post(api::handlers::routers::select_aggregate));

    Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api/v2", v2_routes)
        .nest("/api/v1", v1_routes)
        .with_state(state.clone())
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .route("/api-docs/openapi.json", get(|| async { axum::Json(ApiDoc::openapi()) }))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_request(DefaultOnRequest::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    state.config.request_timeout,
                )),
        )
}

/// Container for background services and their lifecycle management.
///
/// Holds the backup scheduler and the token its jobs watch. When dropped, the `drop_guard`
/// cancels the token so no job outlives the application.
pub struct BackgroundServices {
    scheduler: BackupScheduler,
    shutdown_token: CancellationToken,
    // Pub so that we can disarm it if we want to
    pub drop_guard: Option<DropGuard>,
}

impl BackgroundServices {
    /// Gracefully shutdown all background tasks
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();
        self.scheduler.join_all().await;
    }
}

/// Main application struct that owns the router and the background services.
///
/// 1. **Create**: [`Application::new`] builds the transports, the query layer and the backup
///    coordinator, and schedules the recurring backup
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: When the shutdown signal is received, stops the backup job and telemetry
pub struct Application {
    router: Router,
    config: Config,
    bg_services: BackgroundServices,
}

impl Application {
    /// Create a new application talking to real routers
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let connector = Arc::new(RouterOsConnector::new(&config.router));
        let remote = Arc::new(SshExec::new(&config.router));
        Self::with_transports(config, connector, remote).await
    }

    /// Create an application on top of the given transports
    pub async fn with_transports(
        config: Config,
        connector: Arc<dyn DeviceConnector>,
        remote: Arc<dyn RemoteExec>,
    ) -> anyhow::Result<Self> {
        debug!("Starting mtquery with configuration: {:#?}", config);

        let queries = Arc::new(RouterQueries::new(
            connector,
            config.capabilities.clone(),
            config.firmware_baseline.clone(),
        ));
        let backups = Arc::new(BackupCoordinator::new(&config.router, &config.backup, remote));

        let shutdown_token = CancellationToken::new();
        let drop_guard = shutdown_token.clone().drop_guard();
        let scheduler = BackupScheduler::new();

        if config.backup.enabled {
            let id = scheduler.schedule(backups.clone(), shutdown_token.clone()).await;
            info!(
                "Scheduled backup job {} for {} every {:?}",
                id,
                backups.host(),
                backups.interval()
            );
        } else {
            info!("Scheduled backups are disabled");
        }

        let app_state = AppState::builder()
            .config(config.clone())
            .queries(queries)
            .backups(backups)
            .scheduler(scheduler.clone())
            .build();

        let router = build_router(&app_state);

        Ok(Self {
            router,
            config,
            bg_services: BackgroundServices {
                scheduler,
                shutdown_token,
                drop_guard: Some(drop_guard),
            },
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> (axum_test::TestServer, BackgroundServices) {
        let server = axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server");
        (server, self.bg_services)
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "mtquery listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Stopping backup jobs...");
        self.bg_services.shutdown().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
