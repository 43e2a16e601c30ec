//! Thin outward HTTP surface (spec.md §6). A demonstration front-end over
//! [`crate::facade::Platform`] — not the main deliverable, but shaped
//! exactly as the spec's table describes so the control plane's contracts
//! can be exercised over JSON.

pub mod dto;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::facade::Platform;

pub fn router(platform: Arc<Platform>) -> Router {
    Router::new()
        .route("/api/defaults", get(handlers::get_defaults).put(handlers::update_defaults))
        .route("/api/tenants", get(handlers::list_tenants).post(handlers::create_tenant))
        .route(
            "/api/tenants/{id}",
            get(handlers::get_tenant).put(handlers::update_tenant).delete(handlers::delete_tenant),
        )
        .route(
            "/api/tenants/{id}/workers",
            get(handlers::list_workers).post(handlers::create_worker),
        )
        .route(
            "/api/tenants/{id}/workers/{wid}",
            get(handlers::get_worker).put(handlers::update_worker).delete(handlers::delete_worker),
        )
        .route("/api/tenants/{id}/workers/{wid}/hostnames", post(handlers::add_hostnames).delete(handlers::remove_hostnames))
        .route("/api/tenants/{id}/workers/{wid}/fetch", post(handlers::dispatch_fetch))
        .route("/api/run", post(handlers::run_ephemeral))
        .route(
            "/api/templates",
            get(handlers::list_templates).post(handlers::create_template),
        )
        .route(
            "/api/templates/{id}",
            get(handlers::get_template).put(handlers::update_template).delete(handlers::delete_template),
        )
        .route("/api/templates/{id}/generate", post(handlers::generate_template))
        .route(
            "/api/tenants/{id}/templates/{tid}/workers",
            post(handlers::create_worker_from_template),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(platform)
}

// Intentionally no routes for /api/outbound-workers or /api/tail-workers:
// the core has no dedicated store for these (spec §9 treats them as
// opaque pass-through references attached to tenant/worker config, not
// first-class records), so there is nothing to CRUD independently of
// `PATCH .../defaults|tenants|workers` on the `tails`/`outbound` fields.
