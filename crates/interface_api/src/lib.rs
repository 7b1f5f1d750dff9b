//! HTTP API Layer
//!
//! The REST surface of the billing ledger, built on Axum.
//!
//! # Architecture
//!
//! - **Handlers**: one module per resource, delegating to the domain
//!   services held in [`AppState`]
//! - **Middleware**: bearer-token authentication and audit logging
//! - **DTOs**: camelCase wire shapes with the `{status, data, message}`
//!   envelope
//! - **Error handling**: one mapping from the domain taxonomy to HTTP
//!
//! Service handles are injected through [`AppState`] with an explicit
//! lifecycle — constructed at startup, dropped at shutdown — rather than
//! through process-global singletons.

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use domain_billing::{BillLedger, PaymentRecorder, StatisticsAggregator};

use crate::config::ApiConfig;
use crate::handlers::{billing, health};
use crate::middleware::{audit_middleware, auth_middleware};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub ledger: BillLedger,
    pub recorder: PaymentRecorder,
    pub stats: StatisticsAggregator,
    pub config: ApiConfig,
}

impl AppState {
    pub fn new(
        ledger: BillLedger,
        recorder: PaymentRecorder,
        stats: StatisticsAggregator,
        config: ApiConfig,
    ) -> Self {
        Self {
            ledger,
            recorder,
            stats,
            config,
        }
    }
}

/// Creates the API router
///
/// Health probes are public; everything under `/billing` requires a valid
/// bearer token, with per-route role gates inside the handlers.
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let billing_routes = Router::new()
        .route("/", post(billing::create_bill).get(billing::list_bills))
        .route("/statistics", get(billing::billing_statistics))
        .route("/patient/:patient_id", get(billing::patient_bills))
        .route(
            "/:id",
            get(billing::get_bill)
                .patch(billing::update_bill)
                .delete(billing::delete_bill),
        )
        .route(
            "/:id/payments",
            get(billing::bill_payments).post(billing::record_payment),
        )
        .route("/:id/invoice", get(billing::invoice))
        .route("/:id/reconcile", post(billing::reconcile));

    let protected = Router::new()
        .nest("/billing", billing_routes)
        .layer(axum_middleware::from_fn(audit_middleware))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
