//! Pharmacy Server - hospital pharmacy preparation service API
//!
//! This library provides the HTTP side of the service: the daily preparation
//! agenda, preparation requests, record reconciliation, the patient registry
//! and activity reports, all backed by PostgreSQL through `database-layer`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod repository;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use error::*;
pub use server::PharmacyServer;

use axum::{middleware::from_fn, Router};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Create the main application router with all routes and middleware
pub fn create_app(server: PharmacyServer) -> Router {
    let timeout = server.config.server.request_timeout();
    let cors = middleware::create_cors_layer(&server.config.server.cors_origins);

    routes::create_routes()
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(middleware::request_context_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(timeout))
                .layer(cors)
                .layer(from_fn(middleware::request_timing_middleware)),
        )
        .with_state(server)
}
