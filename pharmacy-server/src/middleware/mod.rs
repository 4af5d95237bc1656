//! Middleware modules for request processing

pub mod extractors;
pub mod request_context;

use axum::http::{header, HeaderName, HeaderValue, Method};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

// Re-export for convenience
pub use extractors::{OptionalJson, ValidatedJson, ValidatedQuery};
pub use request_context::{
    current_request_id, request_context_middleware, request_timing_middleware, REQUEST_ID_HEADER,
};

/// Create CORS layer for the application
///
/// An empty origin list allows any origin, which is what the bundled
/// browser UI needs when served from a different port in development.
pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, request_id.clone()])
        .expose_headers([request_id])
        .max_age(Duration::from_secs(3600))
}
