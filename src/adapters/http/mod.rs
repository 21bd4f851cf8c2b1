//! HTTP adapters - REST API over the consultation use cases.

pub mod consultation;

use std::time::Duration;

use axum::Router;
use http::{header, HeaderValue, Method};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::{CorsPolicy, ServerConfig};

pub use consultation::{consultation_router, ConsultationAppState};

/// Builds the complete application router with middleware applied.
///
/// Every request gets an `x-request-id`, a trace span and the configured
/// request timeout.
pub fn app_router(state: ConsultationAppState, server: &ServerConfig) -> Router {
    consultation_router().with_state(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(cors_layer(server))
            .layer(TimeoutLayer::new(server.request_timeout())),
    )
}

/// Explicit origins when configured; permissive outside production otherwise.
fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = match server.cors_policy() {
        CorsPolicy::AnyOrigin => return CorsLayer::permissive(),
        CorsPolicy::Origins(origins) => origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect(),
    };

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}
