//! CORS layer configuration.

use std::time::Duration;

use http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};

use davgate_core::config::CorsConfig;

fn is_wildcard(values: &[String]) -> bool {
    values.iter().any(|v| v == "*")
}

/// Builds a CORS tower layer from configuration.
///
/// With `credentials` enabled a wildcard cannot be sent back, so wildcard
/// origins, methods and headers mirror the request instead.
pub fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    let mut layer = CorsLayer::new();

    // Origins
    layer = if !is_wildcard(&config.allowed_origins) {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        layer.allow_origin(AllowOrigin::list(origins))
    } else if config.credentials {
        layer.allow_origin(AllowOrigin::mirror_request())
    } else {
        layer.allow_origin(Any)
    };

    // Methods
    layer = if !is_wildcard(&config.allowed_methods) {
        let methods: Vec<Method> = config
            .allowed_methods
            .iter()
            .filter_map(|m| m.parse().ok())
            .collect();
        layer.allow_methods(methods)
    } else if config.credentials {
        layer.allow_methods(AllowMethods::mirror_request())
    } else {
        layer.allow_methods(Any)
    };

    // Headers
    layer = if !is_wildcard(&config.allowed_headers) {
        let headers: Vec<HeaderName> = config
            .allowed_headers
            .iter()
            .filter_map(|h| h.parse().ok())
            .collect();
        layer.allow_headers(headers)
    } else if config.credentials {
        layer.allow_headers(AllowHeaders::mirror_request())
    } else {
        layer.allow_headers(Any)
    };

    let exposed: Vec<HeaderName> = config
        .exposed_headers
        .iter()
        .filter(|h| h.as_str() != "*")
        .filter_map(|h| h.parse().ok())
        .collect();
    if !exposed.is_empty() {
        layer = layer.expose_headers(exposed);
    }

    layer
        .allow_credentials(config.credentials)
        .max_age(Duration::from_secs(config.max_age_seconds))
}
