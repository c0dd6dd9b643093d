//! WebDAV Basic authentication responses.

use axum::body::Body;
use http::header::{CONTENT_TYPE, WWW_AUTHENTICATE};
use http::{HeaderValue, Response, StatusCode};

/// Realm advertised in the Basic challenge.
pub const REALM: &str = "Restricted";

/// Body of every 401 response.
pub const UNAUTHORIZED_BODY: &str = "Not authorized";

/// Build a 401 response with WWW-Authenticate header.
///
/// Every authentication failure produces this exact response, whatever
/// its cause.
pub fn unauthorized_response() -> Response<Body> {
    let mut resp = Response::new(Body::from(UNAUTHORIZED_BODY));
    *resp.status_mut() = StatusCode::UNAUTHORIZED;
    let headers = resp.headers_mut();
    headers.insert(
        WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"Restricted\""),
    );
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    resp
}

/// Build the 403 response for denied requests: status only, empty body.
pub fn forbidden_response() -> Response<Body> {
    let mut resp = Response::new(Body::empty());
    *resp.status_mut() = StatusCode::FORBIDDEN;
    resp
}
