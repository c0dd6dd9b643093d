//! Response construction shared by the engine and the dispatcher.

use axum::body::Body;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderName};
use http::{HeaderValue, Response, StatusCode};

use davgate_core::error::{AppError, ErrorKind};

/// An empty response with the given status.
pub fn status(code: StatusCode) -> Response<Body> {
    let mut resp = Response::new(Body::empty());
    *resp.status_mut() = code;
    resp
}

/// A plain-text response.
pub fn text(code: StatusCode, body: impl Into<String>) -> Response<Body> {
    let body = body.into();
    let mut resp = Response::new(Body::from(body));
    *resp.status_mut() = code;
    resp.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    resp
}

/// An XML response.
pub fn xml(code: StatusCode, body: String) -> Response<Body> {
    let len = body.len();
    let mut resp = Response::new(Body::from(body));
    *resp.status_mut() = code;
    resp.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/xml; charset=utf-8"),
    );
    resp.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from(len));
    resp
}

/// Set a header, skipping values that are not valid header text.
pub fn set_header(resp: &mut Response<Body>, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            resp.headers_mut().insert(name, value);
        }
        Err(_) => tracing::warn!(header = %name, "dropping invalid header value"),
    }
}

/// HTTP status for an error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Locked => StatusCode::LOCKED,
        ErrorKind::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
        ErrorKind::BadGateway => StatusCode::BAD_GATEWAY,
        ErrorKind::Internal | ErrorKind::Storage | ErrorKind::Configuration => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Map an application error to its HTTP response. The body is the
/// canonical reason phrase; details stay in the log.
pub fn error_response(err: &AppError) -> Response<Body> {
    let code = status_for(err.kind);
    if code.is_server_error() {
        tracing::error!(error = %err, "WebDAV request failed");
    } else {
        tracing::debug!(error = %err, status = code.as_u16(), "WebDAV request rejected");
    }
    text(code, code.canonical_reason().unwrap_or_default())
}

/// Wraps the response to a HEAD request: status and headers pass through
/// untouched, the body is dropped.
#[derive(Debug)]
pub struct HeadResponse(Response<Body>);

impl HeadResponse {
    /// Wrap a response produced for a HEAD request.
    pub fn new(inner: Response<Body>) -> Self {
        Self(inner)
    }

    /// The response with an empty body.
    pub fn into_response(self) -> Response<Body> {
        let (parts, _body) = self.0.into_parts();
        Response::from_parts(parts, Body::empty())
    }
}
