//! OPTIONS method (RFC 4918 Section 9.1 / RFC 7231 Section 4.3.7).

use axum::body::Body;
use http::header::{ALLOW, CONTENT_LENGTH};
use http::{HeaderValue, Response, StatusCode};

use davgate_core::result::AppResult;

use crate::engine::DavEngine;
use crate::response::status;

const ALLOW_MISSING: &str = "OPTIONS, LOCK, PUT, MKCOL";
const ALLOW_COLLECTION: &str =
    "OPTIONS, LOCK, DELETE, PROPPATCH, COPY, MOVE, UNLOCK, PROPFIND, GET, HEAD";
const ALLOW_FILE: &str =
    "OPTIONS, LOCK, GET, HEAD, POST, DELETE, PROPPATCH, COPY, MOVE, UNLOCK, PROPFIND, PUT";

/// Advertise the methods applicable to `path` and the DAV compliance
/// classes.
pub async fn handle_options(engine: &DavEngine, path: &str) -> AppResult<Response<Body>> {
    let allow = match engine.stat_opt(path).await? {
        None => ALLOW_MISSING,
        Some(meta) if meta.is_dir => ALLOW_COLLECTION,
        Some(_) => ALLOW_FILE,
    };

    let mut resp = status(StatusCode::OK);
    let headers = resp.headers_mut();
    headers.insert(ALLOW, HeaderValue::from_static(allow));
    headers.insert("dav", HeaderValue::from_static("1, 2"));
    headers.insert("ms-author-via", HeaderValue::from_static("DAV"));
    headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
    Ok(resp)
}
