//! MKCOL method (RFC 4918 Section 9.3).

use axum::body::Body;
use http::{HeaderMap, Response, StatusCode};

use davgate_core::result::AppResult;

use super::{ensure_parent, if_tokens, read_body};
use crate::engine::DavEngine;
use crate::response::{status, text};

/// Create a collection.
///
/// A request body is refused with 415 since no MKCOL extensions are
/// understood; an existing resource yields 405 and a missing parent 409.
pub async fn handle_mkcol(
    engine: &DavEngine,
    path: &str,
    headers: &HeaderMap,
    body: Body,
) -> AppResult<Response<Body>> {
    let body = read_body(body).await?;
    if !body.is_empty() {
        return Ok(text(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "MKCOL request bodies are not supported",
        ));
    }

    if engine.stat_opt(path).await?.is_some() {
        return Ok(text(
            StatusCode::METHOD_NOT_ALLOWED,
            "Resource already exists",
        ));
    }

    ensure_parent(engine, path).await?;
    engine.locks().confirm(path, false, &if_tokens(headers))?;
    engine.filesystem().create_dir(path).await?;

    tracing::info!(path, "collection created via WebDAV");
    Ok(status(StatusCode::CREATED))
}
