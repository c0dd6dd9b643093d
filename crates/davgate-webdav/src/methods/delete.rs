//! DELETE method (RFC 4918 Section 9.6).

use axum::body::Body;
use http::{HeaderMap, Response, StatusCode};

use davgate_core::error::AppError;
use davgate_core::result::AppResult;

use super::if_tokens;
use crate::engine::DavEngine;
use crate::response::status;

/// Remove a file or a collection with all its members.
pub async fn handle_delete(
    engine: &DavEngine,
    path: &str,
    headers: &HeaderMap,
) -> AppResult<Response<Body>> {
    if path == "/" {
        return Err(AppError::authorization("cannot delete the root collection"));
    }

    engine.filesystem().stat(path).await?;
    engine.locks().confirm(path, true, &if_tokens(headers))?;
    engine.filesystem().remove(path).await?;
    engine.locks().remove_under(path);

    tracing::info!(path, "deleted via WebDAV");
    Ok(status(StatusCode::NO_CONTENT))
}
