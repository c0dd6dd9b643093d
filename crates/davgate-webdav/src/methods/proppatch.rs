//! PROPPATCH method (RFC 4918 Section 9.2).
//!
//! Dead properties are not stored, so every requested change is refused
//! with 403 inside the multistatus.

use axum::body::Body;
use http::{HeaderMap, Response, StatusCode};

use davgate_core::result::AppResult;

use super::{if_tokens, read_body};
use crate::engine::DavEngine;
use crate::properties::{build_proppatch_xml, parse_proppatch};
use crate::response::xml;

/// Handle a PROPPATCH request
pub async fn handle_proppatch(
    engine: &DavEngine,
    path: &str,
    headers: &HeaderMap,
    body: Body,
) -> AppResult<Response<Body>> {
    let meta = engine.filesystem().stat(path).await?;
    engine.locks().confirm(path, false, &if_tokens(headers))?;

    let body = read_body(body).await?;
    let names = parse_proppatch(&body)?;
    tracing::debug!(path, properties = names.len(), "PROPPATCH refused");

    Ok(xml(
        StatusCode::MULTI_STATUS,
        build_proppatch_xml(&engine.href(path, meta.is_dir), &names),
    ))
}
