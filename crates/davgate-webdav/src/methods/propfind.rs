//! PROPFIND method (RFC 4918 Section 9.1).

use axum::body::Body;
use http::{HeaderMap, Response, StatusCode};

use davgate_core::result::AppResult;

use super::{child_path, header_str, read_body};
use crate::engine::DavEngine;
use crate::properties::{Depth, PropfindRequest, build_multistatus_xml};
use crate::response::xml;

/// Handle a PROPFIND request
pub async fn handle_propfind(
    engine: &DavEngine,
    path: &str,
    headers: &HeaderMap,
    body: Body,
) -> AppResult<Response<Body>> {
    let depth = Depth::from_header(header_str(headers, "Depth"))?;
    let body = read_body(body).await?;
    let request = PropfindRequest::parse(&body)?;

    let meta = engine.filesystem().stat(path).await?;
    let is_dir = meta.is_dir;
    let mut resources = vec![engine.resource(path, meta)];

    if is_dir && depth != Depth::Zero {
        let mut pending = vec![path.to_string()];
        while let Some(dir) = pending.pop() {
            for entry in engine.filesystem().read_dir(&dir).await? {
                let child = child_path(&dir, &entry.name);
                if entry.meta.is_dir && depth == Depth::Infinity {
                    pending.push(child.clone());
                }
                resources.push(engine.resource(&child, entry.meta));
            }
        }
    }

    tracing::debug!(path, ?depth, resources = resources.len(), "PROPFIND");

    Ok(xml(
        StatusCode::MULTI_STATUS,
        build_multistatus_xml(&resources, &request, engine.prefix()),
    ))
}
