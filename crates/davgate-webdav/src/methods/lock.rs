//! LOCK and UNLOCK method implementations (RFC 4918 Section 9.10/9.11).
//!
//! Locks live in the engine's in-memory lock table. Locking a missing
//! resource creates it as an empty file.

use std::time::Duration;

use axum::body::Body;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, Response, StatusCode};

use davgate_core::error::AppError;
use davgate_core::result::AppResult;

use super::{ensure_parent, header_str, if_tokens, read_body};
use crate::engine::DavEngine;
use crate::fs::ByteStream;
use crate::lock::{DEFAULT_TIMEOUT, LockRequest, LockScope, MAX_TIMEOUT};
use crate::properties::{Depth, build_lockdiscovery_xml, parse_elements, walk};
use crate::response::{set_header, status, xml};

const LOCK_TOKEN: HeaderName = HeaderName::from_static("lock-token");

/// Parsed `DAV:lockinfo` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockBody {
    pub scope: LockScope,
    pub owner: Option<String>,
}

impl LockBody {
    /// Parse a `DAV:lockinfo` document.
    pub fn parse(body: &[u8]) -> AppResult<Self> {
        let elements = parse_elements(body)?;
        match elements.first() {
            Some(root) if root.name.is_dav("lockinfo") => {}
            _ => return Err(AppError::validation("expected a DAV:lockinfo element")),
        }

        let mut scope = None;
        let mut owner: Option<String> = None;
        walk(&elements, |ancestors, element| {
            if ancestors.len() == 2 && ancestors[1].is_dav("lockscope") {
                if element.name.is_dav("exclusive") {
                    scope = Some(LockScope::Exclusive);
                } else if element.name.is_dav("shared") {
                    scope = Some(LockScope::Shared);
                }
            }
            let in_owner = (ancestors.len() == 1 && element.name.is_dav("owner"))
                || (ancestors.len() > 1 && ancestors[1].is_dav("owner"));
            if in_owner {
                let text = owner.get_or_insert_with(String::new);
                text.push_str(&element.text);
            }
        });

        let scope = scope.ok_or_else(|| AppError::validation("lockinfo without lockscope"))?;
        Ok(Self {
            scope,
            owner: owner.filter(|o| !o.is_empty()),
        })
    }
}

/// Parse a `Timeout` header. Only the first alternative is honoured;
/// anything unrecognized gets the default timeout and oversized values are
/// clamped to [`MAX_TIMEOUT`].
pub fn parse_timeout(value: Option<&str>) -> Option<Duration> {
    let Some(first) = value.and_then(|v| v.split(',').next()).map(str::trim) else {
        return Some(DEFAULT_TIMEOUT);
    };
    if first.eq_ignore_ascii_case("Infinite") {
        return None;
    }
    first
        .strip_prefix("Second-")
        .and_then(|secs| secs.parse::<u64>().ok())
        .map(|secs| Duration::from_secs(secs).min(MAX_TIMEOUT))
        .or(Some(DEFAULT_TIMEOUT))
}

fn empty_body() -> ByteStream {
    Box::pin(futures::stream::empty::<Result<Bytes, std::io::Error>>())
}

/// Handle a LOCK request: a new lock, or a refresh when the body is empty.
pub async fn handle_lock(
    engine: &DavEngine,
    path: &str,
    headers: &HeaderMap,
    body: Body,
) -> AppResult<Response<Body>> {
    let timeout = parse_timeout(header_str(headers, "Timeout"));
    let body = read_body(body).await?;

    if body.iter().all(u8::is_ascii_whitespace) {
        let tokens = if_tokens(headers);
        let token = tokens
            .first()
            .ok_or_else(|| AppError::validation("lock refresh requires an If header"))?;
        let lock = engine.locks().refresh(path, token, timeout)?;
        tracing::debug!(path, token = %lock.token, "lock refreshed");
        return Ok(xml(
            StatusCode::OK,
            build_lockdiscovery_xml(&lock, engine.prefix()),
        ));
    }

    let request = LockBody::parse(&body)?;
    let depth_infinity = match Depth::from_header(header_str(headers, "Depth"))? {
        Depth::Zero => false,
        Depth::Infinity => true,
        Depth::One => return Err(AppError::validation("LOCK supports Depth 0 or infinity")),
    };

    let created = match engine.stat_opt(path).await? {
        Some(_) => false,
        None => {
            ensure_parent(engine, path).await?;
            true
        }
    };

    let lock = engine.locks().create(LockRequest {
        root: path.to_string(),
        scope: request.scope,
        depth_infinity,
        owner: request.owner,
        timeout,
    })?;

    if created {
        if let Err(e) = engine.filesystem().write(path, empty_body()).await {
            let _ = engine.locks().unlock(path, &lock.token);
            return Err(e);
        }
    }

    tracing::info!(path, token = %lock.token, scope = lock.scope.as_str(), "locked via WebDAV");

    let mut resp = xml(
        if created {
            StatusCode::CREATED
        } else {
            StatusCode::OK
        },
        build_lockdiscovery_xml(&lock, engine.prefix()),
    );
    set_header(&mut resp, LOCK_TOKEN, &format!("<{}>", lock.token));
    Ok(resp)
}

/// Handle an UNLOCK request
pub async fn handle_unlock(
    engine: &DavEngine,
    path: &str,
    headers: &HeaderMap,
) -> AppResult<Response<Body>> {
    let token = header_str(headers, "Lock-Token")
        .map(|v| v.trim().trim_start_matches('<').trim_end_matches('>'))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::validation("missing Lock-Token header"))?;

    engine.locks().unlock(path, token)?;

    tracing::info!(path, "unlocked via WebDAV");
    Ok(status(StatusCode::NO_CONTENT))
}
