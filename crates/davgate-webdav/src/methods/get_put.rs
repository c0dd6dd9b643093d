//! GET, HEAD and PUT method implementations.

use std::io::{self, SeekFrom};

use axum::body::Body;
use futures::StreamExt;
use http::header::{
    ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG, LAST_MODIFIED,
};
use http::{HeaderMap, HeaderValue, Response, StatusCode};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use davgate_core::result::AppResult;

use super::{ensure_parent, header_str, if_tokens};
use crate::engine::DavEngine;
use crate::fs::ByteStream;
use crate::properties::format_http_date;
use crate::response::{set_header, status, text};

/// Outcome of evaluating a `Range` header against a file length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// Serve the whole file.
    Full,
    /// Serve `start..=end`.
    Partial(u64, u64),
    /// Answer 416.
    Unsatisfiable,
}

/// Evaluate a `Range` header. Malformed or multi-range requests fall back
/// to the full representation.
pub fn parse_range(value: &str, len: u64) -> ByteRange {
    let Some(ranges) = value.trim().strip_prefix("bytes=") else {
        return ByteRange::Full;
    };
    if ranges.contains(',') {
        return ByteRange::Full;
    }
    let Some((start, end)) = ranges.split_once('-') else {
        return ByteRange::Full;
    };
    let (start, end) = (start.trim(), end.trim());

    if start.is_empty() {
        let Ok(suffix) = end.parse::<u64>() else {
            return ByteRange::Full;
        };
        if suffix == 0 || len == 0 {
            return ByteRange::Unsatisfiable;
        }
        return ByteRange::Partial(len - suffix.min(len), len - 1);
    }

    let Ok(start) = start.parse::<u64>() else {
        return ByteRange::Full;
    };
    if start >= len {
        return ByteRange::Unsatisfiable;
    }
    let end = if end.is_empty() {
        len - 1
    } else {
        match end.parse::<u64>() {
            Ok(end) if end >= start => end.min(len - 1),
            _ => return ByteRange::Full,
        }
    };
    ByteRange::Partial(start, end)
}

fn etag_matches(header: &str, etag: &str) -> bool {
    header.split(',').map(str::trim).any(|candidate| {
        candidate == "*" || candidate == etag || candidate.strip_prefix("W/") == Some(etag)
    })
}

/// Handle GET and HEAD. The body is streamed from disk; HEAD callers drop
/// it before it is polled.
pub async fn handle_get(
    engine: &DavEngine,
    path: &str,
    headers: &HeaderMap,
) -> AppResult<Response<Body>> {
    let meta = engine.filesystem().stat(path).await?;
    if meta.is_dir {
        return Ok(text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed"));
    }

    let opened = engine.filesystem().open(path).await?;
    let meta = opened.meta;
    let mut file = opened.file;
    let etag = meta.etag();
    let content_type = engine.content_type(path, &meta);
    let last_modified = format_http_date(&meta.modified);

    if header_str(headers, "If-None-Match").is_some_and(|v| etag_matches(v, &etag)) {
        let mut resp = status(StatusCode::NOT_MODIFIED);
        set_header(&mut resp, ETAG, &etag);
        set_header(&mut resp, LAST_MODIFIED, &last_modified);
        return Ok(resp);
    }

    let range = header_str(headers, "Range")
        .map(|v| parse_range(v, meta.len))
        .unwrap_or(ByteRange::Full);

    let mut resp = match range {
        ByteRange::Unsatisfiable => {
            let mut resp = status(StatusCode::RANGE_NOT_SATISFIABLE);
            set_header(&mut resp, CONTENT_RANGE, &format!("bytes */{}", meta.len));
            return Ok(resp);
        }
        ByteRange::Partial(start, end) => {
            let len = end - start + 1;
            file.seek(SeekFrom::Start(start)).await?;
            let stream = ReaderStream::new(file.take(len));
            let mut resp = Response::new(Body::from_stream(stream));
            *resp.status_mut() = StatusCode::PARTIAL_CONTENT;
            set_header(
                &mut resp,
                CONTENT_RANGE,
                &format!("bytes {start}-{end}/{}", meta.len),
            );
            resp.headers_mut()
                .insert(CONTENT_LENGTH, HeaderValue::from(len));
            resp
        }
        ByteRange::Full => {
            let stream = ReaderStream::new(file);
            let mut resp = Response::new(Body::from_stream(stream));
            resp.headers_mut()
                .insert(CONTENT_LENGTH, HeaderValue::from(meta.len));
            resp
        }
    };

    set_header(&mut resp, CONTENT_TYPE, &content_type);
    set_header(&mut resp, ETAG, &etag);
    set_header(&mut resp, LAST_MODIFIED, &last_modified);
    resp.headers_mut()
        .insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    Ok(resp)
}

/// Handle a PUT request: create or replace a file.
pub async fn handle_put(
    engine: &DavEngine,
    path: &str,
    headers: &HeaderMap,
    body: Body,
) -> AppResult<Response<Body>> {
    let existing = engine.stat_opt(path).await?;
    if existing.as_ref().is_some_and(|meta| meta.is_dir) {
        return Ok(text(
            StatusCode::METHOD_NOT_ALLOWED,
            "Cannot PUT to a collection",
        ));
    }

    ensure_parent(engine, path).await?;
    engine.locks().confirm(path, false, &if_tokens(headers))?;

    let stream: ByteStream = Box::pin(
        body.into_data_stream()
            .map(|chunk| chunk.map_err(io::Error::other)),
    );
    let written = engine.filesystem().write(path, stream).await?;
    tracing::info!(path, bytes = written, "uploaded via WebDAV");

    let meta = engine.filesystem().stat(path).await?;
    let mut resp = status(if existing.is_some() {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::CREATED
    });
    set_header(&mut resp, ETAG, &meta.etag());
    Ok(resp)
}
