//! WebDAV method implementations.

pub mod copy_move;
pub mod delete;
pub mod get_put;
pub mod lock;
pub mod mkcol;
pub mod options;
pub mod propfind;
pub mod proppatch;

pub use copy_move::{handle_copy, handle_move};
pub use delete::handle_delete;
pub use get_put::{handle_get, handle_put};
pub use lock::{handle_lock, handle_unlock};
pub use mkcol::handle_mkcol;
pub use options::handle_options;
pub use propfind::handle_propfind;
pub use proppatch::handle_proppatch;

use axum::body::Body;
use bytes::Bytes;
use http::HeaderMap;

use davgate_core::error::AppError;
use davgate_core::result::AppResult;

use crate::engine::DavEngine;
use crate::lock::if_header_tokens;

/// Largest XML request body accepted.
pub const MAX_XML_BODY: usize = 1024 * 1024;

/// Read a (small) request body into memory.
pub(crate) async fn read_body(body: Body) -> AppResult<Bytes> {
    axum::body::to_bytes(body, MAX_XML_BODY)
        .await
        .map_err(|e| AppError::validation(format!("failed to read request body: {e}")))
}

/// A header as text; non-UTF-8 values are treated as absent.
pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Lock tokens submitted in the `If` header.
pub(crate) fn if_tokens(headers: &HeaderMap) -> Vec<String> {
    header_str(headers, "If")
        .map(if_header_tokens)
        .unwrap_or_default()
}

/// Parent of a normalized path; the root is its own parent.
pub(crate) fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

/// Last segment of a normalized path.
pub(crate) fn name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or_default()
}

/// Join a member name onto a normalized collection path.
pub(crate) fn child_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Fail with `Conflict` unless the parent collection of `path` exists.
pub(crate) async fn ensure_parent(engine: &DavEngine, path: &str) -> AppResult<()> {
    match engine.stat_opt(parent_of(path)).await? {
        Some(meta) if meta.is_dir => Ok(()),
        _ => Err(AppError::conflict(format!(
            "parent collection of {path} does not exist"
        ))),
    }
}
