//! WebDAV protocol engine: routes one request to its method handler.

use std::sync::Arc;

use axum::body::Body;
use http::{Request, Response, StatusCode};

use davgate_core::result::AppResult;

use crate::fs::{FileSystem, Metadata};
use crate::lock::MemLockSystem;
use crate::methods;
use crate::path;
use crate::properties::DavResource;
use crate::response::{error_response, status, text};

/// Serves the WebDAV verbs for one filesystem under a URL prefix.
#[derive(Debug, Clone)]
pub struct DavEngine {
    /// Normalized prefix, `""` when mounted at the root.
    prefix: String,
    fs: Arc<dyn FileSystem>,
    locks: Arc<MemLockSystem>,
}

impl DavEngine {
    /// Create an engine with its own lock table.
    pub fn new(prefix: &str, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            prefix: path::normalize_prefix(prefix),
            fs,
            locks: Arc::new(MemLockSystem::new()),
        }
    }

    /// The normalized URL prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The filesystem being served.
    pub fn filesystem(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    /// The lock table.
    pub fn locks(&self) -> &MemLockSystem {
        &self.locks
    }

    /// Metadata for `path`, or `None` when it does not exist.
    pub async fn stat_opt(&self, path: &str) -> AppResult<Option<Metadata>> {
        match self.fs.stat(path).await {
            Ok(meta) => Ok(Some(meta)),
            Err(e) if e.is(davgate_core::ErrorKind::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Href of a resource path.
    pub fn href(&self, path: &str, is_dir: bool) -> String {
        path::href(&self.prefix, path, is_dir)
    }

    /// Content type reported for a file: the facade's choice, or a guess
    /// from the extension.
    pub fn content_type(&self, path: &str, meta: &Metadata) -> String {
        meta.content_type.clone().unwrap_or_else(|| {
            mime_guess::from_path(path)
                .first_or_octet_stream()
                .to_string()
        })
    }

    /// Describe a resource for PROPFIND.
    pub fn resource(&self, path: &str, meta: Metadata) -> DavResource {
        DavResource {
            href: self.href(path, meta.is_dir),
            display_name: methods::name_of(path).to_string(),
            content_type: self.content_type(path, &meta),
            locks: self.locks.discover(path),
            meta,
        }
    }

    /// Serve one request. Requests outside the prefix get 404.
    pub async fn serve(&self, req: Request<Body>) -> Response<Body> {
        let decoded = match path::decode_path(req.uri().path()) {
            Ok(p) => p,
            Err(e) => return error_response(&e),
        };
        let Some(resource) = path::strip_prefix(&self.prefix, &decoded) else {
            return status(StatusCode::NOT_FOUND);
        };

        let (parts, body) = req.into_parts();
        let headers = &parts.headers;
        let path = resource.as_str();
        tracing::debug!(method = %parts.method, path, "WebDAV request");

        let result = match parts.method.as_str() {
            "OPTIONS" => methods::handle_options(self, path).await,
            "GET" | "HEAD" | "POST" => methods::handle_get(self, path, headers).await,
            "PUT" => methods::handle_put(self, path, headers, body).await,
            "DELETE" => methods::handle_delete(self, path, headers).await,
            "MKCOL" => methods::handle_mkcol(self, path, headers, body).await,
            "COPY" => methods::handle_copy(self, path, headers).await,
            "MOVE" => methods::handle_move(self, path, headers).await,
            "PROPFIND" => methods::handle_propfind(self, path, headers, body).await,
            "PROPPATCH" => methods::handle_proppatch(self, path, headers, body).await,
            "LOCK" => methods::handle_lock(self, path, headers, body).await,
            "UNLOCK" => methods::handle_unlock(self, path, headers).await,
            other => Ok(text(
                StatusCode::METHOD_NOT_ALLOWED,
                format!("Method {other} not allowed"),
            )),
        };

        result.unwrap_or_else(|e| error_response(&e))
    }
}
