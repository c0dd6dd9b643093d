//! Filesystem facade the protocol engine serves from.
//!
//! [`ScopedDir`] confines every operation to one directory tree and owns the
//! noSniff content-type policy.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncSeek, AsyncWriteExt};

use davgate_auth::permission::normalize_path;
use davgate_core::error::AppError;
use davgate_core::result::AppResult;

/// Content type reported for every file when noSniff is enabled.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Request body handed to [`FileSystem::write`].
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, io::Error>> + Send>>;

/// A readable, seekable file handle.
pub trait DavFile: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin> DavFile for T {}

/// Metadata of a file or collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Whether this is a collection.
    pub is_dir: bool,
    /// Size in bytes (0 for collections).
    pub len: u64,
    /// Last modification time.
    pub modified: DateTime<Utc>,
    /// Creation time, where the platform reports one.
    pub created: Option<DateTime<Utc>>,
    /// Content type decided by the facade. `None` leaves the choice to the
    /// protocol engine.
    pub content_type: Option<String>,
}

impl Metadata {
    /// Strong entity tag derived from modification time and size.
    pub fn etag(&self) -> String {
        let nanos = self.modified.timestamp_nanos_opt().unwrap_or_default();
        format!("\"{:x}{:x}\"", nanos, self.len)
    }
}

/// A collection member.
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// Member name (single path segment).
    pub name: String,
    /// Member metadata.
    pub meta: Metadata,
}

/// An opened file with the metadata observed at open time.
pub struct OpenFile {
    pub file: Box<dyn DavFile>,
    pub meta: Metadata,
}

impl fmt::Debug for OpenFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenFile").field("meta", &self.meta).finish()
    }
}

/// Storage operations the protocol engine needs.
///
/// Paths are slash-separated and relative to the filesystem root; callers
/// may pass unnormalized paths.
#[async_trait]
pub trait FileSystem: Send + Sync + fmt::Debug {
    /// Metadata for a path.
    async fn stat(&self, path: &str) -> AppResult<Metadata>;

    /// Members of a collection, sorted by name.
    async fn read_dir(&self, path: &str) -> AppResult<Vec<DirEntry>>;

    /// Open a file for reading.
    async fn open(&self, path: &str) -> AppResult<OpenFile>;

    /// Create or truncate a file and fill it from `body`. Returns the number
    /// of bytes written.
    async fn write(&self, path: &str, body: ByteStream) -> AppResult<u64>;

    /// Create a single collection. The parent must exist.
    async fn create_dir(&self, path: &str) -> AppResult<()>;

    /// Remove a file, or a collection with everything below it.
    async fn remove(&self, path: &str) -> AppResult<()>;

    /// Rename a file or collection.
    async fn rename(&self, from: &str, to: &str) -> AppResult<()>;

    /// Copy a single file.
    async fn copy_file(&self, from: &str, to: &str) -> AppResult<()>;
}

/// A directory tree on local disk.
///
/// Every path is normalized lexically before it touches the disk, so `..`
/// segments can never climb above the root.
#[derive(Debug, Clone)]
pub struct ScopedDir {
    root: PathBuf,
    no_sniff: bool,
}

impl ScopedDir {
    /// Serve `root`. With `no_sniff`, every file reports
    /// [`OCTET_STREAM`].
    pub fn new(root: impl Into<PathBuf>, no_sniff: bool) -> Self {
        Self {
            root: root.into(),
            no_sniff,
        }
    }

    /// The scope root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether noSniff is enabled.
    pub fn no_sniff(&self) -> bool {
        self.no_sniff
    }

    /// Map a request path onto the disk.
    ///
    /// Rejects NUL bytes and backslashes; clamps `..` at the root.
    pub fn resolve(&self, path: &str) -> AppResult<PathBuf> {
        if path.contains('\0') || path.contains('\\') {
            return Err(AppError::validation(format!("invalid path {path:?}")));
        }
        let normalized = normalize_path(path);
        let relative = normalized.trim_start_matches('/');
        if relative.is_empty() {
            Ok(self.root.clone())
        } else {
            Ok(self.root.join(relative))
        }
    }

    fn metadata(&self, meta: &std::fs::Metadata) -> Metadata {
        let is_dir = meta.is_dir();
        let content_type = (self.no_sniff && !is_dir).then(|| OCTET_STREAM.to_string());

        Metadata {
            is_dir,
            len: if is_dir { 0 } else { meta.len() },
            modified: meta.modified().map(to_utc).unwrap_or_else(|_| Utc::now()),
            created: meta.created().ok().map(to_utc),
            content_type,
        }
    }
}

fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

#[async_trait]
impl FileSystem for ScopedDir {
    async fn stat(&self, path: &str) -> AppResult<Metadata> {
        let full = self.resolve(path)?;
        let meta = fs::metadata(&full).await?;
        Ok(self.metadata(&meta))
    }

    async fn read_dir(&self, path: &str) -> AppResult<Vec<DirEntry>> {
        let full = self.resolve(path)?;
        let mut dir = fs::read_dir(&full).await?;
        let mut entries = Vec::new();

        while let Some(entry) = dir.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                tracing::warn!(path = %entry.path().display(), "skipping non UTF-8 file name");
                continue;
            };
            // Follows symlinks; dangling links are skipped.
            let meta = match fs::metadata(entry.path()).await {
                Ok(meta) => meta,
                Err(e) => {
                    tracing::debug!(path = %entry.path().display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            entries.push(DirEntry {
                meta: self.metadata(&meta),
                name,
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn open(&self, path: &str) -> AppResult<OpenFile> {
        let full = self.resolve(path)?;
        let file = fs::File::open(&full).await?;
        let meta = file.metadata().await?;
        Ok(OpenFile {
            meta: self.metadata(&meta),
            file: Box::new(file),
        })
    }

    async fn write(&self, path: &str, mut body: ByteStream) -> AppResult<u64> {
        let full = self.resolve(path)?;
        let mut file = fs::File::create(&full).await?;
        let mut written = 0u64;

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }

    async fn create_dir(&self, path: &str) -> AppResult<()> {
        let full = self.resolve(path)?;
        fs::create_dir(&full).await?;
        Ok(())
    }

    async fn remove(&self, path: &str) -> AppResult<()> {
        let full = self.resolve(path)?;
        if full == self.root {
            return Err(AppError::authorization("cannot remove the scope root"));
        }
        let meta = fs::metadata(&full).await?;
        if meta.is_dir() {
            fs::remove_dir_all(&full).await?;
        } else {
            fs::remove_file(&full).await?;
        }
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> AppResult<()> {
        let from = self.resolve(from)?;
        let to = self.resolve(to)?;
        fs::rename(&from, &to).await?;
        Ok(())
    }

    async fn copy_file(&self, from: &str, to: &str) -> AppResult<()> {
        let from = self.resolve(from)?;
        let to = self.resolve(to)?;
        fs::copy(&from, &to).await?;
        Ok(())
    }
}
