//! In-memory WebDAV lock table (RFC 4918 Section 6).
//!
//! Locks are advisory state shared by one tenant's engine. They are held in
//! a [`DashMap`] keyed by token and expire lazily: every operation first
//! drops locks whose timeout has passed.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;

use davgate_core::error::AppError;
use davgate_core::result::AppResult;

/// Timeout applied when the client does not send one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3600);

/// Longest finite timeout granted; larger requests are clamped to it.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(u32::MAX as u64);

/// Lock scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockScope {
    /// Only one lock may cover the resource.
    Exclusive,
    /// Other shared locks may coexist.
    Shared,
}

impl LockScope {
    /// Element name in `DAV:` lockscope.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exclusive => "exclusive",
            Self::Shared => "shared",
        }
    }
}

/// Parameters of a new lock.
#[derive(Debug, Clone)]
pub struct LockRequest {
    /// Normalized path of the locked resource.
    pub root: String,
    pub scope: LockScope,
    /// Whether the lock extends to every descendant.
    pub depth_infinity: bool,
    /// Text of the client-supplied `DAV:owner`.
    pub owner: Option<String>,
    /// `None` means infinite.
    pub timeout: Option<Duration>,
}

/// An active lock.
#[derive(Debug, Clone)]
pub struct LockInfo {
    /// `opaquelocktoken:` URI.
    pub token: String,
    pub root: String,
    pub scope: LockScope,
    pub depth_infinity: bool,
    pub owner: Option<String>,
    pub timeout: Option<Duration>,
    expires_at: Option<Instant>,
}

impl LockInfo {
    /// Whether this lock applies to `path`.
    pub fn covers(&self, path: &str) -> bool {
        self.root == path || (self.depth_infinity && is_descendant(path, &self.root))
    }

    /// Time left before expiry; `None` for infinite locks.
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    fn expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Expiry instant for a timeout. A timeout too large to represent never
/// expires.
fn deadline(timeout: Option<Duration>) -> Option<Instant> {
    timeout.and_then(|t| Instant::now().checked_add(t))
}

/// Whether `path` lies strictly below `ancestor`. Both must be normalized.
pub fn is_descendant(path: &str, ancestor: &str) -> bool {
    if ancestor == "/" {
        return path != "/";
    }
    path.strip_prefix(ancestor)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Lock table of one tenant.
#[derive(Debug, Default)]
pub struct MemLockSystem {
    locks: DashMap<String, LockInfo>,
    /// Serializes grants so the conflict check and the insert are atomic.
    grant: Mutex<()>,
}

impl MemLockSystem {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    fn purge(&self) {
        let now = Instant::now();
        self.locks.retain(|_, lock| !lock.expired(now));
    }

    /// Grant a lock, or fail with `Locked` when it conflicts with an
    /// existing one.
    pub fn create(&self, request: LockRequest) -> AppResult<LockInfo> {
        let _grant = self.grant.lock().unwrap_or_else(|e| e.into_inner());
        self.purge();

        let conflict = self.locks.iter().any(|existing| {
            let overlaps = existing.covers(&request.root)
                || (request.depth_infinity && is_descendant(&existing.root, &request.root));
            overlaps
                && (existing.scope == LockScope::Exclusive
                    || request.scope == LockScope::Exclusive)
        });
        if conflict {
            return Err(AppError::locked(format!(
                "{} is already locked",
                request.root
            )));
        }

        let lock = LockInfo {
            token: format!("opaquelocktoken:{}", Uuid::new_v4()),
            root: request.root,
            scope: request.scope,
            depth_infinity: request.depth_infinity,
            owner: request.owner,
            timeout: request.timeout,
            expires_at: deadline(request.timeout),
        };
        self.locks.insert(lock.token.clone(), lock.clone());

        tracing::debug!(token = %lock.token, root = %lock.root, "lock granted");
        Ok(lock)
    }

    /// Extend the timeout of a lock covering `path`. Unknown tokens and
    /// locks on other resources fail the precondition and stay untouched.
    pub fn refresh(
        &self,
        path: &str,
        token: &str,
        timeout: Option<Duration>,
    ) -> AppResult<LockInfo> {
        self.purge();

        let mut lock = self
            .locks
            .get_mut(token)
            .ok_or_else(|| AppError::precondition_failed("unknown lock token"))?;
        if !lock.covers(path) {
            return Err(AppError::precondition_failed(
                "lock token does not cover this resource",
            ));
        }
        lock.timeout = timeout;
        lock.expires_at = deadline(timeout);
        Ok(lock.value().clone())
    }

    /// Release a lock. The token must name a lock covering `path`.
    pub fn unlock(&self, path: &str, token: &str) -> AppResult<()> {
        self.purge();

        let removed = self.locks.remove_if(token, |_, lock| lock.covers(path));
        match removed {
            Some(_) => {
                tracing::debug!(token, path, "lock released");
                Ok(())
            }
            None => Err(AppError::conflict("lock token does not match resource")),
        }
    }

    /// Active locks covering `path`.
    pub fn discover(&self, path: &str) -> Vec<LockInfo> {
        self.purge();
        self.locks
            .iter()
            .filter(|lock| lock.covers(path))
            .map(|lock| lock.value().clone())
            .collect()
    }

    /// Check that the caller may modify `path`.
    ///
    /// Every lock covering `path` (and, with `recursive`, every lock rooted
    /// below it) must be satisfied by one of `tokens`. A shared lock is
    /// satisfied by the token of any shared lock on the same resources.
    pub fn confirm(&self, path: &str, recursive: bool, tokens: &[String]) -> AppResult<()> {
        self.purge();

        let relevant: Vec<LockInfo> = self
            .locks
            .iter()
            .filter(|lock| lock.covers(path) || (recursive && is_descendant(&lock.root, path)))
            .map(|lock| lock.value().clone())
            .collect();

        let holds = |lock: &LockInfo| tokens.iter().any(|t| *t == lock.token);
        let holds_shared = relevant
            .iter()
            .any(|lock| lock.scope == LockScope::Shared && holds(lock));

        let unsatisfied = relevant.iter().any(|lock| match lock.scope {
            LockScope::Exclusive => !holds(lock),
            LockScope::Shared => !holds_shared,
        });

        if unsatisfied {
            Err(AppError::locked(format!("{path} is locked")))
        } else {
            Ok(())
        }
    }

    /// Drop every lock rooted at or below `path`, after the resource is
    /// deleted or moved away.
    pub fn remove_under(&self, path: &str) {
        self.locks
            .retain(|_, lock| lock.root != path && !is_descendant(&lock.root, path));
    }
}

/// Extract the state tokens from an `If` header.
///
/// Only the tokens in parenthesized lists are returned; resource tags and
/// entity tags are ignored.
pub fn if_header_tokens(value: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut in_list = false;
    let mut rest = value;

    while let Some(c) = rest.chars().next() {
        match c {
            '(' => in_list = true,
            ')' => in_list = false,
            '<' => {
                if let Some(end) = rest.find('>') {
                    if in_list {
                        tokens.push(rest[1..end].to_string());
                    }
                    rest = &rest[end + 1..];
                    continue;
                }
            }
            '[' => {
                if let Some(end) = rest.find(']') {
                    rest = &rest[end + 1..];
                    continue;
                }
            }
            _ => {}
        }
        rest = &rest[c.len_utf8()..];
    }

    tokens
}
