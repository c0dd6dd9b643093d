//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use http::{HeaderMap, Request, StatusCode};
use tempfile::TempDir;
use tower::ServiceExt;

use davgate_auth::permission::{Rule, RuleSet};
use davgate_auth::{CredentialStore, PasswordCredential, PasswordHasher, Tenant};
use davgate_core::config::{AppConfig, CorsConfig};
use davgate_webdav::Dispatcher;
use davgate_webdav::server::build_router;

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Holds every scope root for the lifetime of the test
    root: TempDir,
}

/// A configured test user.
pub struct TestUser<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub rules: Vec<Rule>,
}

impl TestApp {
    /// Single-tenant app serving one temporary directory.
    pub fn single(prefix: &str, no_sniff: bool, rules: Vec<Rule>) -> Self {
        let root = tempfile::tempdir().expect("Failed to create temp dir");
        let anonymous = Tenant::anonymous(root.path(), RuleSet::new(rules));
        let dispatcher = Dispatcher::new(prefix, no_sniff, anonymous, CredentialStore::empty())
            .expect("Failed to build dispatcher");
        Self::with_dispatcher(root, dispatcher)
    }

    /// Multi-tenant app; each user gets `<root>/<username>` as scope.
    pub fn multi(prefix: &str, users: Vec<TestUser<'_>>) -> Self {
        let root = tempfile::tempdir().expect("Failed to create temp dir");
        let hasher = PasswordHasher::new();

        let tenants = users
            .into_iter()
            .map(|user| {
                let scope = root.path().join(user.username);
                std::fs::create_dir_all(&scope).expect("Failed to create scope");
                let credential = PasswordCredential::resolve(user.password, &hasher)
                    .expect("Failed to hash password");
                Tenant::new(user.username, credential, scope, RuleSet::new(user.rules))
            })
            .collect::<Vec<_>>();

        let users = CredentialStore::new(tenants).expect("Failed to build credential store");
        let anonymous = Tenant::anonymous(root.path(), RuleSet::default());
        let dispatcher = Dispatcher::new(prefix, true, anonymous, users)
            .expect("Failed to build dispatcher");
        Self::with_dispatcher(root, dispatcher)
    }

    /// App built from a TOML configuration. `{root}` in the source is
    /// replaced with the temporary directory.
    pub fn from_toml(source: &str) -> Self {
        let root = tempfile::tempdir().expect("Failed to create temp dir");
        let source = source.replace("{root}", &root.path().display().to_string());
        let config = AppConfig::from_toml(&source).expect("Failed to parse config");
        for user in &config.users {
            if let Some(scope) = &user.scope {
                std::fs::create_dir_all(scope).expect("Failed to create scope");
            }
        }
        let dispatcher = Dispatcher::from_config(&config).expect("Failed to build dispatcher");
        Self::with_dispatcher(root, dispatcher)
    }

    fn with_dispatcher(root: TempDir, dispatcher: Dispatcher) -> Self {
        let router = build_router(Arc::new(dispatcher), &CorsConfig::default());
        Self { router, root }
    }

    /// Root of all scopes.
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Scope directory of a user created with [`TestApp::multi`].
    pub fn scope(&self, username: &str) -> PathBuf {
        self.root.path().join(username)
    }

    /// Make an HTTP request to the test app
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        headers: &[(&str, &str)],
        body: impl Into<Body>,
    ) -> TestResponse {
        let mut req = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        let req = req.body(body.into()).expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = axum::body::to_bytes(response.into_body(), 16 * 1024 * 1024)
            .await
            .expect("Failed to read body");

        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&body_bytes).into_owned(),
        }
    }

    /// Request with an empty body.
    pub async fn send(&self, method: &str, path: &str, headers: &[(&str, &str)]) -> TestResponse {
        self.request(method, path, headers, Body::empty()).await
    }
}

/// `Authorization` header value for HTTP Basic.
pub fn basic(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Body as text
    pub body: String,
}

impl TestResponse {
    /// A header as text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// A `DAV:lockinfo` body requesting an exclusive write lock.
pub const EXCLUSIVE_LOCKINFO: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:lockinfo xmlns:D="DAV:">
  <D:lockscope><D:exclusive/></D:lockscope>
  <D:locktype><D:write/></D:locktype>
  <D:owner>tester</D:owner>
</D:lockinfo>"#;
