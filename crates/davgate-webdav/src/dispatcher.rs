//! Request dispatcher: the gate every WebDAV request passes through.
//!
//! The states run in a fixed order and each one may end the request:
//!
//! 1. tenant resolution (anonymous tenant when no users are configured)
//! 2. Basic authentication against the credential store
//! 3. authorization of method and path (and `Destination` for COPY/MOVE)
//! 4. method adaptation (GET on a collection becomes a Depth 1 PROPFIND,
//!    HEAD responses lose their body)
//! 5. delegation to the tenant's protocol engine

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use http::{HeaderMap, HeaderValue, Method, Request, Response};

use davgate_auth::permission::normalize_path;
use davgate_auth::{CredentialStore, Tenant, extract_basic_credentials};
use davgate_core::config::AppConfig;
use davgate_core::result::AppResult;

use crate::auth::{forbidden_response, unauthorized_response};
use crate::engine::DavEngine;
use crate::fs::ScopedDir;
use crate::path;
use crate::response::HeadResponse;

/// A tenant paired with the engine serving its scope.
#[derive(Debug)]
pub struct TenantHandler {
    tenant: Tenant,
    engine: DavEngine,
}

impl TenantHandler {
    /// Build the tenant's facade and engine.
    pub fn new(tenant: Tenant, prefix: &str, no_sniff: bool) -> Self {
        let fs = ScopedDir::new(tenant.scope_root(), no_sniff);
        Self {
            engine: DavEngine::new(prefix, Arc::new(fs)),
            tenant,
        }
    }

    pub fn tenant(&self) -> &Tenant {
        &self.tenant
    }

    pub fn engine(&self) -> &DavEngine {
        &self.engine
    }
}

impl AsRef<Tenant> for TenantHandler {
    fn as_ref(&self) -> &Tenant {
        &self.tenant
    }
}

/// Resolves, authenticates and authorizes requests before handing them to
/// a tenant's engine. Immutable after construction.
#[derive(Debug)]
pub struct Dispatcher {
    prefix: String,
    anonymous: TenantHandler,
    users: CredentialStore<TenantHandler>,
}

impl Dispatcher {
    /// Assemble a dispatcher. With an empty `users` store every request is
    /// served as `anonymous` without authentication.
    pub fn new(
        prefix: &str,
        no_sniff: bool,
        anonymous: Tenant,
        users: CredentialStore<Tenant>,
    ) -> AppResult<Self> {
        let users = users.map(|tenant| Ok(TenantHandler::new(tenant, prefix, no_sniff)))?;
        Ok(Self {
            prefix: path::normalize_prefix(prefix),
            anonymous: TenantHandler::new(anonymous, prefix, no_sniff),
            users,
        })
    }

    /// Build from the loaded configuration, hashing any plaintext
    /// credentials.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let anonymous = Tenant::anonymous_from_config(&config.webdav)?;
        let users = CredentialStore::from_config(config)?;

        if users.is_empty() {
            if anonymous.rules().is_empty() {
                tracing::warn!("no permission rules configured; every request will be denied");
            }
        } else {
            for tenant in users.entries() {
                if tenant.rules().is_empty() {
                    tracing::warn!(
                        username = tenant.username(),
                        "tenant has no permission rules; every request will be denied"
                    );
                }
            }
        }

        Self::new(
            &config.server.prefix,
            config.webdav.no_sniff,
            anonymous,
            users,
        )
    }

    /// Whether requests must authenticate.
    pub fn is_multi_tenant(&self) -> bool {
        !self.users.is_empty()
    }

    /// The normalized URL prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The tenants requests can resolve to.
    pub fn tenants(&self) -> Vec<&TenantHandler> {
        if self.users.is_empty() {
            vec![&self.anonymous]
        } else {
            let mut tenants: Vec<_> = self.users.entries().collect();
            tenants.sort_by(|a, b| a.tenant.username().cmp(b.tenant.username()));
            tenants
        }
    }

    /// Run one request through every state.
    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        let remote = remote_addr(&req);

        let handler = if self.users.is_empty() {
            &self.anonymous
        } else {
            match self.authenticate(req.headers(), &remote).await {
                Some(handler) => handler,
                None => return unauthorized_response(),
            }
        };

        if !self.authorize(handler, &req) {
            return forbidden_response();
        }

        let is_head = req.method() == Method::HEAD;
        let req = self.adapt(handler, req).await;

        let resp = handler.engine.serve(req).await;
        if is_head {
            HeadResponse::new(resp).into_response()
        } else {
            resp
        }
    }

    async fn authenticate(&self, headers: &HeaderMap, remote: &str) -> Option<&TenantHandler> {
        let result = match extract_basic_credentials(headers) {
            Ok(creds) => {
                let username = creds.username.as_str();
                tracing::info!(username, remote_address = remote, "login attempt");
                let result = self.users.authenticate(username, &creds.password).await;
                if result.is_ok() {
                    tracing::info!(username, remote_address = remote, "user authorized");
                }
                result
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(handler) => Some(handler),
            Err(e) if e.is_malformed() => {
                tracing::debug!(remote_address = remote, reason = %e, "missing or malformed credentials");
                None
            }
            Err(e) => {
                tracing::info!(remote_address = remote, reason = %e, "authentication rejected");
                None
            }
        }
    }

    /// Path the rules are evaluated against: relative to the prefix when the
    /// request lies under it, the raw normalized path otherwise.
    fn rule_path(&self, uri_path: &str) -> String {
        let decoded = path::decode_path(uri_path).unwrap_or_else(|_| uri_path.to_string());
        path::strip_prefix(&self.prefix, &decoded).unwrap_or_else(|| normalize_path(&decoded))
    }

    fn authorize(&self, handler: &TenantHandler, req: &Request<Body>) -> bool {
        let method = req.method();
        let target = self.rule_path(req.uri().path());
        let mut allowed = handler.tenant.allowed(method, &target);

        if allowed && matches!(method.as_str(), "COPY" | "MOVE") {
            // An unparsable or foreign Destination is rejected by the engine.
            let destination = path::destination(req.headers())
                .ok()
                .flatten()
                .and_then(|d| path::strip_prefix(&self.prefix, &d));
            if let Some(destination) = destination {
                allowed = handler.tenant.allowed(method, &destination);
                tracing::debug!(
                    username = handler.tenant.username(),
                    %method,
                    destination = %destination,
                    allowed,
                    "destination authorization"
                );
            }
        }

        tracing::debug!(
            username = handler.tenant.username(),
            %method,
            path = %target,
            allowed,
            "authorization decision"
        );
        allowed
    }

    /// Rewrite GET on a collection into a Depth 1 PROPFIND. Any failure
    /// leaves the request untouched.
    async fn adapt(&self, handler: &TenantHandler, mut req: Request<Body>) -> Request<Body> {
        if req.method() != Method::GET {
            return req;
        }
        let Ok(decoded) = path::decode_path(req.uri().path()) else {
            return req;
        };
        let Some(resource) = path::strip_prefix(&self.prefix, &decoded) else {
            return req;
        };

        match handler.engine.filesystem().stat(&resource).await {
            Ok(meta) if meta.is_dir => {
                let Ok(propfind) = Method::from_bytes(b"PROPFIND") else {
                    return req;
                };
                *req.method_mut() = propfind;
                if !req.headers().contains_key("depth") {
                    req.headers_mut()
                        .insert("depth", HeaderValue::from_static("1"));
                }
                tracing::debug!(path = %resource, "GET on collection served as PROPFIND");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(path = %resource, error = %e, "stat failed; GET left unchanged");
            }
        }
        req
    }
}

fn remote_addr(req: &Request<Body>) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
