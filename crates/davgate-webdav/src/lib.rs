//! Tenant-aware WebDAV gateway for DavGate (RFC 4918).
//!
//! The [`dispatcher`] resolves and authenticates the tenant, enforces the
//! permission rules and adapts GET/HEAD before handing the request to the
//! tenant's [`engine`], which serves the WebDAV verbs over a scoped
//! [`fs::FileSystem`].

pub mod auth;
pub mod cors;
pub mod dispatcher;
pub mod engine;
pub mod fs;
pub mod lock;
pub mod methods;
pub mod path;
pub mod properties;
pub mod response;
pub mod server;

pub use dispatcher::{Dispatcher, TenantHandler};
pub use engine::DavEngine;
pub use fs::{FileSystem, ScopedDir};
pub use server::WebDavServer;
