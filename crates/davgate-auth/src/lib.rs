//! # davgate-auth
//!
//! Identity and authorization for DavGate: Basic credential parsing,
//! Argon2id password credentials, the immutable tenant table, and the
//! longest-match permission evaluator.

pub mod basic;
pub mod password;
pub mod permission;
pub mod store;
pub mod tenant;

pub use basic::{AuthError, BasicCredentials, extract_basic_credentials};
pub use password::{PasswordCredential, PasswordHasher};
pub use permission::{RuleSet, allowed};
pub use store::CredentialStore;
pub use tenant::Tenant;
