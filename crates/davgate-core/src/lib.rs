//! # davgate-core
//!
//! Core crate for DavGate. Contains the configuration schemas and the
//! unified error system shared by the auth and WebDAV crates.
//!
//! This crate has **no** internal dependencies on other DavGate crates.

pub mod config;
pub mod error;
pub mod result;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
