//! Convenience result type alias for DavGate.

use crate::error::AppError;

/// A specialized `Result` type for DavGate operations.
pub type AppResult<T> = Result<T, AppError>;
