//! HTTP Basic credential extraction and authentication errors.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use http::HeaderMap;

/// Extracted credentials from a Basic auth header
#[derive(Clone)]
pub struct BasicCredentials {
    /// Username
    pub username: String,
    /// Password (plaintext from header)
    pub password: String,
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Extract Basic credentials from HTTP headers
pub fn extract_basic_credentials(headers: &HeaderMap) -> Result<BasicCredentials, AuthError> {
    let auth_header = headers
        .get(http::header::AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?;

    let auth_str = auth_header.to_str().map_err(|_| AuthError::InvalidHeader)?;

    let (scheme, encoded) = auth_str
        .trim()
        .split_once(' ')
        .ok_or(AuthError::NotBasicAuth)?;

    if !scheme.eq_ignore_ascii_case("Basic") {
        return Err(AuthError::NotBasicAuth);
    }

    let decoded = BASE64
        .decode(encoded.trim())
        .map_err(|_| AuthError::InvalidEncoding)?;

    let decoded_str = String::from_utf8(decoded).map_err(|_| AuthError::InvalidEncoding)?;

    let (username, password) = decoded_str
        .split_once(':')
        .ok_or(AuthError::InvalidFormat)?;

    Ok(BasicCredentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// Authentication errors
///
/// Every variant is answered with the same 401 response; the variants only
/// exist so the server-side log can tell them apart.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No Authorization header present
    #[error("Missing Authorization header")]
    MissingHeader,

    /// Authorization header is not valid UTF-8
    #[error("Invalid Authorization header")]
    InvalidHeader,

    /// Not a Basic auth scheme
    #[error("Not Basic authentication")]
    NotBasicAuth,

    /// Base64 decoding failed
    #[error("Invalid base64 encoding")]
    InvalidEncoding,

    /// Credentials format invalid (missing colon)
    #[error("Invalid credentials format")]
    InvalidFormat,

    /// No tenant with this username
    #[error("Unknown user")]
    UnknownUser,

    /// The password did not verify against the stored credential
    #[error("Invalid password")]
    InvalidPassword,

    /// Verification itself failed (corrupt hash, worker panic)
    #[error("Credential verification failed: {0}")]
    Verification(String),
}

impl AuthError {
    /// Whether the request carried no usable credentials at all, as opposed
    /// to credentials that were checked and rejected.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::MissingHeader
                | Self::InvalidHeader
                | Self::NotBasicAuth
                | Self::InvalidEncoding
                | Self::InvalidFormat
        )
    }
}
