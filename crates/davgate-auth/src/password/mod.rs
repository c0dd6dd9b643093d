//! Password credentials held by tenants.

pub mod hasher;

use std::fmt;

use davgate_core::error::AppError;

pub use self::hasher::PasswordHasher;

const ENV_PREFIX: &str = "{env}";

/// A tenant's stored secret, always an Argon2 PHC string.
///
/// Plaintext secrets from configuration are hashed once when the
/// credential is resolved, so request-time verification never compares
/// plaintext.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordCredential {
    hash: String,
}

impl PasswordCredential {
    /// Resolve a configured password.
    ///
    /// Accepts a PHC hash (`$argon2...`), `{env}NAME`, or plaintext.
    pub fn resolve(raw: &str, hasher: &PasswordHasher) -> Result<Self, AppError> {
        let secret = match raw.strip_prefix(ENV_PREFIX) {
            Some(var) => std::env::var(var).map_err(|_| {
                AppError::configuration(format!("environment variable {var} is not set"))
            })?,
            None => raw.to_string(),
        };

        if secret.starts_with("$argon2") {
            if !hasher.is_valid_hash(&secret) {
                return Err(AppError::configuration("malformed Argon2 password hash"));
            }
            return Ok(Self { hash: secret });
        }

        Ok(Self {
            hash: hasher.hash_password(&secret)?,
        })
    }

    /// The PHC string.
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl fmt::Debug for PasswordCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordCredential(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plaintext_is_hashed() {
        let hasher = PasswordHasher::new();
        let credential = PasswordCredential::resolve("plain", &hasher).unwrap();
        assert_ne!(credential.hash(), "plain");
        assert!(hasher.verify_password("plain", credential.hash()).unwrap());
    }

    #[test]
    fn test_existing_hash_is_kept() {
        let hasher = PasswordHasher::new();
        let hash = hasher.hash_password("pw").unwrap();
        let credential = PasswordCredential::resolve(&hash, &hasher).unwrap();
        assert_eq!(credential.hash(), hash);
    }

    #[test]
    fn test_malformed_hash_is_rejected() {
        let hasher = PasswordHasher::new();
        assert!(PasswordCredential::resolve("$argon2id$v=19$!!!", &hasher).is_err());
    }

    #[test]
    fn test_missing_env_var_is_rejected() {
        let hasher = PasswordHasher::new();
        let err =
            PasswordCredential::resolve("{env}DAVGATE_TEST_SURELY_UNSET_VAR", &hasher).unwrap_err();
        assert!(err.message.contains("DAVGATE_TEST_SURELY_UNSET_VAR"));
    }

    #[test]
    fn test_debug_redacts() {
        let credential = PasswordCredential::resolve("secret", &PasswordHasher::new()).unwrap();
        assert!(!format!("{credential:?}").contains(credential.hash()));
    }
}
