//! Immutable tenant table keyed by username.

use std::collections::HashMap;
use std::collections::hash_map::Values;

use davgate_core::config::AppConfig;
use davgate_core::error::AppError;

use crate::basic::AuthError;
use crate::password::PasswordHasher;
use crate::tenant::Tenant;

/// Holds every configured tenant record.
///
/// Generic over the entry type so callers can attach per-tenant state
/// (such as a protocol handler) to each record with [`CredentialStore::map`]
/// and keep a single table. There is no mutation API once built.
#[derive(Debug)]
pub struct CredentialStore<E = Tenant> {
    entries: HashMap<String, E>,
    hasher: PasswordHasher,
    /// Verified when the username is unknown, so both failure paths cost the
    /// same.
    decoy: Option<String>,
}

impl CredentialStore<Tenant> {
    /// Build the store from the `[[users]]` section.
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let hasher = PasswordHasher::new();
        let tenants = config
            .users
            .iter()
            .map(|user| Tenant::from_config(user, &config.webdav, &hasher))
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(tenants)
    }
}

impl<E: AsRef<Tenant>> CredentialStore<E> {
    /// Build the store from tenant entries. Usernames must be unique and
    /// every entry must carry a credential.
    pub fn new(entries: impl IntoIterator<Item = E>) -> Result<Self, AppError> {
        let hasher = PasswordHasher::new();
        let mut map = HashMap::new();

        for entry in entries {
            let tenant = entry.as_ref();
            if tenant.credential().is_none() {
                return Err(AppError::configuration(
                    "the anonymous tenant cannot be added to the credential store",
                ));
            }
            let username = tenant.username().to_string();
            if map.insert(username.clone(), entry).is_some() {
                return Err(AppError::configuration(format!(
                    "duplicate username {username:?}"
                )));
            }
        }

        let decoy = if map.is_empty() {
            None
        } else {
            Some(hasher.hash_password("davgate-decoy-credential")?)
        };

        Ok(Self {
            entries: map,
            hasher,
            decoy,
        })
    }

    /// An empty store: single-tenant mode.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            hasher: PasswordHasher::new(),
            decoy: None,
        }
    }

    /// Whether no tenants are configured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of tenants.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Find a tenant by username.
    pub fn lookup(&self, username: &str) -> Option<&E> {
        self.entries.get(username)
    }

    /// All entries, in no particular order.
    pub fn entries(&self) -> Values<'_, String, E> {
        self.entries.values()
    }

    /// Attach per-tenant state to every entry.
    pub fn map<T, F>(self, mut f: F) -> Result<CredentialStore<T>, AppError>
    where
        T: AsRef<Tenant>,
        F: FnMut(E) -> Result<T, AppError>,
    {
        let mut entries = HashMap::with_capacity(self.entries.len());
        for (username, entry) in self.entries {
            entries.insert(username, f(entry)?);
        }

        Ok(CredentialStore {
            entries,
            hasher: self.hasher,
            decoy: self.decoy,
        })
    }

    /// Verify a username/password pair.
    ///
    /// Unknown usernames still pay for one hash verification. Argon2 runs
    /// on the blocking pool. The failure cause is logged here and nowhere
    /// else; callers should answer every error the same way.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<&E, AuthError> {
        let entry = self.entries.get(username);

        let hash = match entry.and_then(|e| e.as_ref().credential()) {
            Some(credential) => credential.hash().to_string(),
            None => match &self.decoy {
                Some(decoy) => decoy.clone(),
                None => {
                    tracing::info!(username, "unknown user");
                    return Err(AuthError::UnknownUser);
                }
            },
        };

        let hasher = self.hasher.clone();
        let password = password.to_string();
        let verified = tokio::task::spawn_blocking(move || hasher.verify_password(&password, &hash))
            .await
            .map_err(|e| AuthError::Verification(e.to_string()))
            .and_then(|r| r.map_err(|e| AuthError::Verification(e.to_string())));

        match (entry, verified) {
            (_, Err(e)) => {
                tracing::error!(username, error = %e, "credential verification failed");
                Err(e)
            }
            (None, Ok(_)) => {
                tracing::info!(username, "unknown user");
                Err(AuthError::UnknownUser)
            }
            (Some(_), Ok(false)) => {
                tracing::info!(username, "invalid password");
                Err(AuthError::InvalidPassword)
            }
            (Some(entry), Ok(true)) => Ok(entry),
        }
    }
}
