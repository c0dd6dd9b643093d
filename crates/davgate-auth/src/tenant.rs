//! Tenant records.

use std::path::{Path, PathBuf};

use http::Method;

use davgate_core::config::{UserConfig, WebDavConfig};
use davgate_core::error::AppError;

use crate::password::{PasswordCredential, PasswordHasher};
use crate::permission::{RuleSet, allowed};

/// One configured identity with its own filesystem scope and rules.
///
/// Built once at startup and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Tenant {
    username: String,
    credential: Option<PasswordCredential>,
    scope_root: PathBuf,
    rules: RuleSet,
}

impl Tenant {
    /// A named tenant that must authenticate.
    pub fn new(
        username: impl Into<String>,
        credential: PasswordCredential,
        scope_root: impl Into<PathBuf>,
        rules: RuleSet,
    ) -> Self {
        Self {
            username: username.into(),
            credential: Some(credential),
            scope_root: scope_root.into(),
            rules,
        }
    }

    /// The single tenant used when no users are configured.
    pub fn anonymous(scope_root: impl Into<PathBuf>, rules: RuleSet) -> Self {
        Self {
            username: String::new(),
            credential: None,
            scope_root: scope_root.into(),
            rules,
        }
    }

    /// Build the anonymous tenant from the `[webdav]` section.
    pub fn anonymous_from_config(config: &WebDavConfig) -> Result<Self, AppError> {
        Ok(Self::anonymous(
            &config.scope,
            RuleSet::from_config(&config.rules)?,
        ))
    }

    /// Build a named tenant, inheriting scope and rules from `defaults`
    /// where the user leaves them unset.
    pub fn from_config(
        user: &UserConfig,
        defaults: &WebDavConfig,
        hasher: &PasswordHasher,
    ) -> Result<Self, AppError> {
        let credential = PasswordCredential::resolve(&user.password, hasher)?;
        let scope = user.scope.as_deref().unwrap_or(&defaults.scope);
        let rules = if user.rules.is_empty() {
            RuleSet::from_config(&defaults.rules)?
        } else {
            RuleSet::from_config(&user.rules)?
        };

        Ok(Self::new(user.username.clone(), credential, scope, rules))
    }

    /// Login name; empty for the anonymous tenant.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Stored credential; `None` for the anonymous tenant.
    pub fn credential(&self) -> Option<&PasswordCredential> {
        self.credential.as_ref()
    }

    /// Filesystem root the tenant is confined to.
    pub fn scope_root(&self) -> &Path {
        &self.scope_root
    }

    /// Permission rules.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Whether this is the anonymous tenant.
    pub fn is_anonymous(&self) -> bool {
        self.credential.is_none()
    }

    /// Shorthand for [`allowed`].
    pub fn allowed(&self, method: &Method, path: &str) -> bool {
        allowed(self, method, path)
    }
}

impl AsRef<Tenant> for Tenant {
    fn as_ref(&self) -> &Tenant {
        self
    }
}
