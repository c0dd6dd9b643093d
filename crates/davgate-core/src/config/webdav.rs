//! WebDAV scope, tenant, and permission rule configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Settings shared by every tenant, and the anonymous tenant's own settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebDavConfig {
    /// Root directory served to the anonymous tenant, and the fallback
    /// scope for users that do not set their own.
    #[serde(default = "default_scope")]
    pub scope: String,
    /// Report every file as `application/octet-stream`.
    #[serde(default = "default_true")]
    pub no_sniff: bool,
    /// Rule set of the anonymous tenant, inherited by users without rules.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl Default for WebDavConfig {
    fn default() -> Self {
        Self {
            scope: default_scope(),
            no_sniff: default_true(),
            rules: Vec::new(),
        }
    }
}

/// One configured tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    /// Login name, unique across the configuration.
    pub username: String,
    /// Plaintext password, an Argon2 PHC string (`$argon2id$...`), or
    /// `{env}NAME` to read the secret from an environment variable.
    pub password: String,
    /// Private root; defaults to [`WebDavConfig::scope`].
    #[serde(default)]
    pub scope: Option<String>,
    /// Rule set; defaults to [`WebDavConfig::rules`] when empty.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// A single permission rule: exactly one of `path` or `regex`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Path prefix, matched on segment boundaries.
    #[serde(default)]
    pub path: Option<String>,
    /// Regular expression matched against the request path.
    #[serde(default)]
    pub regex: Option<String>,
    /// Effect applied when the rule matches.
    pub permission: Permission,
}

impl RuleConfig {
    /// Prefix rule shorthand.
    pub fn prefix(path: impl Into<String>, permission: Permission) -> Self {
        Self {
            path: Some(path.into()),
            regex: None,
            permission,
        }
    }

    /// Regex rule shorthand.
    pub fn regex(pattern: impl Into<String>, permission: Permission) -> Self {
        Self {
            path: None,
            regex: Some(pattern.into()),
            permission,
        }
    }
}

/// Effect of a permission rule.
///
/// Ordered from least to most restrictive; the derived `Ord` is used to
/// break ties between equally specific rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Permission {
    /// Every method is permitted.
    Allow,
    /// Only non-mutating methods are permitted.
    ReadOnly,
    /// No method is permitted.
    Deny,
}

impl Permission {
    /// Return the permission as its configuration string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::ReadOnly => "read-only",
            Self::Deny => "deny",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_scope() -> String {
    ".".to_string()
}

fn default_true() -> bool {
    true
}
