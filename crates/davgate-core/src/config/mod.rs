//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod logging;
pub mod server;
pub mod webdav;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

pub use self::logging::LoggingConfig;
pub use self::server::{CorsConfig, ServerConfig};
pub use self::webdav::{Permission, RuleConfig, UserConfig, WebDavConfig};

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay + an
/// optional explicit file).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Scope and rule defaults.
    #[serde(default)]
    pub webdav: WebDavConfig,
    /// Configured tenants. Empty means single-tenant, anonymous mode.
    #[serde(default)]
    pub users: Vec<UserConfig>,
    /// Cross-origin settings.
    #[serde(default)]
    pub cors: CorsConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges `config/default`, the `config/{env}` overlay, the explicit
    /// `path` (required when given) and environment variables prefixed
    /// with `DAVGATE__`.
    pub fn load(path: Option<&str>, env: &str) -> Result<Self, AppError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false));

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("DAVGATE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration from a TOML string.
    pub fn from_toml(source: &str) -> Result<Self, AppError> {
        let config: Self = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check the invariants deserialization cannot express.
    pub fn validate(&self) -> Result<(), AppError> {
        if !self.server.prefix.starts_with('/') {
            return Err(AppError::configuration(format!(
                "server.prefix must start with '/': {:?}",
                self.server.prefix
            )));
        }

        let mut seen = HashSet::new();
        for user in &self.users {
            if user.username.is_empty() {
                return Err(AppError::configuration("users[].username must not be empty"));
            }
            if user.username.contains(':') {
                return Err(AppError::configuration(format!(
                    "username {:?} must not contain ':'",
                    user.username
                )));
            }
            if !seen.insert(user.username.as_str()) {
                return Err(AppError::configuration(format!(
                    "duplicate username {:?}",
                    user.username
                )));
            }
            validate_rules(&user.rules)?;
        }

        validate_rules(&self.webdav.rules)
    }
}

fn validate_rules(rules: &[RuleConfig]) -> Result<(), AppError> {
    for rule in rules {
        match (&rule.path, &rule.regex) {
            (Some(_), None) | (None, Some(_)) => {}
            _ => {
                return Err(AppError::configuration(
                    "each rule needs exactly one of `path` or `regex`",
                ));
            }
        }
    }
    Ok(())
}
