//! Server and CORS configuration.

use serde::{Deserialize, Serialize};

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// URL prefix the WebDAV tree is served under (e.g. `/dav`).
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            prefix: default_prefix(),
        }
    }
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Whether the CORS layer is installed at all.
    #[serde(default)]
    pub enabled: bool,
    /// Whether credentialed requests are allowed.
    #[serde(default)]
    pub credentials: bool,
    /// Allowed origins (`["*"]` allows any).
    #[serde(default = "default_wildcard")]
    pub allowed_origins: Vec<String>,
    /// Allowed HTTP methods (`["*"]` allows any).
    #[serde(default = "default_wildcard")]
    pub allowed_methods: Vec<String>,
    /// Allowed request headers (`["*"]` allows any).
    #[serde(default = "default_wildcard")]
    pub allowed_headers: Vec<String>,
    /// Response headers exposed to the browser.
    #[serde(default)]
    pub exposed_headers: Vec<String>,
    /// Max age for preflight cache in seconds.
    #[serde(default = "default_max_age")]
    pub max_age_seconds: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            credentials: false,
            allowed_origins: default_wildcard(),
            allowed_methods: default_wildcard(),
            allowed_headers: default_wildcard(),
            exposed_headers: Vec::new(),
            max_age_seconds: default_max_age(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    6065
}

fn default_prefix() -> String {
    "/".to_string()
}

fn default_wildcard() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_max_age() -> u64 {
    3600
}
