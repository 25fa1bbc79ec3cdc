//! # Configuration
//!
//! Application settings, read from an optional TOML file and then
//! overridden by environment variables.
//!
//! ```toml
//! [merge]
//! policy = "newest_wins"        # or "primary_wins"
//! min_schema_version = 11
//! max_schema_version = 14
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! rate_limit = 100              # requests per second, 0 disables
//! cors_origins = ["http://localhost:3000"]
//! api_key = "secret"
//! max_upload_bytes = 104857600
//! ```
//!
//! ## Environment Overrides
//!
//! - `JWSYNC_API_KEY`: bearer token required by every endpoint but `/health`
//! - `JWSYNC_RATE_LIMIT`: requests per second
//! - `JWSYNC_CORS_ORIGINS`: comma-separated origins, or `*` for all
//! - `JWSYNC_MAX_UPLOAD_BYTES`: request body limit

use jwsync_core::{MergeOptions, SyncError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default upload limit: 100 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Default rate limit: 100 requests per second.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

// =============================================================================
// APP CONFIG
// =============================================================================

/// Everything the binary can be configured with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Merge tunables, passed to the core unchanged.
    pub merge: MergeOptions,
    pub server: ServerConfig,
}

/// HTTP transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub rate_limit: u32,
    /// Allowed CORS origins. Empty means localhost only, `["*"]` means any.
    pub cors_origins: Vec<String>,
    pub api_key: Option<String>,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            rate_limit: DEFAULT_RATE_LIMIT,
            cors_origins: Vec::new(),
            api_key: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl AppConfig {
    /// Parse a TOML document.
    pub fn from_toml(source: &str) -> Result<Self, SyncError> {
        let config: Self = toml::from_str(source)
            .map_err(|e| SyncError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file at `path` (defaults when `None`) and apply the
    /// process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, SyncError> {
        let config = match path {
            Some(path) => {
                let source = std::fs::read_to_string(path).map_err(|e| {
                    SyncError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
                })?;
                Self::from_toml(&source)?
            }
            None => Self::default(),
        };

        let config = config.with_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup` (a variable name → value function).
    ///
    /// Unparseable numeric values are ignored with a warning.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(key) = lookup("JWSYNC_API_KEY") {
            self.server.api_key = Some(key);
        }

        if let Some(raw) = lookup("JWSYNC_RATE_LIMIT") {
            match raw.trim().parse() {
                Ok(rps) => self.server.rate_limit = rps,
                Err(_) => tracing::warn!("Ignoring invalid JWSYNC_RATE_LIMIT '{}'", raw),
            }
        }

        if let Some(raw) = lookup("JWSYNC_CORS_ORIGINS") {
            self.server.cors_origins = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Some(raw) = lookup("JWSYNC_MAX_UPLOAD_BYTES") {
            match raw.trim().parse() {
                Ok(bytes) => self.server.max_upload_bytes = bytes,
                Err(_) => tracing::warn!("Ignoring invalid JWSYNC_MAX_UPLOAD_BYTES '{}'", raw),
            }
        }

        self
    }

    /// The API key, if one is set and non-empty.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.server.api_key.as_deref().filter(|k| !k.is_empty())
    }

    fn validate(&self) -> Result<(), SyncError> {
        if self.merge.min_schema_version > self.merge.max_schema_version {
            return Err(SyncError::InvalidConfig(format!(
                "min_schema_version {} exceeds max_schema_version {}",
                self.merge.min_schema_version, self.merge.max_schema_version
            )));
        }
        if self.server.max_upload_bytes == 0 {
            return Err(SyncError::InvalidConfig(
                "max_upload_bytes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
