//! TOML configuration for the terminal client
//!
//! ```toml
//! log_level = "info"
//! host = "pbx.example.com"
//! extension = "2001"
//!
//! [token]
//! mode = "http"
//! endpoint = "https://pbx.example.com/webphone/index.php"
//!
//! [controller]
//! connect_timeout_ms = 8000
//!
//! [controller.signaling]
//! port = 8766
//! path = "phone"
//! ```
//!
//! With `mode = "local"` the client signs its own tokens from `secret`, which
//! must match the gateway's.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use webphone_auth_core::{HttpTokenIssuer, JwtIssuerConfig, JwtTokenIssuer, TokenIssuer};
use webphone_client_core::ControllerConfig;

/// Environment variable holding the shared signing secret
pub const SECRET_ENV: &str = "WEBPHONE_JWT_SECRET";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: String,
    pub json_logs: bool,
    /// Host serving the phone; the signaling endpoint lives there
    pub host: Option<String>,
    /// Extension to connect as on startup
    pub extension: Option<String>,
    pub token: TokenConfig,
    pub controller: ControllerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            host: None,
            extension: None,
            token: TokenConfig::default(),
            controller: ControllerConfig::default(),
        }
    }
}

/// Where tokens come from
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum TokenConfig {
    /// Sign locally with the gateway's shared secret
    Local(JwtIssuerConfig),
    /// Fetch from the token endpoint
    Http {
        endpoint: String,
        #[serde(default = "default_request_timeout_ms")]
        request_timeout_ms: u64,
    },
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for TokenConfig {
    fn default() -> Self {
        TokenConfig::Local(JwtIssuerConfig::default())
    }
}

impl TokenConfig {
    pub fn build_issuer(&self) -> Result<Arc<dyn TokenIssuer>> {
        match self {
            TokenConfig::Local(jwt) => {
                let issuer = JwtTokenIssuer::new(jwt.clone()).with_context(|| {
                    format!("local token signing needs a secret (set [token].secret or {})", SECRET_ENV)
                })?;
                Ok(Arc::new(issuer))
            }
            TokenConfig::Http {
                endpoint,
                request_timeout_ms,
            } => {
                let issuer = HttpTokenIssuer::with_request_timeout(
                    endpoint,
                    Duration::from_millis(*request_timeout_ms),
                )?;
                Ok(Arc::new(issuer))
            }
        }
    }

    /// Settings for local signing, with `secret` taking precedence when given
    pub fn local_signing(&self, secret: Option<&str>) -> JwtIssuerConfig {
        let mut jwt = match self {
            TokenConfig::Local(jwt) => jwt.clone(),
            TokenConfig::Http { .. } => JwtIssuerConfig::default(),
        };
        if let Some(secret) = secret {
            jwt.secret = secret.to_string();
        }
        jwt
    }
}

impl AppConfig {
    /// Load from `path`, or from the default location when it exists
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(raw)?;
        config.controller.validate()?;
        Ok(config)
    }
}

/// `<config dir>/webphone/config.toml`
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("webphone").join("config.toml"))
}
