//! Command-line arguments

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{AppConfig, TokenConfig};

#[derive(Debug, Parser)]
#[command(name = "webphone", version, about = "Terminal softphone for the webphone gateway")]
pub struct Cli {
    /// Config file (defaults to <config dir>/webphone/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the interactive phone (default)
    Phone(PhoneArgs),

    /// Sign a phone token locally and print it
    Token {
        /// Extension the token is issued for
        ext: String,

        /// Shared signing secret
        #[arg(long, env = "WEBPHONE_JWT_SECRET", hide_env_values = true)]
        secret: Option<String>,

        /// Token lifetime in seconds
        #[arg(long)]
        ttl_secs: Option<u64>,
    },

    /// Check a token's signature and expiry, then print its claims
    Verify {
        token: String,

        /// Shared signing secret
        #[arg(long, env = "WEBPHONE_JWT_SECRET", hide_env_values = true)]
        secret: Option<String>,
    },
}

impl Default for Command {
    fn default() -> Self {
        Command::Phone(PhoneArgs::default())
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct PhoneArgs {
    /// Host serving the phone
    #[arg(long)]
    pub host: Option<String>,

    /// Extension to connect as on startup
    #[arg(long)]
    pub ext: Option<String>,

    /// Fetch tokens from this endpoint instead of signing them locally
    #[arg(long, env = "WEBPHONE_TOKEN_ENDPOINT")]
    pub token_endpoint: Option<String>,

    /// Shared signing secret for local tokens
    #[arg(long, env = "WEBPHONE_JWT_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// Signaling port
    #[arg(long)]
    pub port: Option<u16>,

    /// Dial ws:// instead of wss:// (local testing only)
    #[arg(long)]
    pub insecure: bool,
}

impl PhoneArgs {
    /// Fold the flags over the file configuration
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.host = Some(host.clone());
        }
        if let Some(ext) = &self.ext {
            config.extension = Some(ext.clone());
        }
        if let Some(endpoint) = &self.token_endpoint {
            config.token = TokenConfig::Http {
                endpoint: endpoint.clone(),
                request_timeout_ms: 10_000,
            };
        } else if let Some(secret) = &self.secret {
            config.token = TokenConfig::Local(config.token.local_signing(Some(secret)));
        }
        if let Some(port) = self.port {
            config.controller.signaling.port = port;
        }
        if self.insecure {
            config.controller.signaling.scheme = "ws".to_string();
        }
    }
}
