//! Offline token tools

use anyhow::{Context, Result};
use webphone_auth_core::{Identity, JwtTokenIssuer};

use crate::config::{AppConfig, SECRET_ENV};

fn issuer(config: &AppConfig, secret: Option<&str>, ttl_secs: Option<u64>) -> Result<JwtTokenIssuer> {
    let mut jwt = config.token.local_signing(secret);
    if let Some(ttl) = ttl_secs {
        jwt = jwt.with_ttl_secs(ttl);
    }
    JwtTokenIssuer::new(jwt)
        .with_context(|| format!("token signing needs a secret (--secret or {})", SECRET_ENV))
}

/// Sign a token for `ext` and print it on stdout
pub fn sign(config: &AppConfig, ext: &str, secret: Option<&str>, ttl_secs: Option<u64>) -> Result<()> {
    let identity = Identity::new(ext)?;
    let credential = issuer(config, secret, ttl_secs)?.sign(&identity)?;
    println!("{}", credential.token());
    Ok(())
}

/// Verify `token` and print its claims as JSON
pub fn verify(config: &AppConfig, token: &str, secret: Option<&str>) -> Result<()> {
    let claims = issuer(config, secret, None)?.verify(token.trim())?;
    println!("{}", serde_json::to_string_pretty(&claims)?);
    Ok(())
}
