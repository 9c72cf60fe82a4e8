//! HS256 phone token issuance and verification

use std::fmt;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Deserialize;
use tracing::debug;

use crate::credential::{Credential, Identity, PhoneClaims};
use crate::error::{AuthError, Result};
use crate::issuer::TokenIssuer;

/// Minimum secret length accepted for HS256 signing
pub const MIN_SECRET_LEN: usize = 16;

/// Longest token lifetime accepted, one day
pub const MAX_TTL_SECS: u64 = 86_400;

/// JWT issuer configuration
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct JwtIssuerConfig {
    /// Shared secret, also configured on the signaling gateway
    pub secret: String,
    /// Token lifetime in seconds
    pub ttl_secs: u64,
    /// Clock skew tolerated when verifying `exp`
    pub leeway_secs: u64,
}

impl Default for JwtIssuerConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            ttl_secs: 300,
            leeway_secs: 0,
        }
    }
}

impl fmt::Debug for JwtIssuerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtIssuerConfig")
            .field("secret", &"<redacted>")
            .field("ttl_secs", &self.ttl_secs)
            .field("leeway_secs", &self.leeway_secs)
            .finish()
    }
}

impl JwtIssuerConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ..Default::default()
        }
    }

    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    pub fn with_leeway_secs(mut self, leeway_secs: u64) -> Self {
        self.leeway_secs = leeway_secs;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::ConfigError(format!(
                "signing secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        if self.ttl_secs == 0 {
            return Err(AuthError::ConfigError("ttl_secs must be positive".to_string()));
        }
        if self.ttl_secs > MAX_TTL_SECS {
            return Err(AuthError::ConfigError(format!(
                "ttl_secs must not exceed {}",
                MAX_TTL_SECS
            )));
        }
        Ok(())
    }
}

/// Signs phone tokens locally with a process-wide secret
///
/// The secret is fixed at construction and never leaves this struct.
pub struct JwtTokenIssuer {
    ttl_secs: u64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    header: Header,
}

impl JwtTokenIssuer {
    pub fn new(config: JwtIssuerConfig) -> Result<Self> {
        config.validate()?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_secs;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            ttl_secs: config.ttl_secs,
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            header: Header::new(Algorithm::HS256),
        })
    }

    /// Issuer with the default lifetime
    pub fn with_secret(secret: impl Into<String>) -> Result<Self> {
        Self::new(JwtIssuerConfig::new(secret))
    }

    /// Sign a token for `identity` valid from now for the configured lifetime
    pub fn sign(&self, identity: &Identity) -> Result<Credential> {
        let now = Utc::now().timestamp();
        let exp = i64::try_from(self.ttl_secs)
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .ok_or_else(|| AuthError::ConfigError(format!("ttl_secs out of range: {}", self.ttl_secs)))?;
        let claims = PhoneClaims {
            ext: identity.as_str().to_string(),
            iat: Some(now),
            exp,
        };

        let token = encode(&self.header, &claims, &self.encoding_key)?;
        debug!(ext = %identity, exp = claims.exp, "Signed phone token");
        Credential::from_claims(token, identity.clone(), &claims)
    }

    /// Verify a token the way the signaling gateway does
    ///
    /// Checks the signature, `exp`, and that `ext` is present.
    pub fn verify(&self, token: &str) -> Result<PhoneClaims> {
        let data = decode::<PhoneClaims>(token, &self.decoding_key, &self.validation)?;
        if data.claims.ext.trim().is_empty() {
            return Err(AuthError::InvalidToken("no extension in token".to_string()));
        }
        Ok(data.claims)
    }
}

impl fmt::Debug for JwtTokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtTokenIssuer")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenIssuer for JwtTokenIssuer {
    async fn issue_token(&self, identity: &Identity) -> Result<Credential> {
        self.sign(identity)
    }
}
