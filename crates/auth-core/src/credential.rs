//! Identity and credential types
//!
//! An [`Identity`] is the caller's extension. A [`Credential`] is the signed
//! token issued for it; it is owned by exactly one session attempt and is
//! intentionally not `Clone`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};

/// Extension / endpoint identifier
///
/// Always non-empty. Surrounding whitespace is stripped on construction.
///
/// # Examples
///
/// ```rust
/// use webphone_auth_core::Identity;
///
/// let ext = Identity::new(" 2001 ").unwrap();
/// assert_eq!(ext.as_str(), "2001");
/// assert!(Identity::new("   ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    pub fn new(raw: impl AsRef<str>) -> Result<Self> {
        let trimmed = raw.as_ref().trim();
        if !Self::is_valid(trimmed) {
            return Err(AuthError::InvalidIdentity(
                "extension must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Check a raw extension without allocating
    pub fn is_valid(raw: &str) -> bool {
        let trimmed = raw.trim();
        !trimmed.is_empty() && !trimmed.chars().any(char::is_control)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identity {
    type Error = AuthError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}

/// Claims carried by a phone token
///
/// `ext` is the claim the signaling gateway reads to route calls. `iat` is
/// optional, as it is for the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneClaims {
    pub ext: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    pub exp: i64,
}

/// Short-lived signed proof of identity
pub struct Credential {
    token: String,
    identity: Identity,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(
        token: impl Into<String>,
        identity: Identity,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token: token.into(),
            identity,
            issued_at,
            expires_at,
        }
    }

    /// Build a credential from a raw token and its decoded claims
    pub(crate) fn from_claims(token: String, identity: Identity, claims: &PhoneClaims) -> Result<Self> {
        let issued_at = match claims.iat {
            Some(iat) => DateTime::from_timestamp(iat, 0)
                .ok_or_else(|| AuthError::InvalidToken(format!("iat out of range: {}", iat)))?,
            None => Utc::now(),
        };
        let expires_at = DateTime::from_timestamp(claims.exp, 0)
            .ok_or_else(|| AuthError::InvalidToken(format!("exp out of range: {}", claims.exp)))?;
        Ok(Self::new(token, identity, issued_at, expires_at))
    }

    /// The raw token text, as sent to the signaling endpoint
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("identity", &self.identity)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
