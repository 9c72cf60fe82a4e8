//! Client for a remote token endpoint
//!
//! The endpoint answers `GET <endpoint>?action=get_token&ext=<extension>` with
//! the signed token as a raw text body. The signing secret stays on the
//! server; this client only reads the token's claims to learn its expiry and
//! to check that it was issued for the requested extension.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use tracing::{debug, warn};
use url::Url;

use crate::credential::{Credential, Identity, PhoneClaims};
use crate::error::{AuthError, Result};
use crate::issuer::TokenIssuer;

/// Fetches phone tokens from an HTTP(S) token endpoint
#[derive(Debug, Clone)]
pub struct HttpTokenIssuer {
    endpoint: Url,
    client: reqwest::Client,
}

impl HttpTokenIssuer {
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_request_timeout(endpoint, Duration::from_secs(10))
    }

    pub fn with_request_timeout(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| AuthError::ConfigError(format!("invalid token endpoint '{}': {}", endpoint, e)))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(AuthError::ConfigError(format!(
                "token endpoint must be http or https, got '{}'",
                endpoint.scheme()
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::ConfigError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn request_url(&self, identity: &Identity) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("action", "get_token")
            .append_pair("ext", identity.as_str());
        url
    }
}

/// Read the claims of a token without checking its signature
///
/// Only the gateway holds the secret; the client needs `exp` and `ext`.
pub fn peek_claims(token: &str) -> Result<PhoneClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims = HashSet::new();

    let data = decode::<PhoneClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
    Ok(data.claims)
}

#[async_trait]
impl TokenIssuer for HttpTokenIssuer {
    async fn issue_token(&self, identity: &Identity) -> Result<Credential> {
        let url = self.request_url(identity);
        debug!(endpoint = %self.endpoint, ext = %identity, "Requesting phone token");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), ext = %identity, "Token endpoint refused request");
            return Err(AuthError::EndpointError(format!("HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;
        let token = body.trim();
        if token.is_empty() {
            return Err(AuthError::EndpointError("empty token body".to_string()));
        }

        let claims = peek_claims(token)?;
        if claims.ext != identity.as_str() {
            return Err(AuthError::IdentityMismatch {
                expected: identity.as_str().to_string(),
                actual: claims.ext,
            });
        }

        let credential = Credential::from_claims(token.to_string(), identity.clone(), &claims)?;
        if credential.is_expired() {
            return Err(AuthError::TokenExpired);
        }
        Ok(credential)
    }
}
