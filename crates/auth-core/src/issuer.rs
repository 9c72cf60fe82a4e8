//! The token issuance capability

use std::sync::Arc;

use async_trait::async_trait;

use crate::credential::{Credential, Identity};
use crate::error::Result;

/// Produces a time-bounded signed credential for an identity
///
/// The call-control client treats this as an opaque service. Implementations
/// decide how tokens are signed or where they are fetched from; callers only
/// rely on the returned [`Credential`] being bound to `identity`.
///
/// # Examples
///
/// ```rust
/// use webphone_auth_core::{JwtTokenIssuer, TokenIssuer, Identity};
///
/// # async fn example() -> webphone_auth_core::Result<()> {
/// let issuer = JwtTokenIssuer::with_secret("a-very-long-shared-secret")?;
/// let credential = issuer.issue_token(&Identity::new("2001")?).await?;
/// assert_eq!(credential.identity().as_str(), "2001");
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue_token(&self, identity: &Identity) -> Result<Credential>;
}

#[async_trait]
impl<T: TokenIssuer + ?Sized> TokenIssuer for Arc<T> {
    async fn issue_token(&self, identity: &Identity) -> Result<Credential> {
        (**self).issue_token(identity).await
    }
}
