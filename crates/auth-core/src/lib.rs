//! # Auth-Core - Identity and token issuance for the webphone client
//!
//! This crate models the caller's [`Identity`] (extension), the short-lived
//! [`Credential`] the signaling gateway accepts, and the [`TokenIssuer`]
//! capability that produces one. Two issuers are provided:
//!
//! - [`JwtTokenIssuer`] signs HS256 tokens locally from a shared secret
//! - [`HttpTokenIssuer`] fetches them from a token endpoint

pub mod credential;
pub mod error;
pub mod http;
pub mod issuer;
pub mod jwt;

pub use credential::{Credential, Identity, PhoneClaims};
pub use error::{AuthError, Result};
pub use http::HttpTokenIssuer;
pub use issuer::TokenIssuer;
pub use jwt::{JwtIssuerConfig, JwtTokenIssuer};
