//! JWT adapter for access-token verification.
//!
//! Implements the `TokenVerifier` port over `jsonwebtoken`. Tokens are
//! issued elsewhere (the identity module signs them with a shared
//! HS256 secret); this adapter validates signature and expiry and maps
//! the claims onto a [`ConnectionIdentity`]:
//!
//! - `sub` → user id (required)
//! - `company_id` → broadcast scope (optional)
//! - `email` → user email (optional)

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::ExposeSecret;
use serde::Deserialize;

use crate::config::AuthConfig;
use crate::domain::foundation::{AuthError, CompanyId, ConnectionIdentity, UserId};
use crate::ports::TokenVerifier;

/// Claims read from a gateway access token.
#[derive(Debug, Deserialize)]
struct Claims {
    /// Subject - the user ID
    sub: String,

    /// Tenant the user is acting in
    #[serde(default)]
    company_id: Option<String>,

    /// User's email address
    #[serde(default)]
    email: Option<String>,

    /// Expiry timestamp (Unix epoch seconds)
    #[allow(dead_code)]
    exp: i64,
}

/// HS256 token verifier sharing a secret with the token issuer.
pub struct JwtTokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtTokenVerifier {
    /// Create a verifier from the auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_secs;
        validation.validate_exp = true;

        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.expose_secret().as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl TokenVerifier for JwtTokenVerifier {
    async fn verify(&self, token: &str) -> Result<ConnectionIdentity, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(
            |error| match error.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            },
        )?;

        let claims = data.claims;
        let user_id = UserId::new(claims.sub).map_err(|_| AuthError::InvalidClaims("sub"))?;
        let company_id = match claims.company_id {
            Some(company) if !company.is_empty() => {
                Some(CompanyId::new(company).map_err(|_| AuthError::InvalidClaims("company_id"))?)
            }
            _ => None,
        };

        Ok(ConnectionIdentity::new(
            user_id,
            company_id,
            claims.email.unwrap_or_default(),
        ))
    }
}
