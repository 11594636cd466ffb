//! Mock authentication adapter for testing.
//!
//! Implements the `TokenVerifier` port without any real token
//! cryptography: a map of known tokens to identities. Tokens not in
//! the map return `InvalidToken`.
//!
//! # Example
//!
//! ```ignore
//! let verifier = MockTokenVerifier::new()
//!     .with_identity("valid-token", identity);
//!
//! let result = verifier.verify("valid-token").await;
//! assert!(result.is_ok());
//! ```

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, CompanyId, ConnectionIdentity, UserId};
use crate::ports::TokenVerifier;

/// Mock token verifier for testing.
#[derive(Debug, Default)]
pub struct MockTokenVerifier {
    /// Map of valid tokens to their identities
    tokens: RwLock<HashMap<String, ConnectionIdentity>>,

    /// Optional error to return for all verifications (for error testing)
    force_error: RwLock<Option<AuthError>>,
}

impl MockTokenVerifier {
    /// Creates a new empty mock verifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a valid token that maps to an identity.
    pub fn with_identity(self, token: impl Into<String>, identity: ConnectionIdentity) -> Self {
        self.tokens.write().unwrap().insert(token.into(), identity);
        self
    }

    /// Adds a valid token with a simple test identity in the given company.
    pub fn with_test_user(
        self,
        token: impl Into<String>,
        user_id: impl Into<String>,
        company_id: impl Into<String>,
    ) -> Self {
        let user_id = user_id.into();
        let identity = ConnectionIdentity::new(
            UserId::new(&user_id).unwrap(),
            Some(CompanyId::new(company_id).unwrap()),
            format!("{}@test.example.com", user_id),
        );
        self.with_identity(token, identity)
    }

    /// Forces all verifications to return the specified error.
    pub fn with_error(self, error: AuthError) -> Self {
        *self.force_error.write().unwrap() = Some(error);
        self
    }

    /// Registers a new valid token at runtime.
    pub fn add_token(&self, token: impl Into<String>, identity: ConnectionIdentity) {
        self.tokens.write().unwrap().insert(token.into(), identity);
    }

    /// Removes a token, making it invalid.
    pub fn remove_token(&self, token: &str) {
        self.tokens.write().unwrap().remove(token);
    }
}

#[async_trait]
impl TokenVerifier for MockTokenVerifier {
    async fn verify(&self, token: &str) -> Result<ConnectionIdentity, AuthError> {
        if let Some(error) = self.force_error.read().unwrap().clone() {
            return Err(error);
        }

        self.tokens
            .read()
            .unwrap()
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}
