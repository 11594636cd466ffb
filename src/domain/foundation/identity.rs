//! Connection identity types for the domain layer.
//!
//! These types represent the verified identity bound to a WebSocket
//! connection at upgrade time. They have **no provider dependencies**;
//! any token scheme can populate them via the `TokenVerifier` port.
//!
//! The identity is immutable for the connection's lifetime, and it is
//! the only identity the hub ever trusts: trust-bearing payload fields
//! arriving from a client (lock holders, typing senders) are always
//! overwritten from it before relay.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{CompanyId, UserId};

/// Verified identity extracted from a validated access token.
///
/// Bound to a connection at upgrade time; a connection without a
/// company belongs to no broadcast scope and only receives unicasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionIdentity {
    /// The unique user identifier (`sub` claim).
    pub user_id: UserId,

    /// The tenant the user is acting in, when the token carries one.
    pub company_id: Option<CompanyId>,

    /// User's email address from the token claims.
    pub email: String,
}

impl ConnectionIdentity {
    /// Creates a new connection identity.
    pub fn new(user_id: UserId, company_id: Option<CompanyId>, email: impl Into<String>) -> Self {
        Self {
            user_id,
            company_id,
            email: email.into(),
        }
    }
}

/// Authentication errors that can occur during token verification.
///
/// These errors are **domain-centric**: they describe what went wrong
/// from the gateway's perspective, not the token library's.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// No token was supplied with the upgrade request.
    #[error("Missing access token")]
    MissingToken,

    /// The token is malformed or has an invalid signature.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// The token has expired (separate from InvalidToken for specific handling).
    #[error("Token expired")]
    TokenExpired,

    /// The token verified but a required claim is unusable.
    #[error("Token claims invalid: {0}")]
    InvalidClaims(&'static str),
}

impl AuthError {
    /// Returns true if this error indicates the client should obtain a new token.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(self, AuthError::InvalidToken | AuthError::TokenExpired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user_id() -> UserId {
        UserId::new("user-123").unwrap()
    }

    #[test]
    fn identity_new_binds_all_fields() {
        let identity = ConnectionIdentity::new(
            test_user_id(),
            Some(CompanyId::new("co-1").unwrap()),
            "test@example.com",
        );

        assert_eq!(identity.user_id.as_str(), "user-123");
        assert_eq!(identity.company_id.unwrap().as_str(), "co-1");
        assert_eq!(identity.email, "test@example.com");
    }

    #[test]
    fn identity_allows_missing_company() {
        let identity = ConnectionIdentity::new(test_user_id(), None, "test@example.com");
        assert!(identity.company_id.is_none());
    }

    #[test]
    fn auth_error_displays_correctly() {
        assert_eq!(format!("{}", AuthError::MissingToken), "Missing access token");
        assert_eq!(format!("{}", AuthError::TokenExpired), "Token expired");
        assert_eq!(
            format!("{}", AuthError::InvalidClaims("sub")),
            "Token claims invalid: sub"
        );
    }

    #[test]
    fn auth_error_requires_reauthentication_for_token_errors() {
        assert!(AuthError::InvalidToken.requires_reauthentication());
        assert!(AuthError::TokenExpired.requires_reauthentication());
        assert!(!AuthError::MissingToken.requires_reauthentication());
        assert!(!AuthError::InvalidClaims("sub").requires_reauthentication());
    }
}
