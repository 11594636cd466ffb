//! TokenVerifier port - Interface for access-token verification.
//!
//! The gateway never issues tokens. Callers attach a pre-issued bearer
//! token to the upgrade request; this port turns it into a verified
//! [`ConnectionIdentity`] or rejects the upgrade. Keeping verification
//! behind a port lets tests swap in a mock and keeps the hub free of
//! any token-library dependency.

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, ConnectionIdentity};

/// Port for verifying bearer tokens presented at upgrade time.
///
/// # Example
///
/// ```ignore
/// let identity = verifier.verify(token).await?;
/// tracing::info!(user_id = %identity.user_id, "connection authenticated");
/// ```
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verify a token and extract the identity claims.
    ///
    /// Returns `AuthError` when the token is missing required claims,
    /// carries a bad signature, or has expired. No upgrade happens in
    /// that case.
    async fn verify(&self, token: &str) -> Result<ConnectionIdentity, AuthError>;
}
