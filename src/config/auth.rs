//! Authentication configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

/// Authentication configuration (JWT verification)
///
/// The gateway never issues tokens; it only verifies tokens signed by
/// the identity module with the shared HS256 secret.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Shared HMAC secret the identity module signs tokens with
    pub jwt_secret: SecretString,

    /// Clock-skew leeway applied to expiry validation, in seconds
    #[serde(default = "default_leeway")]
    pub leeway_secs: u64,
}

impl AuthConfig {
    /// Validate authentication configuration
    ///
    /// In production, requires a secret of at least 32 bytes.
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        let secret = self.jwt_secret.expose_secret();
        if secret.is_empty() {
            return Err(ValidationError::MissingRequired("AUTH__JWT_SECRET"));
        }
        if *environment == Environment::Production && secret.len() < 32 {
            return Err(ValidationError::WeakJwtSecret);
        }
        Ok(())
    }
}

fn default_leeway() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_secret(secret: &str) -> AuthConfig {
        AuthConfig {
            jwt_secret: SecretString::new(secret.to_string()),
            leeway_secs: default_leeway(),
        }
    }

    #[test]
    fn test_validation_missing_secret() {
        let config = config_with_secret("");
        assert!(config.validate(&Environment::Development).is_err());
    }

    #[test]
    fn test_validation_short_secret_allowed_in_development() {
        let config = config_with_secret("dev-secret");
        assert!(config.validate(&Environment::Development).is_ok());
    }

    #[test]
    fn test_validation_production_requires_long_secret() {
        let config = config_with_secret("short");
        assert!(config.validate(&Environment::Production).is_err());

        let config = config_with_secret("0123456789abcdef0123456789abcdef");
        assert!(config.validate(&Environment::Production).is_ok());
    }

    #[test]
    fn test_default_leeway() {
        let config = config_with_secret("dev-secret");
        assert_eq!(config.leeway_secs, 30);
    }
}
