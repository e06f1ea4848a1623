use std::{env, time::Duration};

use crate::error::AuthError;

pub const DEFAULT_ISSUER: &str = "bartenderapp";
pub const DEFAULT_ACCESS_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_REFRESH_TOKEN_LIFETIME: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const DEFAULT_PASSWORD_HASH_COST: u32 = 3;

#[derive(Clone)]
pub struct AuthConfig {
    /// Root secret for signing tokens. Refresh tokens use a secret derived from it.
    /// If the secret changes, all currently authenticated sessions will be terminated.
    pub token_secret: String,
    /// The issuer embedded in, and required of, every token.
    pub token_issuer: String,
    /// How long access tokens remain valid. After this interval the client must refresh.
    pub access_token_lifetime: Duration,
    /// How long refresh tokens remain valid. After this interval the client must log in again.
    pub refresh_token_lifetime: Duration,
    /// Argon2 time cost (iterations) for new password hashes.
    pub password_hash_cost: u32,
}

impl AuthConfig {
    pub fn new(token_secret: impl Into<String>) -> Self {
        Self {
            token_secret: token_secret.into(),
            token_issuer: DEFAULT_ISSUER.into(),
            access_token_lifetime: DEFAULT_ACCESS_TOKEN_LIFETIME,
            refresh_token_lifetime: DEFAULT_REFRESH_TOKEN_LIFETIME,
            password_hash_cost: DEFAULT_PASSWORD_HASH_COST,
        }
    }

    /// Load the configuration from the process environment.
    ///
    /// `JWT_SECRET` is required. `JWT_ISSUER` and `PASSWORD_HASH_COST` are optional.
    pub fn from_env() -> Result<Self, AuthError> {
        let secret = env::var("JWT_SECRET").unwrap_or_default();
        let mut config = Self::new(secret);
        config.validate()?;

        if let Ok(issuer) = env::var("JWT_ISSUER") {
            if !issuer.is_empty() {
                config.token_issuer = issuer;
            }
        }

        if let Ok(cost) = env::var("PASSWORD_HASH_COST") {
            config.password_hash_cost = cost.parse().map_err(|_| {
                AuthError::Configuration(format!("PASSWORD_HASH_COST is not a number: {cost}"))
            })?;
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        if self.token_secret.is_empty() {
            return Err(AuthError::Configuration(
                "JWT_SECRET environment variable is not set".into(),
            ));
        }
        if self.password_hash_cost == 0 {
            return Err(AuthError::Configuration(
                "password hash cost must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_secret", &"<redacted>")
            .field("token_issuer", &self.token_issuer)
            .field("access_token_lifetime", &self.access_token_lifetime)
            .field("refresh_token_lifetime", &self.refresh_token_lifetime)
            .field("password_hash_cost", &self.password_hash_cost)
            .finish()
    }
}
