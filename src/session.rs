use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    directory::UserDirectory,
    error::{AuthError, DirectoryError},
    password::PasswordHasher,
    token::{TokenCodec, TokenKind},
    types::{Claims, HashedPassword, Role, User, UserID, Username},
};

const DECOY_PASSWORD: &str = "decoy password for unknown users";

/// Returned by login and refresh.
#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub refresh_token: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub user_id: UserID,
    pub username: Username,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

impl From<&Claims> for VerifyResponse {
    fn from(claims: &Claims) -> Self {
        Self {
            valid: true,
            user_id: claims.user_id,
            username: claims.username.clone(),
            role: claims.role,
            expires_at: claims.expires_at(),
        }
    }
}

/// Login, refresh and token verification on top of the directory and the token codec.
#[derive(Clone)]
pub struct SessionService {
    directory: Arc<dyn UserDirectory>,
    codec: TokenCodec,
    hasher: PasswordHasher,
    /// Verified against when the username is unknown, so both failure paths pay for one hash check.
    decoy_hash: HashedPassword,
}

impl SessionService {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        codec: TokenCodec,
        hasher: PasswordHasher,
    ) -> Result<Self, AuthError> {
        let decoy_hash = hasher.hash(DECOY_PASSWORD)?;

        Ok(Self {
            directory,
            codec,
            hasher,
            decoy_hash,
        })
    }

    /// Unknown usernames and wrong passwords fail identically.
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionResponse, AuthError> {
        let username = Username(username.to_owned());

        let user = match self.directory.find_by_username(&username).await {
            Ok(user) => user,
            Err(DirectoryError::NotFound) => {
                self.hasher
                    .verify_blocking(password.to_owned(), self.decoy_hash.clone())
                    .await?;
                tracing::warn!(%username, "login failed: unknown user");
                return Err(AuthError::InvalidCredentials);
            }
            Err(err) => return Err(err.into()),
        };

        let matched = self
            .hasher
            .verify_blocking(password.to_owned(), user.password_hash.clone())
            .await?;
        if !matched {
            tracing::warn!(%username, "login failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        tracing::info!(user_id = %user.id, role = %user.role, "login succeeded");
        self.issue_session(&user)
    }

    /// Exchange a refresh token for a fresh token pair. The user is re-read so the
    /// new tokens carry the current role and email.
    ///
    /// An expired refresh token is [`AuthError::RefreshExpired`]: the client has to log in again.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<SessionResponse, AuthError> {
        let claims = match self.codec.parse(refresh_token, TokenKind::Refresh) {
            Ok(claims) => claims,
            Err(AuthError::TokenExpired) => return Err(AuthError::RefreshExpired),
            Err(err) => return Err(err),
        };

        let user = match self.directory.find_by_id(claims.user_id).await {
            Ok(user) => user,
            Err(DirectoryError::NotFound) => {
                tracing::warn!(user_id = %claims.user_id, "refresh for a user that no longer exists");
                return Err(AuthError::TokenInvalid);
            }
            Err(err) => return Err(err.into()),
        };

        tracing::info!(user_id = %user.id, role = %user.role, "session refreshed");
        self.issue_session(&user)
    }

    pub fn verify_token(&self, access_token: &str) -> Result<Claims, AuthError> {
        self.codec.parse(access_token, TokenKind::Access)
    }

    fn issue_session(&self, user: &User) -> Result<SessionResponse, AuthError> {
        Ok(SessionResponse {
            token: self.codec.issue_access_token(user)?,
            refresh_token: self.codec.issue_refresh_token(user)?,
            user: user.redacted(),
        })
    }
}
