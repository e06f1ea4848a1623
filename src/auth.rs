use std::sync::Arc;

use crate::{
    config::AuthConfig,
    directory::{NewUser, UserDirectory},
    error::{AuthError, DirectoryError},
    metrics::RequestMetrics,
    password::PasswordHasher,
    session::SessionService,
    token::TokenCodec,
    types::{Role, User, Username},
    users::UserService,
};

pub(crate) struct AuthInternal {
    directory: Arc<dyn UserDirectory>,
    hasher: PasswordHasher,
    sessions: SessionService,
    users: UserService,
    metrics: RequestMetrics,
}

/// Cheaply cloneable handle to the session and user services.
///
/// Holds no locks: everything behind it is either immutable or synchronized
/// by the directory implementation itself.
#[derive(Clone)]
pub struct Auth {
    pub(crate) internal: Arc<AuthInternal>,
}

impl Auth {
    /// Fails with [`AuthError::Configuration`] when the signing secret is missing.
    pub fn new(config: AuthConfig, directory: Arc<dyn UserDirectory>) -> Result<Self, AuthError> {
        let codec = TokenCodec::new(&config)?;
        let hasher = PasswordHasher::new(config.password_hash_cost);

        Ok(Self {
            internal: Arc::new(AuthInternal {
                sessions: SessionService::new(directory.clone(), codec, hasher)?,
                users: UserService::new(directory.clone(), hasher),
                metrics: RequestMetrics::new()?,
                directory,
                hasher,
            }),
        })
    }

    pub fn sessions(&self) -> &SessionService {
        &self.internal.sessions
    }

    pub fn users(&self) -> &UserService {
        &self.internal.users
    }

    pub fn metrics(&self) -> &RequestMetrics {
        &self.internal.metrics
    }

    /// Make sure an admin account named `username` exists, creating it if needed.
    /// An existing account is returned untouched.
    pub async fn ensure_admin(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let username = Username(username.to_owned());

        match self.internal.directory.find_by_username(&username).await {
            Ok(user) => return Ok(user.redacted()),
            Err(DirectoryError::NotFound) => {}
            Err(err) => return Err(err.into()),
        }

        if password.is_empty() {
            return Err(AuthError::Validation("admin password must not be empty".into()));
        }

        let password_hash = self.internal.hasher.hash_blocking(password.to_owned()).await?;
        let user = self
            .internal
            .directory
            .insert(NewUser {
                username,
                email: email.to_owned(),
                password_hash,
                role: Role::Admin,
            })
            .await?;

        tracing::info!(user_id = %user.id, username = %user.username, "bootstrap admin created");
        Ok(user.redacted())
    }
}
