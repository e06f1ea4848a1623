use std::sync::Arc;

use serde::Deserialize;

use crate::{
    directory::{NewUser, UserDirectory, UserUpdate},
    error::AuthError,
    password::PasswordHasher,
    policy::{authorize, require_caller, Action},
    types::{Claims, Role, User, UserID, Username},
};

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub username: String,
    pub email: String,
    /// Leave unset to keep the current password.
    #[serde(default)]
    pub password: Option<String>,
    pub role: String,
}

/// Role-gated CRUD over the user directory. Every returned user is redacted.
#[derive(Clone)]
pub struct UserService {
    directory: Arc<dyn UserDirectory>,
    hasher: PasswordHasher,
}

impl UserService {
    pub fn new(directory: Arc<dyn UserDirectory>, hasher: PasswordHasher) -> Self {
        Self { directory, hasher }
    }

    pub async fn current_user(&self, caller: Option<&Claims>) -> Result<User, AuthError> {
        let caller = require_caller(caller)?;
        let user = self.directory.find_by_id(caller.user_id).await?;
        Ok(user.redacted())
    }

    pub async fn get_user(&self, caller: Option<&Claims>, id: UserID) -> Result<User, AuthError> {
        authorize(caller, &Action::GetUser { target: id })?;
        let user = self.directory.find_by_id(id).await?;
        Ok(user.redacted())
    }

    /// `role_filter` of `None` or `""` lists everyone.
    pub async fn list_users(
        &self,
        caller: Option<&Claims>,
        role_filter: Option<&str>,
    ) -> Result<Vec<User>, AuthError> {
        authorize(caller, &Action::ListUsers)?;

        let role = match role_filter {
            Some(role) if !role.is_empty() => Some(role.parse::<Role>()?),
            _ => None,
        };

        let users = self.directory.list_by_role(role).await?;
        Ok(users.iter().map(User::redacted).collect())
    }

    pub async fn create_user(
        &self,
        caller: Option<&Claims>,
        request: CreateUserRequest,
    ) -> Result<User, AuthError> {
        let role = request.role.parse::<Role>()?;
        if let Err(err) = authorize(caller, &Action::CreateUser { role }) {
            log_denial(caller, "create user", &err);
            return Err(err);
        }

        validate_profile(&request.username, &request.email)?;
        if request.password.is_empty() {
            return Err(AuthError::Validation("password must not be empty".into()));
        }

        let password_hash = self.hasher.hash_blocking(request.password).await?;
        let user = self
            .directory
            .insert(NewUser {
                username: Username(request.username),
                email: request.email,
                password_hash,
                role,
            })
            .await?;

        tracing::info!(user_id = %user.id, role = %user.role, "user created");
        Ok(user.redacted())
    }

    pub async fn update_user(
        &self,
        caller: Option<&Claims>,
        id: UserID,
        request: UpdateUserRequest,
    ) -> Result<User, AuthError> {
        if let Err(err) = authorize(caller, &Action::UpdateTarget { target: id }) {
            log_denial(caller, "update user", &err);
            return Err(err);
        }

        let existing = self.directory.find_by_id(id).await?;
        let requested_role = request.role.parse::<Role>()?;

        let action = Action::UpdateUser {
            existing: &existing,
            requested_role,
        };
        if let Err(err) = authorize(caller, &action) {
            log_denial(caller, "update user", &err);
            return Err(err);
        }

        validate_profile(&request.username, &request.email)?;

        let password_hash = match request.password {
            Some(password) if !password.is_empty() => {
                Some(self.hasher.hash_blocking(password).await?)
            }
            _ => None,
        };

        let user = self
            .directory
            .update(UserUpdate {
                id,
                username: Username(request.username),
                email: request.email,
                password_hash,
                role: requested_role,
            })
            .await?;

        tracing::info!(user_id = %user.id, role = %user.role, "user updated");
        Ok(user.redacted())
    }

    pub async fn delete_user(&self, caller: Option<&Claims>, id: UserID) -> Result<(), AuthError> {
        if let Err(err) = authorize(caller, &Action::DeleteUser { target: id }) {
            log_denial(caller, "delete user", &err);
            return Err(err);
        }

        self.directory.delete(id).await?;

        tracing::info!(user_id = %id, "user deleted");
        Ok(())
    }
}

fn validate_profile(username: &str, email: &str) -> Result<(), AuthError> {
    if username.trim().is_empty() {
        return Err(AuthError::Validation("username must not be empty".into()));
    }
    if !email.contains('@') {
        return Err(AuthError::Validation("invalid email format".into()));
    }
    Ok(())
}

fn log_denial(caller: Option<&Claims>, action: &str, err: &AuthError) {
    match caller {
        Some(caller) => {
            tracing::warn!(user_id = %caller.user_id, role = %caller.role, action, %err, "denied")
        }
        None => tracing::warn!(action, %err, "denied"),
    }
}
