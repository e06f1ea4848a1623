use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    error::DirectoryError,
    types::{HashedPassword, Role, User, UserID, Username},
};

/// Fields supplied when creating a user. The directory assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: Username,
    pub email: String,
    pub password_hash: HashedPassword,
    pub role: Role,
}

/// Replacement fields for an existing user. `password_hash` is left untouched when `None`.
#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub id: UserID,
    pub username: Username,
    pub email: String,
    pub password_hash: Option<HashedPassword>,
    pub role: Role,
}

/// The authoritative user store.
#[async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    async fn find_by_id(&self, id: UserID) -> Result<User, DirectoryError>;

    async fn find_by_username(&self, username: &Username) -> Result<User, DirectoryError>;

    /// Create the user and return the stored record. Usernames are unique.
    async fn insert(&self, user: NewUser) -> Result<User, DirectoryError>;

    /// Apply the update and return the stored record, with `updated_at` refreshed.
    async fn update(&self, update: UserUpdate) -> Result<User, DirectoryError>;

    async fn delete(&self, id: UserID) -> Result<(), DirectoryError>;

    /// All users holding `role`, or every user when `role` is `None`, ordered by username.
    async fn list_by_role(&self, role: Option<Role>) -> Result<Vec<User>, DirectoryError>;
}

#[derive(Default)]
struct Table {
    next_id: i64,
    rows: BTreeMap<UserID, User>,
}

impl Table {
    fn username_taken(&self, username: &Username, except: Option<UserID>) -> bool {
        self.rows
            .values()
            .any(|row| &row.username == username && Some(row.id) != except)
    }
}

/// Process-local [`UserDirectory`]. Ids are assigned sequentially from 1.
#[derive(Default)]
pub struct InMemoryDirectory {
    table: RwLock<Table>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn find_by_id(&self, id: UserID) -> Result<User, DirectoryError> {
        self.table
            .read()
            .await
            .rows
            .get(&id)
            .cloned()
            .ok_or(DirectoryError::NotFound)
    }

    async fn find_by_username(&self, username: &Username) -> Result<User, DirectoryError> {
        self.table
            .read()
            .await
            .rows
            .values()
            .find(|row| &row.username == username)
            .cloned()
            .ok_or(DirectoryError::NotFound)
    }

    async fn insert(&self, user: NewUser) -> Result<User, DirectoryError> {
        let mut table = self.table.write().await;

        if table.username_taken(&user.username, None) {
            return Err(DirectoryError::UsernameTaken);
        }

        table.next_id += 1;
        let now = Utc::now();
        let row = User {
            id: UserID(table.next_id),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(row.id, row.clone());

        Ok(row)
    }

    async fn update(&self, update: UserUpdate) -> Result<User, DirectoryError> {
        let mut table = self.table.write().await;

        if !table.rows.contains_key(&update.id) {
            return Err(DirectoryError::NotFound);
        }
        if table.username_taken(&update.username, Some(update.id)) {
            return Err(DirectoryError::UsernameTaken);
        }

        let row = table
            .rows
            .get_mut(&update.id)
            .ok_or(DirectoryError::NotFound)?;
        row.username = update.username;
        row.email = update.email;
        row.role = update.role;
        if let Some(hash) = update.password_hash {
            row.password_hash = hash;
        }
        row.updated_at = Utc::now();

        Ok(row.clone())
    }

    async fn delete(&self, id: UserID) -> Result<(), DirectoryError> {
        self.table
            .write()
            .await
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or(DirectoryError::NotFound)
    }

    async fn list_by_role(&self, role: Option<Role>) -> Result<Vec<User>, DirectoryError> {
        let mut users: Vec<User> = self
            .table
            .read()
            .await
            .rows
            .values()
            .filter(|row| role.map_or(true, |role| row.role == role))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));

        Ok(users)
    }
}
