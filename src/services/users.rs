//! User service

use crate::core::error::{Error, Result, StorageError};
use crate::core::types::{Id, Role, User, UserView};
use crate::security::hash_password_blocking;
use crate::services::IntegrityChecker;
use crate::storage::SharedStore;
use crate::system::metrics::Metrics;

const DUPLICATE_USERNAME: &str = "Duplicate username.";

/// Validated input for creating a user
#[derive(Debug, Clone, PartialEq)]
pub struct CreateUser {
    pub username: String,
    pub password: String,
    pub roles: Vec<Role>,
}

/// Validated full update of a user; only the password is optional
#[derive(Debug, Clone, PartialEq)]
pub struct UserUpdate {
    pub id: Id,
    pub username: String,
    pub roles: Vec<Role>,
    pub active: bool,
    pub password: Option<String>,
}

/// CRUD over users
#[derive(Clone)]
pub struct UserService {
    store: SharedStore,
    integrity: IntegrityChecker,
}

impl UserService {
    /// Create a service over `store`
    pub fn new(store: SharedStore, integrity: IntegrityChecker) -> Self {
        Self { store, integrity }
    }

    /// All users without password hashes. May be empty.
    pub async fn list(&self) -> Result<Vec<UserView>> {
        let users = self.store.list_users().await?;
        Ok(users.iter().map(User::view).collect())
    }

    /// Register a new user
    pub async fn create(&self, input: CreateUser) -> Result<User> {
        if self.integrity.username_taken(&input.username, None).await? {
            return Err(Error::conflict(DUPLICATE_USERNAME));
        }

        let password_hash = hash_password_blocking(input.password).await?;
        let user = User::new(input.username, password_hash, input.roles);
        self.store
            .insert_user(user.clone())
            .await
            .map_err(duplicate_username)?;

        Metrics::global().users_created.inc();
        tracing::info!(user = %user.id, username = %user.username, "User created");
        Ok(user)
    }

    /// Replace a user's username, roles and active flag; re-hash the password if one is given
    pub async fn update(&self, input: UserUpdate) -> Result<User> {
        let mut user = self
            .store
            .find_user(input.id)
            .await?
            .ok_or_else(|| Error::not_found("User not found."))?;

        if self
            .integrity
            .username_taken(&input.username, Some(input.id))
            .await?
        {
            return Err(Error::conflict(DUPLICATE_USERNAME));
        }

        user.username = input.username;
        user.roles = input.roles;
        user.active = input.active;
        if let Some(password) = input.password {
            user.password_hash = hash_password_blocking(password).await?;
        }

        self.store
            .save_user(user.clone())
            .await
            .map_err(duplicate_username)?;

        Metrics::global().users_updated.inc();
        tracing::info!(user = %user.id, username = %user.username, "User updated");
        Ok(user)
    }

    /// Delete a user that has no notes assigned
    pub async fn delete(&self, id: Id) -> Result<User> {
        if self.integrity.user_has_notes(id).await? {
            return Err(Error::AssignedNotes("User has assigned notes.".to_string()));
        }

        if !self.integrity.user_exists(id).await? {
            return Err(Error::not_found("User not found."));
        }

        let user = self
            .store
            .delete_user(id)
            .await?
            .ok_or_else(|| Error::not_found("User not found."))?;

        Metrics::global().users_deleted.inc();
        tracing::info!(user = %id, username = %user.username, "User deleted");
        Ok(user)
    }
}

/// The store's unique index caught a name the advisory check missed
fn duplicate_username(err: StorageError) -> Error {
    match err {
        StorageError::DuplicateKey { key, .. } => {
            tracing::warn!(username = %key, "Concurrent registration rejected by unique index");
            Error::conflict(DUPLICATE_USERNAME)
        }
        other => other.into(),
    }
}
