//! Referential integrity checks
//!
//! The store has no foreign keys, so references are checked by hand before
//! writes. These are point-in-time reads: nothing is locked between a check
//! and the write that follows it.

use crate::core::error::{Error, Result};
use crate::core::types::{Id, User};
use crate::storage::SharedStore;

/// Existence and uniqueness checks against the store
#[derive(Clone)]
pub struct IntegrityChecker {
    store: SharedStore,
}

impl IntegrityChecker {
    /// Create a checker over `store`
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Whether a user with `user_id` exists
    pub async fn user_exists(&self, user_id: Id) -> Result<bool> {
        Ok(self.store.find_user(user_id).await?.is_some())
    }

    /// Load the user a write is about to reference, or fail with a reference error
    pub async fn require_user(&self, user_id: Id) -> Result<User> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or_else(|| Error::reference("User not found."))
    }

    /// Whether `username` belongs to a user other than `excluding`.
    ///
    /// Matching is exact and case-sensitive.
    pub async fn username_taken(&self, username: &str, excluding: Option<Id>) -> Result<bool> {
        let owner = self.store.find_user_by_username(username).await?;
        Ok(match (owner, excluding) {
            (Some(user), Some(id)) => user.id != id,
            (Some(_), None) => true,
            (None, _) => false,
        })
    }

    /// Whether any note is assigned to `user_id`
    pub async fn user_has_notes(&self, user_id: Id) -> Result<bool> {
        Ok(self.store.find_note_by_user(user_id).await?.is_some())
    }
}
