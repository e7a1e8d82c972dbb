//! Storage and persistence layer
//!
//! The service talks to its documents only through [`DocumentStore`]. Each
//! backend keeps three collections (`users`, `notes`, `counters`) and offers
//! the lookups the services need plus an atomic increment-and-fetch on
//! counters.

use async_trait::async_trait;
use std::sync::Arc;

use crate::core::error::StorageError;
use crate::core::types::{Counter, Id, Note, User};

pub mod factory;
pub mod file_store;
pub mod mem_store;

pub use factory::create_store;
pub use file_store::FileStore;
pub use mem_store::MemStore;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StorageError>;

/// Store handle shared between request handlers
pub type SharedStore = Arc<dyn DocumentStore>;

/// Collection-level operations every backend provides.
///
/// Writes to `users` must keep usernames unique: `insert_user` and
/// `save_user` fail with [`StorageError::DuplicateKey`] instead of creating a
/// second user with the same name. `increment_counter` must be atomic with
/// respect to concurrent callers.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Check the store is reachable
    async fn ping(&self) -> StoreResult<()>;

    /// Find a user by id
    async fn find_user(&self, id: Id) -> StoreResult<Option<User>>;

    /// Find a user by exact username
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// All users, ordered by username
    async fn list_users(&self) -> StoreResult<Vec<User>>;

    /// Insert a new user
    async fn insert_user(&self, user: User) -> StoreResult<()>;

    /// Replace a stored user
    async fn save_user(&self, user: User) -> StoreResult<()>;

    /// Remove a user, returning the removed document
    async fn delete_user(&self, id: Id) -> StoreResult<Option<User>>;

    /// Find a note by id
    async fn find_note(&self, id: Id) -> StoreResult<Option<Note>>;

    /// Find any note assigned to `user`
    async fn find_note_by_user(&self, user: Id) -> StoreResult<Option<Note>>;

    /// All notes, ordered by ticket
    async fn list_notes(&self) -> StoreResult<Vec<Note>>;

    /// Insert a new note
    async fn insert_note(&self, note: Note) -> StoreResult<()>;

    /// Replace a stored note
    async fn save_note(&self, note: Note) -> StoreResult<()>;

    /// Remove a note, returning the removed document
    async fn delete_note(&self, id: Id) -> StoreResult<Option<Note>>;

    /// Read a counter without modifying it
    async fn find_counter(&self, id: &str) -> StoreResult<Option<Counter>>;

    /// Create `counter` unless one with the same id exists. Returns whether it was created.
    async fn insert_counter_if_absent(&self, counter: Counter) -> StoreResult<bool>;

    /// Increment the counter and return the new value.
    ///
    /// A missing counter is created with `seed` first, so the first call
    /// returns `seed + 1`.
    async fn increment_counter(&self, id: &str, seed: u64) -> StoreResult<u64>;
}
