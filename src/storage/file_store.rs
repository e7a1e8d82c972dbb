//! Disk-backed store
//!
//! Keeps the working set in a [`MemStore`] and rewrites a JSON snapshot of
//! the touched collection after every mutation. Snapshots are written to a
//! temporary file and renamed into place so a crash never leaves a
//! half-written collection behind. A mutation whose snapshot cannot be
//! written is undone in memory before the error is returned.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::core::error::StorageError;
use crate::core::types::{Counter, Id, Note, User};
use crate::storage::{DocumentStore, MemStore, StoreResult};

const USERS_FILE: &str = "users.json";
const NOTES_FILE: &str = "notes.json";
const COUNTERS_FILE: &str = "counters.json";

#[derive(Clone, Copy)]
enum Collection {
    Users,
    Notes,
    Counters,
}

impl Collection {
    fn file_name(self) -> &'static str {
        match self {
            Collection::Users => USERS_FILE,
            Collection::Notes => NOTES_FILE,
            Collection::Counters => COUNTERS_FILE,
        }
    }
}

/// JSON-snapshot implementation of [`DocumentStore`]
#[derive(Debug)]
pub struct FileStore {
    data_dir: PathBuf,
    inner: MemStore,
    // Held for a whole mutation: memory change, snapshot, and any undo
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open (or create) a store rooted at `data_dir`
    pub async fn open(data_dir: impl AsRef<Path>) -> StoreResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&data_dir).await?;

        let users: Vec<User> = read_collection(&data_dir.join(USERS_FILE)).await?;
        let notes: Vec<Note> = read_collection(&data_dir.join(NOTES_FILE)).await?;
        let counters: Vec<Counter> = read_collection(&data_dir.join(COUNTERS_FILE)).await?;

        tracing::info!(
            data_dir = %data_dir.display(),
            users = users.len(),
            notes = notes.len(),
            counters = counters.len(),
            "Loaded document snapshots"
        );

        Ok(Self {
            inner: MemStore::from_parts(users, notes, counters)?,
            data_dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Write the snapshot of `collection`. Callers hold `write_lock`.
    async fn write_snapshot(&self, collection: Collection) -> StoreResult<()> {
        let bytes = match collection {
            Collection::Users => encode(&self.inner.users_snapshot())?,
            Collection::Notes => encode(&self.inner.notes_snapshot())?,
            Collection::Counters => encode(&self.inner.counters_snapshot())?,
        };

        let target = self.data_dir.join(collection.file_name());
        let tmp = target.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &target).await?;

        tracing::trace!(file = %target.display(), "Snapshot written");
        Ok(())
    }
}

fn rolled_back(collection: Collection, err: StorageError) -> StorageError {
    tracing::warn!(
        file = collection.file_name(),
        error = %err,
        "Snapshot write failed, change rolled back"
    );
    err
}

fn encode<T: Serialize>(docs: &T) -> StoreResult<Vec<u8>> {
    serde_json::to_vec_pretty(docs).map_err(|e| StorageError::Corruption(e.to_string()))
}

async fn read_collection<T: DeserializeOwned>(path: &Path) -> StoreResult<Vec<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map_err(|e| StorageError::Corruption(format!("{}: {}", path.display(), e))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn ping(&self) -> StoreResult<()> {
        let meta = tokio::fs::metadata(&self.data_dir)
            .await
            .map_err(|e| StorageError::Unavailable(format!("{}: {}", self.data_dir.display(), e)))?;
        if !meta.is_dir() {
            return Err(StorageError::Unavailable(format!(
                "{} is not a directory",
                self.data_dir.display()
            )));
        }
        Ok(())
    }

    async fn find_user(&self, id: Id) -> StoreResult<Option<User>> {
        self.inner.find_user(id).await
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        self.inner.find_user_by_username(username).await
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        self.inner.list_users().await
    }

    async fn insert_user(&self, user: User) -> StoreResult<()> {
        let _write = self.write_lock.lock().await;
        let id = user.id;
        self.inner.insert_user(user).await?;

        if let Err(e) = self.write_snapshot(Collection::Users).await {
            self.inner.delete_user(id).await?;
            return Err(rolled_back(Collection::Users, e));
        }
        Ok(())
    }

    async fn save_user(&self, user: User) -> StoreResult<()> {
        let _write = self.write_lock.lock().await;
        let id = user.id;
        let previous = self.inner.find_user(id).await?;
        self.inner.save_user(user).await?;

        if let Err(e) = self.write_snapshot(Collection::Users).await {
            match previous {
                Some(previous) => self.inner.save_user(previous).await?,
                None => {
                    self.inner.delete_user(id).await?;
                }
            }
            return Err(rolled_back(Collection::Users, e));
        }
        Ok(())
    }

    async fn delete_user(&self, id: Id) -> StoreResult<Option<User>> {
        let _write = self.write_lock.lock().await;
        let Some(removed) = self.inner.delete_user(id).await? else {
            return Ok(None);
        };

        if let Err(e) = self.write_snapshot(Collection::Users).await {
            self.inner.insert_user(removed).await?;
            return Err(rolled_back(Collection::Users, e));
        }
        Ok(Some(removed))
    }

    async fn find_note(&self, id: Id) -> StoreResult<Option<Note>> {
        self.inner.find_note(id).await
    }

    async fn find_note_by_user(&self, user: Id) -> StoreResult<Option<Note>> {
        self.inner.find_note_by_user(user).await
    }

    async fn list_notes(&self) -> StoreResult<Vec<Note>> {
        self.inner.list_notes().await
    }

    async fn insert_note(&self, note: Note) -> StoreResult<()> {
        let _write = self.write_lock.lock().await;
        let id = note.id;
        self.inner.insert_note(note).await?;

        if let Err(e) = self.write_snapshot(Collection::Notes).await {
            self.inner.delete_note(id).await?;
            return Err(rolled_back(Collection::Notes, e));
        }
        Ok(())
    }

    async fn save_note(&self, note: Note) -> StoreResult<()> {
        let _write = self.write_lock.lock().await;
        let id = note.id;
        let previous = self.inner.find_note(id).await?;
        self.inner.save_note(note).await?;

        if let Err(e) = self.write_snapshot(Collection::Notes).await {
            match previous {
                Some(previous) => self.inner.save_note(previous).await?,
                None => {
                    self.inner.delete_note(id).await?;
                }
            }
            return Err(rolled_back(Collection::Notes, e));
        }
        Ok(())
    }

    async fn delete_note(&self, id: Id) -> StoreResult<Option<Note>> {
        let _write = self.write_lock.lock().await;
        let Some(removed) = self.inner.delete_note(id).await? else {
            return Ok(None);
        };

        if let Err(e) = self.write_snapshot(Collection::Notes).await {
            self.inner.insert_note(removed).await?;
            return Err(rolled_back(Collection::Notes, e));
        }
        Ok(Some(removed))
    }

    async fn find_counter(&self, id: &str) -> StoreResult<Option<Counter>> {
        self.inner.find_counter(id).await
    }

    async fn insert_counter_if_absent(&self, counter: Counter) -> StoreResult<bool> {
        let _write = self.write_lock.lock().await;
        let id = counter.id.clone();
        if !self.inner.insert_counter_if_absent(counter).await? {
            return Ok(false);
        }

        if let Err(e) = self.write_snapshot(Collection::Counters).await {
            self.inner.restore_counter(&id, None);
            return Err(rolled_back(Collection::Counters, e));
        }
        Ok(true)
    }

    async fn increment_counter(&self, id: &str, seed: u64) -> StoreResult<u64> {
        let _write = self.write_lock.lock().await;
        let previous = self.inner.find_counter(id).await?.map(|counter| counter.seq);
        let seq = self.inner.increment_counter(id, seed).await?;

        // A failed write means the value was never handed out
        if let Err(e) = self.write_snapshot(Collection::Counters).await {
            self.inner.restore_counter(id, previous);
            return Err(rolled_back(Collection::Counters, e));
        }
        Ok(seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Role;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_empty_dir() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("nested")).await.unwrap();
        assert!(store.list_users().await.unwrap().is_empty());
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_documents_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let alice = User::new("alice", "hash", vec![Role::Manager]);

        {
            let store = FileStore::open(dir.path()).await.unwrap();
            store.insert_user(alice.clone()).await.unwrap();
            let ticket = store.increment_counter("ticketId", 499).await.unwrap();
            store.insert_note(Note::new(ticket, alice.id, "t", "x")).await.unwrap();
        }

        let store = FileStore::open(dir.path()).await.unwrap();
        assert_eq!(store.find_user(alice.id).await.unwrap(), Some(alice.clone()));
        assert_eq!(store.find_note_by_user(alice.id).await.unwrap().unwrap().ticket, 500);
        assert_eq!(store.increment_counter("ticketId", 499).await.unwrap(), 501);
    }

    #[tokio::test]
    async fn test_unique_index_rebuilt_on_open() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileStore::open(dir.path()).await.unwrap();
            store.insert_user(User::new("alice", "hash", Vec::new())).await.unwrap();
        }

        let store = FileStore::open(dir.path()).await.unwrap();
        let err = store
            .insert_user(User::new("alice", "hash", Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateKey { .. }));
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_reported() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(NOTES_FILE), b"{not json").unwrap();

        let err = FileStore::open(dir.path()).await.unwrap_err();
        assert!(matches!(err, StorageError::Corruption(_)));
    }

    #[tokio::test]
    async fn test_ping_fails_when_dir_removed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data");
        let store = FileStore::open(&path).await.unwrap();

        std::fs::remove_dir_all(&path).unwrap();
        assert!(matches!(store.ping().await, Err(StorageError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_failed_user_write_is_rolled_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data");
        let store = FileStore::open(&path).await.unwrap();
        let alice = User::new("alice", "hash", vec![Role::Employee]);

        std::fs::remove_dir_all(&path).unwrap();
        assert!(store.insert_user(alice.clone()).await.is_err());
        assert!(store.find_user(alice.id).await.unwrap().is_none());
        assert!(store.find_user_by_username("alice").await.unwrap().is_none());

        // Retrying the same name is not a duplicate once the disk is back
        std::fs::create_dir_all(&path).unwrap();
        store.insert_user(alice.clone()).await.unwrap();
        let reopened = FileStore::open(&path).await.unwrap();
        assert_eq!(reopened.find_user(alice.id).await.unwrap(), Some(alice));
    }

    #[tokio::test]
    async fn test_failed_rename_and_delete_are_rolled_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data");
        let store = FileStore::open(&path).await.unwrap();
        let alice = User::new("alice", "hash", Vec::new());
        store.insert_user(alice.clone()).await.unwrap();

        std::fs::remove_dir_all(&path).unwrap();
        let mut renamed = alice.clone();
        renamed.username = "bob".into();
        assert!(store.save_user(renamed).await.is_err());
        assert_eq!(store.find_user(alice.id).await.unwrap(), Some(alice.clone()));
        assert!(store.find_user_by_username("bob").await.unwrap().is_none());
        assert_eq!(
            store.find_user_by_username("alice").await.unwrap().map(|u| u.id),
            Some(alice.id)
        );

        assert!(store.delete_user(alice.id).await.is_err());
        assert_eq!(store.find_user(alice.id).await.unwrap(), Some(alice.clone()));
        assert!(store.find_user_by_username("alice").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_note_write_is_rolled_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data");
        let store = FileStore::open(&path).await.unwrap();
        let note = Note::new(500, Id::random(), "t", "x");
        store.insert_note(note.clone()).await.unwrap();

        std::fs::remove_dir_all(&path).unwrap();
        assert!(store.insert_note(Note::new(501, note.user, "t2", "y")).await.is_err());
        assert_eq!(store.list_notes().await.unwrap(), vec![note.clone()]);

        let mut edited = note.clone();
        edited.completed = true;
        assert!(store.save_note(edited).await.is_err());
        assert!(!store.find_note(note.id).await.unwrap().unwrap().completed);

        assert!(store.delete_note(note.id).await.is_err());
        assert!(store.find_note(note.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_counter_write_is_rolled_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data");
        let store = FileStore::open(&path).await.unwrap();
        assert_eq!(store.increment_counter("ticketId", 499).await.unwrap(), 500);

        std::fs::remove_dir_all(&path).unwrap();
        assert!(store.increment_counter("ticketId", 499).await.is_err());
        assert_eq!(store.find_counter("ticketId").await.unwrap().unwrap().seq, 500);
        assert!(store
            .insert_counter_if_absent(Counter { id: "other".into(), seq: 1 })
            .await
            .is_err());
        assert!(store.find_counter("other").await.unwrap().is_none());

        std::fs::create_dir_all(&path).unwrap();
        assert_eq!(store.increment_counter("ticketId", 499).await.unwrap(), 501);
    }
}
