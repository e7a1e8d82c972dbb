/// In-memory document store backed by sharded concurrent maps.
///
/// Each collection is a `DashMap`, so reads and writes on different keys do
/// not contend. Two operations rely on the entry API holding the shard lock:
/// - username uniqueness: the `usernames` index is claimed before the user
///   document is written, so two concurrent inserts of the same name cannot
///   both succeed
/// - counter increments: the read-modify-write of `seq` happens under the
///   entry's lock, so concurrent increments never observe the same value
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::core::error::StorageError;
use crate::core::types::{Counter, Id, Note, User};
use crate::storage::{DocumentStore, StoreResult};

const USERNAME_INDEX: &str = "username";

/// In-memory implementation of [`DocumentStore`]
#[derive(Debug, Default)]
pub struct MemStore {
    users: DashMap<Id, User>,
    usernames: DashMap<String, Id>,
    notes: DashMap<Id, Note>,
    counters: DashMap<String, u64>,
}

impl MemStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from previously persisted collections
    pub fn from_parts(users: Vec<User>, notes: Vec<Note>, counters: Vec<Counter>) -> StoreResult<Self> {
        let store = Self::new();
        for user in users {
            store.claim_username(&user.username, user.id)?;
            store.users.insert(user.id, user);
        }
        for note in notes {
            store.notes.insert(note.id, note);
        }
        for counter in counters {
            store.counters.insert(counter.id, counter.seq);
        }
        Ok(store)
    }

    /// Number of stored users
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Number of stored notes
    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    /// Snapshot of the users collection
    pub fn users_snapshot(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.iter().map(|e| e.value().clone()).collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users
    }

    /// Snapshot of the notes collection
    pub fn notes_snapshot(&self) -> Vec<Note> {
        let mut notes: Vec<Note> = self.notes.iter().map(|e| e.value().clone()).collect();
        notes.sort_by_key(|note| note.ticket);
        notes
    }

    /// Snapshot of the counters collection
    pub fn counters_snapshot(&self) -> Vec<Counter> {
        let mut counters: Vec<Counter> = self
            .counters
            .iter()
            .map(|e| Counter {
                id: e.key().clone(),
                seq: *e.value(),
            })
            .collect();
        counters.sort_by(|a, b| a.id.cmp(&b.id));
        counters
    }

    /// Put a counter back to `previous`, removing it when it did not exist
    pub(crate) fn restore_counter(&self, id: &str, previous: Option<u64>) {
        match previous {
            Some(seq) => {
                self.counters.insert(id.to_string(), seq);
            }
            None => {
                self.counters.remove(id);
            }
        }
    }

    /// Reserve `username` for `owner` in the unique index
    fn claim_username(&self, username: &str, owner: Id) -> StoreResult<()> {
        match self.usernames.entry(username.to_string()) {
            Entry::Occupied(slot) if *slot.get() != owner => Err(StorageError::DuplicateKey {
                index: USERNAME_INDEX,
                key: username.to_string(),
            }),
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(owner);
                Ok(())
            }
        }
    }

    fn release_username(&self, username: &str, owner: Id) {
        self.usernames.remove_if(username, |_, holder| *holder == owner);
    }
}

#[async_trait]
impl DocumentStore for MemStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn find_user(&self, id: Id) -> StoreResult<Option<User>> {
        Ok(self.users.get(&id).map(|e| e.value().clone()))
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let owner = self.usernames.get(username).map(|e| *e.value());
        Ok(owner.and_then(|id| self.users.get(&id).map(|e| e.value().clone())))
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.users_snapshot())
    }

    async fn insert_user(&self, user: User) -> StoreResult<()> {
        self.claim_username(&user.username, user.id)?;
        self.users.insert(user.id, user);
        Ok(())
    }

    async fn save_user(&self, user: User) -> StoreResult<()> {
        // The user's entry stays locked until the index and document agree,
        // so concurrent saves of one user apply one after the other
        match self.users.entry(user.id) {
            Entry::Occupied(mut slot) => {
                let previous = slot.get().username.clone();
                if previous != user.username {
                    self.claim_username(&user.username, user.id)?;
                    self.release_username(&previous, user.id);
                }
                slot.insert(user);
            }
            Entry::Vacant(slot) => {
                self.claim_username(&user.username, user.id)?;
                slot.insert(user);
            }
        }
        Ok(())
    }

    async fn delete_user(&self, id: Id) -> StoreResult<Option<User>> {
        Ok(self.users.remove(&id).map(|(_, user)| {
            self.release_username(&user.username, id);
            user
        }))
    }

    async fn find_note(&self, id: Id) -> StoreResult<Option<Note>> {
        Ok(self.notes.get(&id).map(|e| e.value().clone()))
    }

    async fn find_note_by_user(&self, user: Id) -> StoreResult<Option<Note>> {
        Ok(self
            .notes
            .iter()
            .find(|e| e.value().user == user)
            .map(|e| e.value().clone()))
    }

    async fn list_notes(&self) -> StoreResult<Vec<Note>> {
        Ok(self.notes_snapshot())
    }

    async fn insert_note(&self, note: Note) -> StoreResult<()> {
        self.notes.insert(note.id, note);
        Ok(())
    }

    async fn save_note(&self, note: Note) -> StoreResult<()> {
        self.notes.insert(note.id, note);
        Ok(())
    }

    async fn delete_note(&self, id: Id) -> StoreResult<Option<Note>> {
        Ok(self.notes.remove(&id).map(|(_, note)| note))
    }

    async fn find_counter(&self, id: &str) -> StoreResult<Option<Counter>> {
        Ok(self.counters.get(id).map(|e| Counter {
            id: id.to_string(),
            seq: *e.value(),
        }))
    }

    async fn insert_counter_if_absent(&self, counter: Counter) -> StoreResult<bool> {
        match self.counters.entry(counter.id) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(counter.seq);
                Ok(true)
            }
        }
    }

    async fn increment_counter(&self, id: &str, seed: u64) -> StoreResult<u64> {
        let mut seq = self.counters.entry(id.to_string()).or_insert(seed);
        let next = seq
            .checked_add(1)
            .ok_or_else(|| StorageError::CounterExhausted(id.to_string()))?;
        *seq = next;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Role;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn user(name: &str) -> User {
        User::new(name, "hash", vec![Role::Employee])
    }

    #[tokio::test]
    async fn test_insert_and_find_user() {
        let store = MemStore::new();
        let alice = user("alice");
        store.insert_user(alice.clone()).await.unwrap();

        assert_eq!(store.find_user(alice.id).await.unwrap(), Some(alice.clone()));
        assert_eq!(
            store.find_user_by_username("alice").await.unwrap().map(|u| u.id),
            Some(alice.id)
        );
        assert!(store.find_user_by_username("Alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_username_index() {
        let store = MemStore::new();
        store.insert_user(user("alice")).await.unwrap();

        let err = store.insert_user(user("alice")).await.unwrap_err();
        assert!(matches!(err, StorageError::DuplicateKey { index: "username", .. }));
        assert_eq!(store.user_count(), 1);
    }

    #[tokio::test]
    async fn test_rename_moves_index_entry() {
        let store = MemStore::new();
        let mut alice = user("alice");
        store.insert_user(alice.clone()).await.unwrap();

        alice.username = "alicia".into();
        store.save_user(alice.clone()).await.unwrap();

        assert!(store.find_user_by_username("alice").await.unwrap().is_none());
        assert!(store.find_user_by_username("alicia").await.unwrap().is_some());

        // The old name is free again
        store.insert_user(user("alice")).await.unwrap();
    }

    #[tokio::test]
    async fn test_rename_onto_taken_name_fails() {
        let store = MemStore::new();
        store.insert_user(user("alice")).await.unwrap();
        let mut bob = user("bob");
        store.insert_user(bob.clone()).await.unwrap();

        bob.username = "alice".into();
        assert!(store.save_user(bob.clone()).await.is_err());
        assert_eq!(store.find_user(bob.id).await.unwrap().unwrap().username, "bob");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_renames_keep_index_consistent() {
        for _ in 0..200 {
            let store = Arc::new(MemStore::new());
            let alice = user("alice");
            store.insert_user(alice.clone()).await.unwrap();

            let renames: Vec<_> = ["x", "y"]
                .into_iter()
                .map(|name| {
                    let store = store.clone();
                    let mut renamed = alice.clone();
                    renamed.username = name.into();
                    tokio::spawn(async move { store.save_user(renamed).await.unwrap() })
                })
                .collect();
            for rename in renames {
                rename.await.unwrap();
            }

            let winner = store.find_user(alice.id).await.unwrap().unwrap().username;
            let loser = if winner == "x" { "y" } else { "x" };
            assert_eq!(
                store.find_user_by_username(&winner).await.unwrap().map(|u| u.id),
                Some(alice.id)
            );
            assert!(store.find_user_by_username(loser).await.unwrap().is_none());
            assert!(store.find_user_by_username("alice").await.unwrap().is_none());
            store.insert_user(user(loser)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_restore_counter() {
        let store = MemStore::new();
        store.increment_counter("ticketId", 499).await.unwrap();
        store.restore_counter("ticketId", Some(499));
        assert_eq!(store.find_counter("ticketId").await.unwrap().unwrap().seq, 499);

        store.restore_counter("ticketId", None);
        assert!(store.find_counter("ticketId").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_user_releases_username() {
        let store = MemStore::new();
        let alice = user("alice");
        store.insert_user(alice.clone()).await.unwrap();

        let removed = store.delete_user(alice.id).await.unwrap();
        assert_eq!(removed.map(|u| u.id), Some(alice.id));
        assert!(store.delete_user(alice.id).await.unwrap().is_none());
        store.insert_user(user("alice")).await.unwrap();
    }

    #[tokio::test]
    async fn test_find_note_by_user() {
        let store = MemStore::new();
        let owner = Id::random();
        assert!(store.find_note_by_user(owner).await.unwrap().is_none());

        store.insert_note(Note::new(1, owner, "t", "x")).await.unwrap();
        store.insert_note(Note::new(2, Id::random(), "t", "x")).await.unwrap();

        let found = store.find_note_by_user(owner).await.unwrap().unwrap();
        assert_eq!(found.ticket, 1);
    }

    #[tokio::test]
    async fn test_notes_listed_by_ticket() {
        let store = MemStore::new();
        let owner = Id::random();
        for ticket in [503, 500, 502, 501] {
            store.insert_note(Note::new(ticket, owner, "t", "x")).await.unwrap();
        }

        let tickets: Vec<u64> = store.list_notes().await.unwrap().iter().map(|n| n.ticket).collect();
        assert_eq!(tickets, vec![500, 501, 502, 503]);
    }

    #[tokio::test]
    async fn test_increment_seeds_missing_counter() {
        let store = MemStore::new();
        assert_eq!(store.increment_counter("ticketId", 499).await.unwrap(), 500);
        assert_eq!(store.increment_counter("ticketId", 499).await.unwrap(), 501);
        assert_eq!(store.find_counter("ticketId").await.unwrap().unwrap().seq, 501);
    }

    #[tokio::test]
    async fn test_insert_counter_if_absent_keeps_existing() {
        let store = MemStore::new();
        let counter = Counter { id: "ticketId".into(), seq: 499 };
        assert!(store.insert_counter_if_absent(counter.clone()).await.unwrap());

        store.increment_counter("ticketId", 499).await.unwrap();
        assert!(!store.insert_counter_if_absent(counter).await.unwrap());
        assert_eq!(store.find_counter("ticketId").await.unwrap().unwrap().seq, 500);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_unique() {
        let store = Arc::new(MemStore::new());
        let mut handles = Vec::new();
        for _ in 0..200 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.increment_counter("ticketId", 0).await.unwrap()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            assert!(seen.insert(handle.await.unwrap()));
        }
        assert_eq!(seen.len(), 200);
        assert_eq!(seen.iter().max(), Some(&200));
    }

    #[tokio::test]
    async fn test_exhausted_counter_is_an_error() {
        let store = MemStore::new();
        let err = store.increment_counter("ticketId", u64::MAX).await.unwrap_err();
        assert!(matches!(err, StorageError::CounterExhausted(ref id) if id == "ticketId"));

        // The stored value never wraps
        assert_eq!(store.find_counter("ticketId").await.unwrap().unwrap().seq, u64::MAX);
        assert!(store.increment_counter("ticketId", 0).await.is_err());
    }

    #[test]
    fn test_from_parts_rejects_duplicate_usernames() {
        let result = MemStore::from_parts(vec![user("alice"), user("alice")], Vec::new(), Vec::new());
        assert!(result.is_err());
    }
}
