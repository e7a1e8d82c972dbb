//! Note service
//!
//! Creation checks the owner, draws a ticket, then writes the note. Updates
//! are partial: only the fields present in a [`NotePatch`] touch the stored
//! note.

use chrono::Utc;
use serde::Serialize;

use crate::core::error::{Error, Result};
use crate::core::types::{Id, Note};
use crate::services::{IntegrityChecker, TicketAllocator};
use crate::storage::SharedStore;
use crate::system::metrics::Metrics;

/// Validated input for creating a note
#[derive(Debug, Clone, PartialEq)]
pub struct CreateNote {
    pub user: Id,
    pub title: String,
    pub text: String,
}

/// Validated partial update of a note. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotePatch {
    pub user: Option<Id>,
    pub title: Option<String>,
    pub text: Option<String>,
    pub completed: Option<bool>,
}

/// Fields written by an update, echoed back to the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChangedFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

/// A freshly created note together with its owner's username
#[derive(Debug, Clone)]
pub struct CreatedNote {
    pub note: Note,
    pub username: String,
}

impl NotePatch {
    /// Whether the patch carries at least one field
    pub fn has_changes(&self) -> bool {
        self.user.is_some() || self.title.is_some() || self.text.is_some() || self.completed.is_some()
    }

    /// Merge present fields into `note` and report what was written.
    ///
    /// The owner is re-bound here but reported by the caller, which knows the
    /// owner's username.
    pub fn apply(&self, note: &mut Note) -> ChangedFields {
        let mut changed = ChangedFields::default();

        if let Some(user) = self.user {
            note.user = user;
        }
        if let Some(title) = &self.title {
            note.title = title.clone();
            changed.title = Some(title.clone());
        }
        if let Some(text) = &self.text {
            note.text = text.clone();
            changed.text = Some(text.clone());
        }
        if let Some(completed) = self.completed {
            note.completed = completed;
            changed.completed = Some(completed);
        }

        if self.has_changes() {
            note.updated_at = Utc::now();
        }
        changed
    }
}

/// CRUD over notes
#[derive(Clone)]
pub struct NoteService {
    store: SharedStore,
    integrity: IntegrityChecker,
    tickets: TicketAllocator,
}

impl NoteService {
    /// Create a service over `store`
    pub fn new(store: SharedStore, integrity: IntegrityChecker, tickets: TicketAllocator) -> Self {
        Self {
            store,
            integrity,
            tickets,
        }
    }

    /// All notes, ordered by ticket. May be empty.
    pub async fn list(&self) -> Result<Vec<Note>> {
        Ok(self.store.list_notes().await?)
    }

    /// Create a note for an existing user.
    ///
    /// The ticket is taken before the note is written; if the write fails the
    /// ticket is not reused.
    pub async fn create(&self, input: CreateNote) -> Result<CreatedNote> {
        let owner = self.integrity.require_user(input.user).await?;
        let ticket = self.tickets.allocate_next_ticket().await?;

        let note = Note::new(ticket, owner.id, input.title, input.text);
        self.store.insert_note(note.clone()).await.map_err(|e| {
            tracing::warn!(ticket, error = %e, "Note write failed, ticket skipped");
            Error::from(e)
        })?;

        Metrics::global().notes_created.inc();
        tracing::info!(note = %note.id, ticket, user = %owner.username, "Note created");

        Ok(CreatedNote {
            note,
            username: owner.username,
        })
    }

    /// Apply a partial update to note `id`
    pub async fn update(&self, id: Id, patch: NotePatch) -> Result<ChangedFields> {
        if !patch.has_changes() {
            return Err(Error::validation("No fields to update."));
        }

        let mut note = self
            .store
            .find_note(id)
            .await?
            .ok_or_else(|| Error::not_found("Note not found."))?;

        let owner = match patch.user {
            Some(user_id) => Some(self.integrity.require_user(user_id).await?),
            None => None,
        };

        let mut changed = patch.apply(&mut note);
        changed.username = owner.map(|user| user.username);

        self.store.save_note(note).await?;

        Metrics::global().notes_updated.inc();
        tracing::info!(note = %id, ?changed, "Note updated");
        Ok(changed)
    }

    /// Delete note `id`, returning the removed note
    pub async fn delete(&self, id: Id) -> Result<Note> {
        if self.store.find_note(id).await?.is_none() {
            return Err(Error::not_found("Note not found."));
        }

        let note = self
            .store
            .delete_note(id)
            .await?
            .ok_or_else(|| Error::not_found("Note not found."))?;

        Metrics::global().notes_deleted.inc();
        tracing::info!(note = %id, ticket = note.ticket, "Note deleted");
        Ok(note)
    }
}
