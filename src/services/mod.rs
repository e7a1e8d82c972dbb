//! Domain services
//!
//! Handlers validate the wire format and hand typed input to these services,
//! which enforce referential integrity, allocate tickets and talk to the store.

pub mod counter;
pub mod integrity;
pub mod notes;
pub mod users;

pub use counter::TicketAllocator;
pub use integrity::IntegrityChecker;
pub use notes::{ChangedFields, CreateNote, CreatedNote, NotePatch, NoteService};
pub use users::{CreateUser, UserService, UserUpdate};
