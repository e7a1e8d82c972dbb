//! Application State Management
//!
//! `AppState` holds the configuration, the store handle and the services
//! built on top of it. Handlers receive it as `State<Arc<AppState>>`.

use crate::core::config::Config;
use crate::services::{IntegrityChecker, NoteService, TicketAllocator, UserService};
use crate::storage::SharedStore;

/// Central application state holding all services and components
pub struct AppState {
    /// Application configuration
    pub config: Config,

    /// Document store shared by every service
    pub store: SharedStore,

    /// Ticket counter
    pub tickets: TicketAllocator,

    /// Note CRUD
    pub notes: NoteService,

    /// User CRUD
    pub users: UserService,
}

impl AppState {
    /// Wire the services over `store`
    pub fn new(store: SharedStore, config: Config) -> Self {
        let integrity = IntegrityChecker::new(store.clone());
        let tickets = TicketAllocator::new(store.clone(), &config.counter);
        let notes = NoteService::new(store.clone(), integrity.clone(), tickets.clone());
        let users = UserService::new(store.clone(), integrity);

        Self {
            config,
            store,
            tickets,
            notes,
            users,
        }
    }
}
