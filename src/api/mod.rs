//! # API Module
//!
//! HTTP interface of the service.
//!
//! ## Endpoints Overview
//!
//! ### Notes
//! - `GET /notes` - List notes
//! - `POST /notes` - Create a note, assigning the next ticket number
//! - `PATCH /notes` - Partially update a note
//! - `DELETE /notes` - Delete a note
//!
//! ### Users
//! - `GET /users` - List users without password hashes
//! - `POST /users` - Register a user
//! - `PATCH /users` - Update a user
//! - `DELETE /users` - Delete a user that has no notes
//!
//! ### System
//! - `GET /`, `/index`, `/index.html` - Landing page
//! - `GET /health` - Store health check
//!
//! Notes and users carry the target id in the JSON body, not in the path.
//! Anything unmatched falls through to the public directory and then to a
//! 404 negotiated on `Accept`.

pub mod handlers;
pub mod middleware;
pub mod requests;
pub mod server;

// Re-export commonly used items
pub use server::{create_app, start_metrics_server, start_server};
