//! Document types persisted by the store
//!
//! Users, notes and counters are the three collections of the service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Document identifier shared by users and notes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(Uuid);

impl Id {
    /// Generate a fresh random identifier
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Id {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Role tag carried by a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Default role for every new user
    Employee,
    /// Can manage notes of other users
    Manager,
    /// Full access
    Admin,
}

impl Default for Role {
    fn default() -> Self {
        Role::Employee
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Employee" => Ok(Role::Employee),
            "Manager" => Ok(Role::Manager),
            "Admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// User document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Id,
    pub username: String,
    pub password_hash: String,
    pub roles: Vec<Role>,
    pub active: bool,
}

impl User {
    /// New active user with a fresh id
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>, roles: Vec<Role>) -> Self {
        let roles = if roles.is_empty() { vec![Role::default()] } else { roles };
        Self {
            id: Id::random(),
            username: username.into(),
            password_hash: password_hash.into(),
            roles,
            active: true,
        }
    }

    /// Projection without the password hash
    pub fn view(&self) -> UserView {
        UserView {
            id: self.id,
            username: self.username.clone(),
            roles: self.roles.clone(),
            active: self.active,
        }
    }
}

/// User as returned by listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Id,
    pub username: String,
    pub roles: Vec<Role>,
    pub active: bool,
}

/// Note document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: Id,
    pub ticket: u64,
    pub user: Id,
    pub title: String,
    pub text: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// New open note stamped with the current time
    pub fn new(ticket: u64, user: Id, title: impl Into<String>, text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Id::random(),
            ticket,
            user,
            title: title.into(),
            text: text.into(),
            completed: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Named sequence record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub id: String,
    pub seq: u64,
}
