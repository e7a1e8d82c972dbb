//! Request bodies and their validation
//!
//! Bodies arrive loosely typed: any field may be missing, `null`, or of the
//! wrong JSON type. Each body is turned into a typed command from
//! [`crate::services`] or rejected with a validation error before any store
//! access happens.

use axum::extract::{rejection::JsonRejection, FromRequest, Request};
use axum::http::header::CONTENT_TYPE;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::core::error::{Error, Result};
use crate::core::types::{Id, Role};
use crate::services::{CreateNote, CreateUser, NotePatch, UserUpdate};

const ALL_FIELDS_REQUIRED: &str = "All fields are required.";
const INVALID_ID: &str = "Invalid id format.";

/// JSON extractor that answers every rejection with a `{message}` body.
///
/// A request without a JSON content type is read as an empty object, so the
/// handler reports the missing fields instead of a media type error.
pub struct JsonRequest<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for JsonRequest<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        if !has_json_content_type(&req) {
            return Ok(JsonRequest(T::default()));
        }

        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonRequest(value)),
            Err(rejection) => {
                let message = match rejection {
                    JsonRejection::JsonDataError(err) => {
                        tracing::debug!("Invalid JSON data: {}", err);
                        "Invalid JSON data."
                    }
                    JsonRejection::JsonSyntaxError(_) => "Malformed JSON.",
                    JsonRejection::MissingJsonContentType(_) => {
                        "Expected an application/json request body."
                    }
                    JsonRejection::BytesRejection(_) => "Failed to read request body.",
                    _ => "Invalid JSON request.",
                };
                tracing::warn!("JSON parsing error: {}", message);
                Err(Error::validation(message))
            }
        }
    }
}

fn has_json_content_type(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

/// Body of every `/notes` request
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NoteBody {
    pub id: Option<Value>,
    pub user: Option<Value>,
    pub title: Option<Value>,
    pub text: Option<Value>,
    pub completed: Option<Value>,
}

/// Body of every `/users` request
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UserBody {
    pub id: Option<Value>,
    pub username: Option<Value>,
    pub password: Option<Value>,
    pub roles: Option<Value>,
    pub active: Option<Value>,
}

/// Validated delete command
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeleteById {
    pub id: Id,
}

impl NoteBody {
    /// Validate a create request
    pub fn into_create(self) -> Result<CreateNote> {
        let (Some(user), Some(title), Some(text)) = (
            text_field(&self.user),
            text_field(&self.title),
            text_field(&self.text),
        ) else {
            return Err(Error::validation(ALL_FIELDS_REQUIRED));
        };

        Ok(CreateNote {
            user: parse_id(&user)?,
            title,
            text,
        })
    }

    /// Validate a partial update request
    pub fn into_patch(self) -> Result<(Id, NotePatch)> {
        let id = text_field(&self.id).ok_or_else(|| Error::validation("ID is required."))?;
        let id = parse_id(&id)?;

        let user = text_field(&self.user).map(|u| parse_id(&u)).transpose()?;
        let title = text_field(&self.title);
        let text = text_field(&self.text);

        let completed = match &self.completed {
            None | Some(Value::Null) => None,
            Some(Value::Bool(completed)) => Some(*completed),
            Some(_) if user.is_none() && title.is_none() && text.is_none() => {
                return Err(Error::validation("No fields to update."));
            }
            Some(_) => return Err(Error::validation("Completed must be a boolean.")),
        };

        Ok((
            id,
            NotePatch {
                user,
                title,
                text,
                completed,
            },
        ))
    }

    /// Validate a delete request
    pub fn into_delete(self) -> Result<DeleteById> {
        delete_by_id(&self.id, "Note ID required.")
    }
}

impl UserBody {
    /// Validate a create request
    pub fn into_create(self) -> Result<CreateUser> {
        let (Some(username), Some(password), Some(roles)) = (
            text_field(&self.username),
            text_field(&self.password),
            roles_field(&self.roles)?,
        ) else {
            return Err(Error::validation(ALL_FIELDS_REQUIRED));
        };

        Ok(CreateUser {
            username,
            password,
            roles,
        })
    }

    /// Validate a full update request
    pub fn into_update(self) -> Result<UserUpdate> {
        let active = match self.active {
            Some(Value::Bool(active)) => Some(active),
            _ => None,
        };
        let (Some(id), Some(username), Some(roles), Some(active)) = (
            text_field(&self.id),
            text_field(&self.username),
            roles_field(&self.roles)?,
            active,
        ) else {
            return Err(Error::validation(ALL_FIELDS_REQUIRED));
        };

        Ok(UserUpdate {
            id: parse_id(&id)?,
            username,
            roles,
            active,
            password: text_field(&self.password),
        })
    }

    /// Validate a delete request
    pub fn into_delete(self) -> Result<DeleteById> {
        delete_by_id(&self.id, "User ID Required.")
    }
}

/// A non-empty string; `null`, `""` and non-string values count as absent
fn text_field(value: &Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn parse_id(raw: &str) -> Result<Id> {
    raw.parse().map_err(|_| Error::validation(INVALID_ID))
}

fn delete_by_id(value: &Option<Value>, missing: &str) -> Result<DeleteById> {
    let id = text_field(value).ok_or_else(|| Error::validation(missing))?;
    Ok(DeleteById { id: parse_id(&id)? })
}

/// A non-empty array of role names, de-duplicated in order.
///
/// Anything other than a non-empty array is reported as absent; an unknown
/// role name is an error of its own.
fn roles_field(value: &Option<Value>) -> Result<Option<Vec<Role>>> {
    let Some(Value::Array(items)) = value else {
        return Ok(None);
    };
    if items.is_empty() {
        return Ok(None);
    }

    let mut roles = Vec::with_capacity(items.len());
    for item in items {
        let role: Role = match item {
            Value::String(name) => name.parse().map_err(Error::validation)?,
            other => return Err(Error::validation(format!("Unknown role: {}", other))),
        };
        if !roles.contains(&role) {
            roles.push(role);
        }
    }
    Ok(Some(roles))
}
