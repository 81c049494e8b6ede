use crate::error::ApiError;
use crate::store::Collection;

use serde::Serialize;
use uuid::Uuid;

pub mod community;
pub mod course;
pub mod notification;
pub mod quiz;
pub mod showcase;
pub mod user;

/// Trims `value` and rejects it when nothing is left.
pub(crate) fn require_text(value: &str, field: &'static str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Trims each entry, drops blanks and duplicates, keeps first-seen order.
pub(crate) fn clean_list(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let trimmed = value.trim();
        if trimmed.is_empty() || out.iter().any(|existing| existing == trimmed) {
            continue;
        }
        out.push(trimmed.to_string());
    }
    out
}

/// Small author/member card embedded in community responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub avatar: Option<String>,
}

impl UserRef {
    pub(crate) fn lookup(users: &Collection<user::User>, id: Uuid) -> Option<Self> {
        users.get(id).map(|user| Self {
            id: user.id,
            name: user.name.clone(),
            username: user.username.clone(),
            avatar: user.avatar.clone(),
        })
    }
}
