use crate::error::ApiError;
use crate::store::Document;
use crate::types::require_text;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    pub created_by: Uuid,
    /// Users who have read this broadcast.
    #[serde(default)]
    pub read_by: Vec<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Document for Notification {
    const COLLECTION: &'static str = "notifications";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationInput {
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn new(
        input: NotificationInput,
        created_by: Uuid,
        now: OffsetDateTime,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            id: Uuid::new_v4(),
            title: require_text(&input.title, "title")?,
            message: require_text(&input.message, "message")?,
            created_by,
            read_by: Vec::new(),
            created_at: now,
        })
    }

    pub fn is_read_by(&self, user: Uuid) -> bool {
        self.read_by.contains(&user)
    }

    pub fn mark_read(&mut self, user: Uuid) {
        if !self.is_read_by(user) {
            self.read_by.push(user);
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    pub read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl NotificationView {
    pub fn for_user(notification: &Notification, user: Uuid) -> Self {
        Self {
            id: notification.id,
            title: notification.title.clone(),
            message: notification.message.clone(),
            read: notification.is_read_by(user),
            created_at: notification.created_at,
        }
    }
}
