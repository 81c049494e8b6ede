use crate::error::ApiError;
use crate::store::Document;
use crate::types::require_text;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Reference to a file kept by the upload store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub path: String,
    pub url: String,
    pub content_type: String,
    pub original_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub file: Option<StoredFile>,
    pub created_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Document for Course {
    const COLLECTION: &'static str = "courses";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CourseInput {
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub content: String,
}

impl CourseInput {
    pub fn validated(self) -> Result<Self, ApiError> {
        Ok(Self {
            title: require_text(&self.title, "title")?,
            description: require_text(&self.description, "description")?,
            category: require_text(&self.category, "category")?,
            content: self.content,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoursePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub content: Option<String>,
}

impl Course {
    pub fn new(input: CourseInput, created_by: Uuid, now: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: input.title,
            description: input.description,
            category: input.category,
            content: input.content,
            file: None,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, patch: CoursePatch, now: OffsetDateTime) -> Result<(), ApiError> {
        if let Some(title) = patch.title {
            self.title = require_text(&title, "title")?;
        }
        if let Some(description) = patch.description {
            self.description = require_text(&description, "description")?;
        }
        if let Some(category) = patch.category {
            self.category = require_text(&category, "category")?;
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        self.updated_at = now;
        Ok(())
    }
}
