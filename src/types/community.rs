use crate::error::ApiError;
use crate::store::{Collection, Document};
use crate::types::user::User;
use crate::types::{UserRef, clean_list, require_text};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    pub fn delta(self) -> i64 {
        match self {
            VoteDirection::Up => 1,
            VoteDirection::Down => -1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub id: Uuid,
    pub body: String,
    pub author: Uuid,
    #[serde(default)]
    pub votes: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub author: Uuid,
    #[serde(default)]
    pub votes: i64,
    #[serde(default)]
    pub answers: Vec<Answer>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Document for Post {
    const COLLECTION: &'static str = "posts";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostInput {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnswerInput {
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoteInput {
    pub direction: VoteDirection,
}

impl Post {
    pub fn new(input: PostInput, author: Uuid, now: OffsetDateTime) -> Result<Self, ApiError> {
        Ok(Self {
            id: Uuid::new_v4(),
            title: require_text(&input.title, "title")?,
            body: require_text(&input.body, "body")?,
            tags: clean_list(input.tags)
                .into_iter()
                .map(|tag| tag.to_lowercase())
                .collect(),
            author,
            votes: 0,
            answers: Vec::new(),
            created_at: now,
        })
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|existing| existing.eq_ignore_ascii_case(tag))
    }

    pub fn answer_mut(&mut self, answer_id: Uuid) -> Option<&mut Answer> {
        self.answers.iter_mut().find(|answer| answer.id == answer_id)
    }
}

impl Answer {
    pub fn new(input: AnswerInput, author: Uuid, now: OffsetDateTime) -> Result<Self, ApiError> {
        Ok(Self {
            id: Uuid::new_v4(),
            body: require_text(&input.body, "body")?,
            author,
            votes: 0,
            created_at: now,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerView {
    pub id: Uuid,
    pub body: String,
    pub author: Option<UserRef>,
    pub votes: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub author: Option<UserRef>,
    pub votes: i64,
    pub answer_count: usize,
    pub answers: Vec<AnswerView>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl PostView {
    pub fn build(post: &Post, users: &Collection<User>) -> Self {
        Self {
            id: post.id,
            title: post.title.clone(),
            body: post.body.clone(),
            tags: post.tags.clone(),
            author: UserRef::lookup(users, post.author),
            votes: post.votes,
            answer_count: post.answers.len(),
            answers: post
                .answers
                .iter()
                .map(|answer| AnswerView {
                    id: answer.id,
                    body: answer.body.clone(),
                    author: UserRef::lookup(users, answer.author),
                    votes: answer.votes,
                    created_at: answer.created_at,
                })
                .collect(),
            created_at: post.created_at,
        }
    }
}
