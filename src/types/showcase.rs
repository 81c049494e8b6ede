use crate::error::ApiError;
use crate::store::{Collection, Document};
use crate::types::quiz::dedup_ids;
use crate::types::user::User;
use crate::types::{UserRef, clean_list, require_text};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub repo_url: Option<String>,
    #[serde(default)]
    pub demo_url: Option<String>,
    pub owner: Uuid,
    #[serde(default)]
    pub team_members: Vec<Uuid>,
    #[serde(default)]
    pub liked_by: Vec<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Document for Project {
    const COLLECTION: &'static str = "projects";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Idea {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub looking_for: Vec<String>,
    pub owner: Uuid,
    #[serde(default)]
    pub team_members: Vec<Uuid>,
    #[serde(default)]
    pub liked_by: Vec<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Document for Idea {
    const COLLECTION: &'static str = "ideas";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInput {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    pub repo_url: Option<String>,
    pub demo_url: Option<String>,
    #[serde(default)]
    pub team_members: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tech_stack: Option<Vec<String>>,
    pub repo_url: Option<String>,
    pub demo_url: Option<String>,
    pub team_members: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdeaInput {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub looking_for: Vec<String>,
    #[serde(default)]
    pub team_members: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdeaPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub looking_for: Option<Vec<String>>,
    pub team_members: Option<Vec<Uuid>>,
}

/// Every id must name an existing user.
pub(crate) fn checked_members(
    users: &Collection<User>,
    ids: Vec<Uuid>,
) -> Result<Vec<Uuid>, ApiError> {
    let ids = dedup_ids(ids);
    if let Some(missing) = ids.iter().find(|id| !users.contains(**id)) {
        return Err(ApiError::bad_request(format!(
            "team member {missing} does not exist"
        )));
    }
    Ok(ids)
}

/// Adds or removes `user` from `liked_by`; returns whether the user now likes it.
pub(crate) fn toggle_like(liked_by: &mut Vec<Uuid>, user: Uuid) -> bool {
    if let Some(index) = liked_by.iter().position(|id| *id == user) {
        liked_by.remove(index);
        false
    } else {
        liked_by.push(user);
        true
    }
}

fn optional_url(value: Option<String>) -> Option<String> {
    value
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
}

impl Project {
    pub fn new(
        input: ProjectInput,
        owner: Uuid,
        team_members: Vec<Uuid>,
        now: OffsetDateTime,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            id: Uuid::new_v4(),
            title: require_text(&input.title, "title")?,
            description: require_text(&input.description, "description")?,
            tech_stack: clean_list(input.tech_stack),
            repo_url: optional_url(input.repo_url),
            demo_url: optional_url(input.demo_url),
            owner,
            team_members,
            liked_by: Vec::new(),
            created_at: now,
        })
    }

    pub fn apply(
        &mut self,
        patch: ProjectPatch,
        users: &Collection<User>,
    ) -> Result<(), ApiError> {
        if let Some(title) = patch.title {
            self.title = require_text(&title, "title")?;
        }
        if let Some(description) = patch.description {
            self.description = require_text(&description, "description")?;
        }
        if let Some(tech_stack) = patch.tech_stack {
            self.tech_stack = clean_list(tech_stack);
        }
        if patch.repo_url.is_some() {
            self.repo_url = optional_url(patch.repo_url);
        }
        if patch.demo_url.is_some() {
            self.demo_url = optional_url(patch.demo_url);
        }
        if let Some(team_members) = patch.team_members {
            self.team_members = checked_members(users, team_members)?;
        }
        Ok(())
    }
}

impl Idea {
    pub fn new(
        input: IdeaInput,
        owner: Uuid,
        team_members: Vec<Uuid>,
        now: OffsetDateTime,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            id: Uuid::new_v4(),
            title: require_text(&input.title, "title")?,
            description: require_text(&input.description, "description")?,
            tags: clean_list(input.tags),
            looking_for: clean_list(input.looking_for),
            owner,
            team_members,
            liked_by: Vec::new(),
            created_at: now,
        })
    }

    pub fn apply(&mut self, patch: IdeaPatch, users: &Collection<User>) -> Result<(), ApiError> {
        if let Some(title) = patch.title {
            self.title = require_text(&title, "title")?;
        }
        if let Some(description) = patch.description {
            self.description = require_text(&description, "description")?;
        }
        if let Some(tags) = patch.tags {
            self.tags = clean_list(tags);
        }
        if let Some(looking_for) = patch.looking_for {
            self.looking_for = clean_list(looking_for);
        }
        if let Some(team_members) = patch.team_members {
            self.team_members = checked_members(users, team_members)?;
        }
        Ok(())
    }

    /// Returns false when the user was already on the team.
    pub fn join(&mut self, user: Uuid) -> bool {
        if self.owner == user || self.team_members.contains(&user) {
            return false;
        }
        self.team_members.push(user);
        true
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub tech_stack: Vec<String>,
    pub repo_url: Option<String>,
    pub demo_url: Option<String>,
    pub owner: Option<UserRef>,
    pub team_members: Vec<UserRef>,
    pub likes: usize,
    pub liked_by: Vec<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl ProjectView {
    pub fn build(project: &Project, users: &Collection<User>) -> Self {
        Self {
            id: project.id,
            title: project.title.clone(),
            description: project.description.clone(),
            tech_stack: project.tech_stack.clone(),
            repo_url: project.repo_url.clone(),
            demo_url: project.demo_url.clone(),
            owner: UserRef::lookup(users, project.owner),
            team_members: members(users, &project.team_members),
            likes: project.liked_by.len(),
            liked_by: project.liked_by.clone(),
            created_at: project.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdeaView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub looking_for: Vec<String>,
    pub owner: Option<UserRef>,
    pub team_members: Vec<UserRef>,
    pub likes: usize,
    pub liked_by: Vec<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl IdeaView {
    pub fn build(idea: &Idea, users: &Collection<User>) -> Self {
        Self {
            id: idea.id,
            title: idea.title.clone(),
            description: idea.description.clone(),
            tags: idea.tags.clone(),
            looking_for: idea.looking_for.clone(),
            owner: UserRef::lookup(users, idea.owner),
            team_members: members(users, &idea.team_members),
            likes: idea.liked_by.len(),
            liked_by: idea.liked_by.clone(),
            created_at: idea.created_at,
        }
    }
}

fn members(users: &Collection<User>, ids: &[Uuid]) -> Vec<UserRef> {
    ids.iter()
        .filter_map(|id| UserRef::lookup(users, *id))
        .collect()
}
