use crate::store::Document;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Admin,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuilderProfile {
    pub skills: Vec<String>,
    pub role: String,
    pub looking_for_team: bool,
    pub bio: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub longest_streak: u32,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_active_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub builder_profile: Option<BuilderProfile>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Document for User {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Advances the daily streak: same day keeps it, the following day adds
    /// one, anything else starts over at one.
    pub fn record_activity(&mut self, now: OffsetDateTime) {
        let today = now.date();
        let streak = match self.last_active_at.map(|at| at.date()) {
            Some(last) if last == today => self.current_streak.max(1),
            Some(last) if last.next_day() == Some(today) => self.current_streak + 1,
            _ => 1,
        };
        self.current_streak = streak;
        self.longest_streak = self.longest_streak.max(streak);
        self.last_active_at = Some(now);
    }
}

/// What a user sees about themselves, and what admins see in the console.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub avatar: Option<String>,
    pub bio: String,
    pub skills: Vec<String>,
    pub current_streak: u32,
    pub longest_streak: u32,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_active_at: Option<OffsetDateTime>,
    pub builder_profile: Option<BuilderProfile>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&User> for AccountView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            avatar: user.avatar.clone(),
            bio: user.bio.clone(),
            skills: user.skills.clone(),
            current_streak: user.current_streak,
            longest_streak: user.longest_streak,
            last_active_at: user.last_active_at,
            builder_profile: user.builder_profile.clone(),
            created_at: user.created_at,
        }
    }
}

/// Public profile; no e-mail address.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub role: Role,
    pub avatar: Option<String>,
    pub bio: String,
    pub skills: Vec<String>,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub builder_profile: Option<BuilderProfile>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&User> for ProfileView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            username: user.username.clone(),
            role: user.role,
            avatar: user.avatar.clone(),
            bio: user.bio.clone(),
            skills: user.skills.clone(),
            current_streak: user.current_streak,
            longest_streak: user.longest_streak,
            builder_profile: user.builder_profile.clone(),
            created_at: user.created_at,
        }
    }
}
