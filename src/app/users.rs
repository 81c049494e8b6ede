use crate::accounts;
use crate::error::ApiError;
use crate::state;
use crate::types::user::{AccountView, BuilderProfile, ProfileView};
use crate::types::{clean_list, require_text};
use crate::uploads::{self, Accept};

use axum::Json;
use axum::extract::{Multipart, Query, State};
use serde::Deserialize;
use uuid::Uuid;

use super::extract::{ApiJson, ApiPath, CurrentUser};

pub(crate) async fn user_profile(
    State(state): State<state::AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ProfileView>, ApiError> {
    state
        .db
        .read(|c| c.users.get(id).map(ProfileView::from))
        .await
        .map(Json)
        .ok_or(ApiError::NotFound("User"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BuilderQuery {
    skill: Option<String>,
    role: Option<String>,
    looking_for_team: Option<bool>,
}

impl BuilderQuery {
    fn matches(&self, profile: &BuilderProfile) -> bool {
        if let Some(skill) = self.skill.as_deref().map(str::trim)
            && !skill.is_empty()
            && !profile
                .skills
                .iter()
                .any(|existing| existing.eq_ignore_ascii_case(skill))
        {
            return false;
        }
        if let Some(role) = self.role.as_deref().map(str::trim)
            && !role.is_empty()
            && !profile.role.eq_ignore_ascii_case(role)
        {
            return false;
        }
        if let Some(looking) = self.looking_for_team
            && profile.looking_for_team != looking
        {
            return false;
        }
        true
    }
}

pub(crate) async fn builder_list(
    State(state): State<state::AppState>,
    Query(query): Query<BuilderQuery>,
) -> Json<Vec<ProfileView>> {
    let builders = state
        .db
        .read(|c| {
            c.users
                .iter()
                .filter(|user| {
                    user.builder_profile
                        .as_ref()
                        .is_some_and(|profile| query.matches(profile))
                })
                .map(ProfileView::from)
                .collect()
        })
        .await;
    Json(builders)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProfileUpdate {
    name: Option<String>,
    username: Option<String>,
    bio: Option<String>,
    avatar: Option<String>,
    skills: Option<Vec<String>>,
    builder_profile: Option<BuilderProfile>,
}

pub(crate) async fn profile_update(
    State(state): State<state::AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> Result<Json<AccountView>, ApiError> {
    let updated = state
        .db
        .write(|c| -> Result<_, ApiError> {
            if let Some(username) = update.username.as_deref() {
                accounts::ensure_username_free(c, username.trim(), user.id)?;
            }
            let current = c.users.get_mut(user.id).ok_or(ApiError::NotFound("User"))?;
            if let Some(name) = update.name {
                current.name = require_text(&name, "name")?;
            }
            if let Some(username) = update.username {
                let username = require_text(&username, "username")?;
                if username.chars().any(char::is_whitespace) {
                    return Err(ApiError::bad_request("username must not contain spaces"));
                }
                current.username = username;
            }
            if let Some(bio) = update.bio {
                current.bio = bio.trim().to_string();
            }
            if let Some(avatar) = update.avatar {
                let avatar = avatar.trim();
                current.avatar = (!avatar.is_empty()).then(|| avatar.to_string());
            }
            if let Some(skills) = update.skills {
                current.skills = clean_list(skills);
            }
            if let Some(profile) = update.builder_profile {
                current.builder_profile = Some(BuilderProfile {
                    skills: clean_list(profile.skills),
                    role: profile.role.trim().to_string(),
                    looking_for_team: profile.looking_for_team,
                    bio: profile.bio.trim().to_string(),
                });
            }
            Ok(AccountView::from(&*current))
        })
        .await?;
    Ok(Json(updated))
}

pub(crate) async fn avatar_upload(
    State(state): State<state::AppState>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<AccountView>, ApiError> {
    let root = state.uploads_root()?;
    let upload = super::read_file_field(&mut multipart).await?;
    let stored = uploads::store_upload(
        &root,
        &upload.bytes,
        upload.content_type.as_deref(),
        upload.file_name.as_deref(),
        Accept::Images,
    )?;
    let url = stored.url();
    tracing::info!(user = %user.id, "stored avatar {}", stored.rel_path);

    let updated = state
        .db
        .write(|c| -> Result<_, ApiError> {
            let current = c.users.get_mut(user.id).ok_or(ApiError::NotFound("User"))?;
            current.avatar = Some(url);
            Ok(AccountView::from(&*current))
        })
        .await?;
    Ok(Json(updated))
}
