use crate::error::ApiError;
use crate::state;
use crate::types::user::{AccountView, Role};

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::MessageResponse;
use super::extract::{AdminUser, ApiJson, ApiPath};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Stats {
    users: usize,
    admins: usize,
    courses: usize,
    questions: usize,
    quizzes: usize,
    submissions: usize,
    posts: usize,
    projects: usize,
    ideas: usize,
    notifications: usize,
}

pub(crate) async fn stats(
    State(state): State<state::AppState>,
    AdminUser(_admin): AdminUser,
) -> Json<Stats> {
    let stats = state
        .db
        .read(|c| Stats {
            users: c.users.len(),
            admins: c.users.iter().filter(|user| user.is_admin()).count(),
            courses: c.courses.len(),
            questions: c.questions.len(),
            quizzes: c.quizzes.len(),
            submissions: c.submissions.len(),
            posts: c.posts.len(),
            projects: c.projects.len(),
            ideas: c.ideas.len(),
            notifications: c.notifications.len(),
        })
        .await;
    Json(stats)
}

pub(crate) async fn user_list(
    State(state): State<state::AppState>,
    AdminUser(_admin): AdminUser,
) -> Json<Vec<AccountView>> {
    let mut users: Vec<AccountView> =
        state.db.read(|c| c.users.iter().map(AccountView::from).collect()).await;
    users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(users)
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoleChange {
    role: Role,
}

pub(crate) async fn role_update(
    State(state): State<state::AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(change): ApiJson<RoleChange>,
) -> Result<Json<AccountView>, ApiError> {
    if id == admin.id && change.role != Role::Admin {
        return Err(ApiError::bad_request("You cannot remove your own admin role"));
    }
    let view = state
        .db
        .write(|c| -> Result<_, ApiError> {
            let user = c.users.get_mut(id).ok_or(ApiError::NotFound("User"))?;
            user.role = change.role;
            Ok(AccountView::from(&*user))
        })
        .await?;
    tracing::info!(user = %id, admin = %admin.id, role = ?change.role, "changed role");
    Ok(Json(view))
}

pub(crate) async fn user_delete(
    State(state): State<state::AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    if id == admin.id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }
    state
        .db
        .write(|c| c.users.remove(id).ok_or(ApiError::NotFound("User")))
        .await?;
    tracing::info!(user = %id, admin = %admin.id, "deleted user");
    Ok(Json(MessageResponse::new("User removed")))
}
