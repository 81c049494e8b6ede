use crate::error::ApiError;
use crate::state;
use crate::types::showcase::{
    Idea, IdeaInput, IdeaPatch, IdeaView, Project, ProjectInput, ProjectPatch, ProjectView,
    checked_members, toggle_like,
};

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::MessageResponse;
use super::extract::{ApiJson, ApiPath, CurrentUser, ensure_owner};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LikeResponse {
    liked: bool,
    likes: usize,
}

pub(crate) async fn project_list(State(state): State<state::AppState>) -> Json<Vec<ProjectView>> {
    let mut projects: Vec<ProjectView> = state
        .db
        .read(|c| {
            c.projects
                .iter()
                .map(|project| ProjectView::build(project, &c.users))
                .collect()
        })
        .await;
    projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(projects)
}

pub(crate) async fn project_detail(
    State(state): State<state::AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ProjectView>, ApiError> {
    state
        .db
        .read(|c| {
            c.projects
                .get(id)
                .map(|project| ProjectView::build(project, &c.users))
        })
        .await
        .map(Json)
        .ok_or(ApiError::NotFound("Project"))
}

pub(crate) async fn project_create(
    State(state): State<state::AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(input): ApiJson<ProjectInput>,
) -> Result<(StatusCode, Json<ProjectView>), ApiError> {
    let now = OffsetDateTime::now_utc();
    let view = state
        .db
        .write(|c| -> Result<_, ApiError> {
            let team_members = checked_members(&c.users, input.team_members.clone())?;
            let project = Project::new(input, user.id, team_members, now)?;
            let view = ProjectView::build(&project, &c.users);
            c.projects.insert(project);
            Ok(view)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub(crate) async fn project_update(
    State(state): State<state::AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<ProjectPatch>,
) -> Result<Json<ProjectView>, ApiError> {
    let view = state
        .db
        .write(|c| -> Result<_, ApiError> {
            let project = c
                .projects
                .get_mut(id)
                .ok_or(ApiError::NotFound("Project"))?;
            ensure_owner(&user, project.owner)?;
            project.apply(patch, &c.users)?;
            Ok(ProjectView::build(project, &c.users))
        })
        .await?;
    Ok(Json(view))
}

pub(crate) async fn project_delete(
    State(state): State<state::AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .db
        .write(|c| -> Result<_, ApiError> {
            let project = c.projects.get(id).ok_or(ApiError::NotFound("Project"))?;
            ensure_owner(&user, project.owner)?;
            c.projects.remove(id);
            Ok(())
        })
        .await?;
    Ok(Json(MessageResponse::new("Project removed")))
}

pub(crate) async fn project_like(
    State(state): State<state::AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<LikeResponse>, ApiError> {
    let response = state
        .db
        .write(|c| -> Result<_, ApiError> {
            let project = c
                .projects
                .get_mut(id)
                .ok_or(ApiError::NotFound("Project"))?;
            let liked = toggle_like(&mut project.liked_by, user.id);
            Ok(LikeResponse {
                liked,
                likes: project.liked_by.len(),
            })
        })
        .await?;
    Ok(Json(response))
}

pub(crate) async fn idea_list(State(state): State<state::AppState>) -> Json<Vec<IdeaView>> {
    let mut ideas: Vec<IdeaView> = state
        .db
        .read(|c| {
            c.ideas
                .iter()
                .map(|idea| IdeaView::build(idea, &c.users))
                .collect()
        })
        .await;
    ideas.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(ideas)
}

pub(crate) async fn idea_detail(
    State(state): State<state::AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<IdeaView>, ApiError> {
    state
        .db
        .read(|c| c.ideas.get(id).map(|idea| IdeaView::build(idea, &c.users)))
        .await
        .map(Json)
        .ok_or(ApiError::NotFound("Idea"))
}

pub(crate) async fn idea_create(
    State(state): State<state::AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(input): ApiJson<IdeaInput>,
) -> Result<(StatusCode, Json<IdeaView>), ApiError> {
    let now = OffsetDateTime::now_utc();
    let view = state
        .db
        .write(|c| -> Result<_, ApiError> {
            let team_members = checked_members(&c.users, input.team_members.clone())?;
            let idea = Idea::new(input, user.id, team_members, now)?;
            let view = IdeaView::build(&idea, &c.users);
            c.ideas.insert(idea);
            Ok(view)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub(crate) async fn idea_update(
    State(state): State<state::AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<IdeaPatch>,
) -> Result<Json<IdeaView>, ApiError> {
    let view = state
        .db
        .write(|c| -> Result<_, ApiError> {
            let idea = c.ideas.get_mut(id).ok_or(ApiError::NotFound("Idea"))?;
            ensure_owner(&user, idea.owner)?;
            idea.apply(patch, &c.users)?;
            Ok(IdeaView::build(idea, &c.users))
        })
        .await?;
    Ok(Json(view))
}

pub(crate) async fn idea_delete(
    State(state): State<state::AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .db
        .write(|c| -> Result<_, ApiError> {
            let idea = c.ideas.get(id).ok_or(ApiError::NotFound("Idea"))?;
            ensure_owner(&user, idea.owner)?;
            c.ideas.remove(id);
            Ok(())
        })
        .await?;
    Ok(Json(MessageResponse::new("Idea removed")))
}

pub(crate) async fn idea_like(
    State(state): State<state::AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<LikeResponse>, ApiError> {
    let response = state
        .db
        .write(|c| -> Result<_, ApiError> {
            let idea = c.ideas.get_mut(id).ok_or(ApiError::NotFound("Idea"))?;
            let liked = toggle_like(&mut idea.liked_by, user.id);
            Ok(LikeResponse {
                liked,
                likes: idea.liked_by.len(),
            })
        })
        .await?;
    Ok(Json(response))
}

/// Joining twice, or joining one's own idea, is a no-op.
pub(crate) async fn idea_join(
    State(state): State<state::AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<IdeaView>, ApiError> {
    let view = state
        .db
        .write(|c| -> Result<_, ApiError> {
            let idea = c.ideas.get_mut(id).ok_or(ApiError::NotFound("Idea"))?;
            if idea.join(user.id) {
                tracing::info!(idea = %id, user = %user.id, "joined idea team");
            }
            Ok(IdeaView::build(idea, &c.users))
        })
        .await?;
    Ok(Json(view))
}
