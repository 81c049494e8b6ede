use crate::error::ApiError;
use crate::state;
use crate::types::community::{Answer, AnswerInput, Post, PostInput, PostView, VoteInput};

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::MessageResponse;
use super::extract::{ApiJson, ApiPath, CurrentUser, ensure_owner};

#[derive(Debug, Deserialize)]
pub(crate) struct PostQuery {
    tag: Option<String>,
}

pub(crate) async fn post_list(
    State(state): State<state::AppState>,
    Query(query): Query<PostQuery>,
) -> Json<Vec<PostView>> {
    let tag = query
        .tag
        .as_deref()
        .map(str::trim)
        .filter(|tag| !tag.is_empty());
    let mut posts: Vec<PostView> = state
        .db
        .read(|c| {
            c.posts
                .iter()
                .filter(|post| tag.is_none_or(|tag| post.has_tag(tag)))
                .map(|post| PostView::build(post, &c.users))
                .collect()
        })
        .await;
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(posts)
}

pub(crate) async fn post_detail(
    State(state): State<state::AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<PostView>, ApiError> {
    state
        .db
        .read(|c| c.posts.get(id).map(|post| PostView::build(post, &c.users)))
        .await
        .map(Json)
        .ok_or(ApiError::NotFound("Post"))
}

pub(crate) async fn post_create(
    State(state): State<state::AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(input): ApiJson<PostInput>,
) -> Result<(StatusCode, Json<PostView>), ApiError> {
    let post = Post::new(input, user.id, OffsetDateTime::now_utc())?;
    let view = state
        .db
        .write(|c| -> Result<_, ApiError> {
            let view = PostView::build(&post, &c.users);
            c.posts.insert(post);
            Ok(view)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub(crate) async fn post_delete(
    State(state): State<state::AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .db
        .write(|c| -> Result<_, ApiError> {
            let post = c.posts.get(id).ok_or(ApiError::NotFound("Post"))?;
            ensure_owner(&user, post.author)?;
            c.posts.remove(id);
            Ok(())
        })
        .await?;
    Ok(Json(MessageResponse::new("Post removed")))
}

#[derive(Debug, Serialize)]
pub(crate) struct VoteResponse {
    votes: i64,
}

/// Votes are a plain counter: the same caller may vote repeatedly.
pub(crate) async fn post_vote(
    State(state): State<state::AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(vote): ApiJson<VoteInput>,
) -> Result<Json<VoteResponse>, ApiError> {
    let votes = state
        .db
        .write(|c| -> Result<_, ApiError> {
            let post = c.posts.get_mut(id).ok_or(ApiError::NotFound("Post"))?;
            post.votes += vote.direction.delta();
            Ok(post.votes)
        })
        .await?;
    Ok(Json(VoteResponse { votes }))
}

pub(crate) async fn answer_create(
    State(state): State<state::AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<AnswerInput>,
) -> Result<(StatusCode, Json<PostView>), ApiError> {
    let answer = Answer::new(input, user.id, OffsetDateTime::now_utc())?;
    let view = state
        .db
        .write(|c| -> Result<_, ApiError> {
            let post = c.posts.get_mut(id).ok_or(ApiError::NotFound("Post"))?;
            post.answers.push(answer);
            Ok(PostView::build(post, &c.users))
        })
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub(crate) async fn answer_vote(
    State(state): State<state::AppState>,
    ApiPath((id, answer_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(vote): ApiJson<VoteInput>,
) -> Result<Json<VoteResponse>, ApiError> {
    let votes = state
        .db
        .write(|c| -> Result<_, ApiError> {
            let post = c.posts.get_mut(id).ok_or(ApiError::NotFound("Post"))?;
            let answer = post
                .answer_mut(answer_id)
                .ok_or(ApiError::NotFound("Answer"))?;
            answer.votes += vote.direction.delta();
            Ok(answer.votes)
        })
        .await?;
    Ok(Json(VoteResponse { votes }))
}

pub(crate) async fn answer_delete(
    State(state): State<state::AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath((id, answer_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .db
        .write(|c| -> Result<_, ApiError> {
            let post = c.posts.get_mut(id).ok_or(ApiError::NotFound("Post"))?;
            let index = post
                .answers
                .iter()
                .position(|answer| answer.id == answer_id)
                .ok_or(ApiError::NotFound("Answer"))?;
            ensure_owner(&user, post.answers[index].author)?;
            post.answers.remove(index);
            Ok(())
        })
        .await?;
    Ok(Json(MessageResponse::new("Answer removed")))
}
