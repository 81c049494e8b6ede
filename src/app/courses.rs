use crate::error::ApiError;
use crate::state;
use crate::types::course::{Course, CourseInput, CoursePatch, StoredFile};
use crate::uploads::{self, Accept};

use axum::Json;
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::extract::{AdminUser, ApiJson, ApiPath};
use super::{MessageResponse, read_file_field};

#[derive(Debug, Deserialize)]
pub(crate) struct CourseQuery {
    category: Option<String>,
}

pub(crate) async fn course_list(
    State(state): State<state::AppState>,
    Query(query): Query<CourseQuery>,
) -> Json<Vec<Course>> {
    let category = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|category| !category.is_empty());
    let mut courses: Vec<Course> = state
        .db
        .read(|c| {
            c.courses
                .iter()
                .filter(|course| category.is_none_or(|wanted| course.category.eq_ignore_ascii_case(wanted)))
                .cloned()
                .collect()
        })
        .await;
    courses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(courses)
}

pub(crate) async fn course_detail(
    State(state): State<state::AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Course>, ApiError> {
    state
        .db
        .read(|c| c.courses.get(id).cloned())
        .await
        .map(Json)
        .ok_or(ApiError::NotFound("Course"))
}

pub(crate) async fn course_create(
    State(state): State<state::AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(input): ApiJson<CourseInput>,
) -> Result<(StatusCode, Json<Course>), ApiError> {
    let course = Course::new(input.validated()?, admin.id, OffsetDateTime::now_utc());
    state
        .db
        .write(|c| -> Result<_, ApiError> {
            c.courses.insert(course.clone());
            Ok(())
        })
        .await?;
    tracing::info!(course = %course.id, admin = %admin.id, "created course");
    Ok((StatusCode::CREATED, Json(course)))
}

pub(crate) async fn course_update(
    State(state): State<state::AppState>,
    AdminUser(_admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<CoursePatch>,
) -> Result<Json<Course>, ApiError> {
    let now = OffsetDateTime::now_utc();
    let course = state
        .db
        .write(|c| -> Result<_, ApiError> {
            let course = c.courses.get_mut(id).ok_or(ApiError::NotFound("Course"))?;
            course.apply(patch, now)?;
            Ok(course.clone())
        })
        .await?;
    Ok(Json(course))
}

pub(crate) async fn course_delete(
    State(state): State<state::AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    let removed = state
        .db
        .write(|c| {
            c.courses.remove(id).ok_or(ApiError::NotFound("Course"))
        })
        .await?;
    if let Some(file) = removed.file.as_ref() {
        discard_file(&state, file);
    }
    tracing::info!(course = %id, admin = %admin.id, "deleted course");
    Ok(Json(MessageResponse::new("Course removed")))
}

/// Stores a course attachment and replaces any previous one.
pub(crate) async fn course_file_upload(
    State(state): State<state::AppState>,
    AdminUser(_admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<Course>, ApiError> {
    if !state.db.read(|c| c.courses.contains(id)).await {
        return Err(ApiError::NotFound("Course"));
    }
    let root = state.uploads_root()?;
    let upload = read_file_field(&mut multipart).await?;
    let stored = uploads::store_upload(
        &root,
        &upload.bytes,
        upload.content_type.as_deref(),
        upload.file_name.as_deref(),
        Accept::Documents,
    )?;
    let file = StoredFile {
        path: stored.rel_path.clone(),
        url: stored.url(),
        content_type: stored.kind.content_type().to_string(),
        original_name: upload.file_name,
    };

    let now = OffsetDateTime::now_utc();
    let result = state
        .db
        .write(|c| -> Result<_, ApiError> {
            let course = c.courses.get_mut(id).ok_or(ApiError::NotFound("Course"))?;
            let previous = course.file.replace(file);
            course.updated_at = now;
            Ok((course.clone(), previous))
        })
        .await;
    let (course, previous) = match result {
        Ok(updated) => updated,
        Err(err) => {
            if let Err(cleanup) = uploads::remove_upload(&root, &stored.rel_path) {
                tracing::warn!("failed to remove orphaned upload {}: {cleanup:?}", stored.rel_path);
            }
            return Err(err);
        }
    };
    if let Some(previous) = previous.as_ref() {
        discard_file(&state, previous);
    }
    Ok(Json(course))
}

fn discard_file(state: &state::AppState, file: &StoredFile) {
    let Ok(root) = state.uploads_root() else {
        return;
    };
    match uploads::remove_upload(&root, &file.path) {
        Ok(()) | Err(uploads::UploadError::NotFound) => {}
        Err(err) => tracing::warn!("failed to remove course file {}: {err:?}", file.path),
    }
}
