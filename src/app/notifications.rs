use crate::error::ApiError;
use crate::state;
use crate::types::notification::{Notification, NotificationInput, NotificationView};

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::MessageResponse;
use super::extract::{AdminUser, ApiJson, ApiPath, CurrentUser};

pub(crate) async fn notification_list(
    State(state): State<state::AppState>,
    CurrentUser(user): CurrentUser,
) -> Json<Vec<NotificationView>> {
    let mut notifications: Vec<NotificationView> = state
        .db
        .read(|c| {
            c.notifications
                .iter()
                .map(|notification| NotificationView::for_user(notification, user.id))
                .collect()
        })
        .await;
    notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(notifications)
}

#[derive(Debug, Serialize)]
pub(crate) struct UnreadCount {
    count: usize,
}

pub(crate) async fn unread_count(
    State(state): State<state::AppState>,
    CurrentUser(user): CurrentUser,
) -> Json<UnreadCount> {
    let count = state
        .db
        .read(|c| {
            c.notifications
                .iter()
                .filter(|notification| !notification.is_read_by(user.id))
                .count()
        })
        .await;
    Json(UnreadCount { count })
}

pub(crate) async fn mark_all_read(
    State(state): State<state::AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<MessageResponse>, ApiError> {
    let ids: Vec<Uuid> = state
        .db
        .read(|c| {
            c.notifications
                .iter()
                .filter(|notification| !notification.is_read_by(user.id))
                .map(|notification| notification.id)
                .collect()
        })
        .await;
    if !ids.is_empty() {
        state
            .db
            .write(|c| -> Result<_, ApiError> {
                for id in &ids {
                    if let Some(notification) = c.notifications.get_mut(*id) {
                        notification.mark_read(user.id);
                    }
                }
                Ok(())
            })
            .await?;
    }
    Ok(Json(MessageResponse::new("All notifications marked as read")))
}

pub(crate) async fn mark_read(
    State(state): State<state::AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<NotificationView>, ApiError> {
    let view = state
        .db
        .write(|c| -> Result<_, ApiError> {
            let notification = c
                .notifications
                .get_mut(id)
                .ok_or(ApiError::NotFound("Notification"))?;
            notification.mark_read(user.id);
            Ok(NotificationView::for_user(notification, user.id))
        })
        .await?;
    Ok(Json(view))
}

pub(crate) async fn notification_create(
    State(state): State<state::AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(input): ApiJson<NotificationInput>,
) -> Result<(StatusCode, Json<NotificationView>), ApiError> {
    let notification = Notification::new(input, admin.id, OffsetDateTime::now_utc())?;
    let view = NotificationView::for_user(&notification, admin.id);
    state
        .db
        .write(|c| -> Result<_, ApiError> {
            c.notifications.insert(notification);
            Ok(())
        })
        .await?;
    tracing::info!(notification = %view.id, "broadcast notification");
    Ok((StatusCode::CREATED, Json(view)))
}

pub(crate) async fn notification_delete(
    State(state): State<state::AppState>,
    AdminUser(_admin): AdminUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .db
        .write(|c| {
            c.notifications
                .remove(id)
                .ok_or(ApiError::NotFound("Notification"))
        })
        .await?;
    Ok(Json(MessageResponse::new("Notification removed")))
}
