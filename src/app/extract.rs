use crate::error::ApiError;
use crate::state::AppState;
use crate::types::user::User;

use axum::extract::{FromRequest, FromRequestParts};
use axum::http::request::Parts;

/// What the identity middleware learned from the `Authorization` header.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Identity {
    Anonymous,
    Rejected,
    User(uuid::Uuid),
}

/// JSON body whose rejections render as `{message}` with status 400.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub(crate) struct ApiJson<T>(pub(crate) T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub(crate) struct ApiPath<T>(pub(crate) T);

pub(crate) struct CurrentUser(pub(crate) User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let identity = parts
            .extensions
            .get::<Identity>()
            .copied()
            .unwrap_or(Identity::Anonymous);
        let user_id = match identity {
            Identity::User(user_id) => user_id,
            Identity::Rejected => return Err(ApiError::Unauthorized("Not authorized, token failed")),
            Identity::Anonymous => return Err(ApiError::Unauthorized("Not authorized, no token")),
        };
        state
            .db
            .read(|c| c.users.get(user_id).cloned())
            .await
            .map(CurrentUser)
            .ok_or(ApiError::Unauthorized("Not authorized, user not found"))
    }
}

pub(crate) struct AdminUser(pub(crate) User);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::Forbidden("Admin access required"));
        }
        Ok(AdminUser(user))
    }
}

/// Owners may change their own documents; admins may change any.
pub(crate) fn ensure_owner(user: &User, owner: uuid::Uuid) -> Result<(), ApiError> {
    if user.id == owner || user.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Not allowed to modify this resource"))
    }
}
