use crate::accounts::{self, NewAccount};
use crate::auth::verify_password;
use crate::error::ApiError;
use crate::state;
use crate::types::user::{AccountView, Role};

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::extract::{ApiJson, CurrentUser, Identity};

/// Tags every request with the identity carried by its bearer token. Routes
/// decide for themselves whether an identity is required.
pub(crate) async fn identity_middleware(
    State(state): State<state::AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let identity = match bearer_token(req.headers()) {
        None => Identity::Anonymous,
        Some(token) => match state.auth.verify_token(token) {
            Ok(user_id) => Identity::User(user_id),
            Err(err) => {
                tracing::debug!("rejected bearer token: {err}");
                Identity::Rejected
            }
        },
    };
    req.extensions_mut().insert(identity);
    next.run(req).await
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = raw.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[derive(Serialize)]
pub(crate) struct SessionResponse {
    pub(crate) token: String,
    pub(crate) user: AccountView,
}

pub(crate) async fn register(
    State(state): State<state::AppState>,
    ApiJson(account): ApiJson<NewAccount>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let account = account.prepare().await?;
    let now = OffsetDateTime::now_utc();
    let user = state
        .db
        .write(|c| accounts::create_account(c, account, Role::Student, now))
        .await?;
    let token = state.auth.issue_token(user.id)?;
    tracing::info!(user = %user.id, "registered {}", user.username);

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            token,
            user: AccountView::from(&user),
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    email: String,
    password: String,
}

pub(crate) async fn login(
    State(state): State<state::AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(ApiError::bad_request("email and password are required"));
    }

    let candidate = state
        .db
        .read(|c| {
            accounts::find_by_email(c, &request.email)
                .map(|user| (user.id, user.password_hash.clone()))
        })
        .await;
    let Some((user_id, password_hash)) = candidate else {
        return Err(ApiError::Unauthorized("Invalid email or password"));
    };
    if !verify_password(&request.password, &password_hash) {
        return Err(ApiError::Unauthorized("Invalid email or password"));
    }

    let now = OffsetDateTime::now_utc();
    let user = state
        .db
        .write(|c| -> Result<_, ApiError> {
            let user = c.users.get_mut(user_id).ok_or(ApiError::NotFound("User"))?;
            user.record_activity(now);
            Ok(user.clone())
        })
        .await?;
    let token = state.auth.issue_token(user.id)?;

    Ok(Json(SessionResponse {
        token,
        user: AccountView::from(&user),
    }))
}

pub(crate) async fn me(CurrentUser(user): CurrentUser) -> Json<AccountView> {
    Json(AccountView::from(&user))
}
