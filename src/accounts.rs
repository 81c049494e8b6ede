use crate::auth::{self, MIN_PASSWORD_LEN};
use crate::error::ApiError;
use crate::store::{Collections, Database};
use crate::types::require_text;
use crate::types::user::{Role, User};

use serde::Deserialize;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// A validated account whose password is already hashed.
pub(crate) struct PreparedAccount {
    name: String,
    username: String,
    email: String,
    password_hash: String,
}

impl NewAccount {
    /// Validates the fields and hashes the password on the blocking pool, so
    /// the store lock is never held while argon2 runs.
    pub(crate) async fn prepare(self) -> Result<PreparedAccount, ApiError> {
        let account = self.validated()?;
        let password_hash = hash_password(account.password).await?;
        Ok(PreparedAccount {
            name: account.name,
            username: account.username,
            email: account.email,
            password_hash,
        })
    }

    fn validated(self) -> Result<Self, ApiError> {
        let name = require_text(&self.name, "name")?;
        let username = require_text(&self.username, "username")?;
        if username.chars().any(char::is_whitespace) {
            return Err(ApiError::bad_request("username must not contain spaces"));
        }
        let email = normalize_email(&self.email);
        if email.is_empty() || !email.contains('@') {
            return Err(ApiError::bad_request("a valid email is required"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ApiError::bad_request(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(Self {
            name,
            username,
            email,
            password: self.password,
        })
    }
}

async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || auth::hash_password(&password))
        .await
        .map_err(|err| ApiError::Internal(format!("password hashing task failed: {err}")))?
        .map_err(ApiError::from)
}

pub(crate) fn find_by_email<'a>(collections: &'a Collections, email: &str) -> Option<&'a User> {
    let email = normalize_email(email);
    collections.users.iter().find(|user| user.email == email)
}

fn username_taken(collections: &Collections, username: &str, except: Option<Uuid>) -> bool {
    collections.users.iter().any(|user| {
        Some(user.id) != except && user.username.eq_ignore_ascii_case(username)
    })
}

/// Rejects duplicate e-mail or username, then inserts the account.
pub(crate) fn create_account(
    collections: &mut Collections,
    account: PreparedAccount,
    role: Role,
    now: OffsetDateTime,
) -> Result<User, ApiError> {
    if find_by_email(collections, &account.email).is_some() {
        return Err(ApiError::bad_request("User already exists"));
    }
    if username_taken(collections, &account.username, None) {
        return Err(ApiError::bad_request("Username is already taken"));
    }

    let user = User {
        id: Uuid::new_v4(),
        name: account.name,
        username: account.username,
        email: account.email,
        password_hash: account.password_hash,
        role,
        avatar: None,
        bio: String::new(),
        skills: Vec::new(),
        current_streak: 0,
        longest_streak: 0,
        last_active_at: None,
        builder_profile: None,
        created_at: now,
    };
    collections.users.insert(user.clone());
    Ok(user)
}

pub(crate) fn ensure_username_free(
    collections: &Collections,
    username: &str,
    user: Uuid,
) -> Result<(), ApiError> {
    if username_taken(collections, username, Some(user)) {
        return Err(ApiError::bad_request("Username is already taken"));
    }
    Ok(())
}

/// Creates an admin account, or promotes the existing account with that
/// e-mail address and resets its password.
pub async fn ensure_admin(db: &Database, account: NewAccount) -> Result<User, ApiError> {
    let account = account.prepare().await?;
    let now = OffsetDateTime::now_utc();
    db.write(|c| {
        let existing = find_by_email(c, &account.email).map(|user| user.id);
        let Some(id) = existing else {
            return create_account(c, account, Role::Admin, now);
        };
        let user = c.users.get_mut(id).ok_or(ApiError::NotFound("User"))?;
        user.role = Role::Admin;
        user.password_hash = account.password_hash;
        Ok(user.clone())
    })
    .await
}
