use crate::auth::AuthState;
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::store::Database;
use crate::uploads;

use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub(crate) auth: AuthState,
    pub db: Arc<Database>,
}

impl AppState {
    pub(crate) fn uploads_root(&self) -> Result<PathBuf, ApiError> {
        self.config
            .data_dir
            .as_ref()
            .map(|dir| dir.join(uploads::UPLOADS_DIR))
            .ok_or(ApiError::Unavailable("file uploads are not configured"))
    }
}
