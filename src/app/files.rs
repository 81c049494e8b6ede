use crate::error::ApiError;
use crate::state;
use crate::uploads::{self, UploadError};

use axum::extract::{Path as AxumPath, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::IntoResponse;

/// Serves stored uploads. Bad or escaping paths look exactly like missing files.
pub(crate) async fn stored_file(
    State(state): State<state::AppState>,
    AxumPath(path): AxumPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(content_type) = uploads::content_type_for_path(&path) else {
        return Err(ApiError::NotFound("File"));
    };
    let root = state.uploads_root()?;

    let resolved = match uploads::resolve_file_path(&root, &path) {
        Ok(resolved) => resolved,
        Err(UploadError::NotFound | UploadError::BadPath) => {
            return Err(ApiError::NotFound("File"));
        }
        Err(err) => return Err(err.into()),
    };

    let bytes = match tokio::fs::read(&resolved).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound("File"));
        }
        Err(err) => {
            return Err(ApiError::Internal(format!(
                "failed to read {}: {err}",
                resolved.display()
            )));
        }
    };

    Ok((
        [
            (CONTENT_TYPE, content_type),
            (CACHE_CONTROL, "public, max-age=86400"),
        ],
        bytes,
    ))
}
