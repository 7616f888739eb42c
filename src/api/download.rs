use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::{ApiError, AppState};

/// GET /download-cv
///
/// Streams the configured CV as an attachment.
pub async fn download_cv(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let (cv_path, cv_filename) = {
        let config = state.config().read().await;
        (
            config.server.cv_path.clone(),
            config.server.cv_filename.clone(),
        )
    };

    let bytes = match tokio::fs::read(&cv_path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound("CV file not found".to_string()));
        }
        Err(e) => return Err(ApiError::internal(format!("Failed to read CV: {e}"))),
    };

    let filename = if cv_filename.trim().is_empty() {
        Path::new(&cv_path)
            .file_name()
            .map_or_else(|| "cv.pdf".to_string(), |n| n.to_string_lossy().into_owned())
    } else {
        cv_filename
    };

    let mime = mime_guess::from_path(&cv_path).first_or_octet_stream();
    let disposition = format!("attachment; filename=\"{}\"", filename.replace('"', ""));

    info!(path = %cv_path, bytes = bytes.len(), "Serving CV download");

    Ok((
        [
            (header::CONTENT_TYPE, mime.as_ref().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from(bytes),
    )
        .into_response())
}
