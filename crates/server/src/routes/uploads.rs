//! Image upload handler.
//!
//! Staff upload product photos, cover images and avatars here and store the
//! returned URL on the record. Stored files are served under `/uploads`.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::middleware::RequireStaff;
use crate::services::uploads::{StoredFile, UploadError};
use crate::state::AppState;

/// Name of the multipart field carrying the image.
pub const FILE_FIELD: &str = "file";

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the `/api/uploads` router. Request bodies are capped just above
/// `max_bytes`; the handler enforces the exact file limit.
pub fn router(max_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/", post(upload))
        .layer(DefaultBodyLimit::max(
            max_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES),
        ))
}

/// POST /api/uploads
///
/// Multipart form with a single `file` field. Other fields are ignored.
#[instrument(skip(state, user, multipart), fields(user_id = %user.id))]
pub async fn upload(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<StoredFile>)> {
    let store = state.uploads();
    let max_bytes = store.max_bytes();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let content_type = field.content_type().map(str::to_owned);

        let mut data = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| AppError::BadRequest(format!("failed to read upload: {e}")))?
        {
            if data.len() + chunk.len() > max_bytes {
                return Err(UploadError::TooLarge { max_bytes }.into());
            }
            data.extend_from_slice(&chunk);
        }

        let stored = store.save(content_type.as_deref(), &data).await?;
        tracing::info!(file = %stored.file_name, size = stored.size, "upload stored");
        return Ok((StatusCode::CREATED, Json(stored)));
    }

    Err(UploadError::Missing.into())
}
