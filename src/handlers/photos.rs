//! Equipment photo HTTP handlers.
//!
//! Uploads are raw request bodies: the image bytes with their `Content-Type`,
//! and the original file name in the `file_name` query parameter.

use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    app::AppState,
    error::AppError,
    extract::{AppPath, AppQuery},
    middleware::auth::AuthUser,
    models::photo::{PhotoResponse, UploadPhotoQuery},
    services::photo_service,
};

pub async fn list_photos(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppPath(equipment_id): AppPath<Uuid>,
) -> Result<Json<Vec<PhotoResponse>>, AppError> {
    let photos = photo_service::list_photos(&state.pool, &auth, equipment_id).await?;
    Ok(Json(photos.into_iter().map(PhotoResponse::from).collect()))
}

/// Upload a photo of an equipment item.
///
/// # Request
///
/// ```text
/// POST /api/v1/equipment/{id}/photos?file_name=desk.jpg
/// Content-Type: image/jpeg
///
/// <image bytes>
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: photo metadata
/// - **Error (403)**: caller is neither an admin nor the owner
/// - **Error (413)**: larger than `MAX_UPLOAD_BYTES`
/// - **Error (415)**: not JPEG, PNG or WebP
pub async fn upload_photo(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppPath(equipment_id): AppPath<Uuid>,
    AppQuery(query): AppQuery<UploadPhotoQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<PhotoResponse>), AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());

    let photo = photo_service::upload_photo(
        &state.pool,
        &state.config,
        &auth,
        equipment_id,
        content_type,
        query.file_name.as_deref(),
        &body,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(photo.into())))
}

/// `Content-Disposition` value with a header-safe file name.
fn inline_disposition(file_name: &str) -> HeaderValue {
    let safe: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    HeaderValue::from_str(&format!("inline; filename=\"{}\"", safe))
        .unwrap_or_else(|_| HeaderValue::from_static("inline"))
}

/// Download the photo bytes with their stored content type.
pub async fn download_photo(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppPath(photo_id): AppPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let photo = photo_service::get_photo(&state.pool, &auth, photo_id).await?;
    let bytes = photo_service::read_photo(&state.config, &photo).await?;

    let content_type = HeaderValue::from_str(&photo.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, inline_disposition(&photo.file_name)),
        ],
        bytes,
    ))
}

pub async fn delete_photo(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppPath(photo_id): AppPath<Uuid>,
) -> Result<StatusCode, AppError> {
    photo_service::delete_photo(&state.pool, &state.config, &auth, photo_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_escapes_unsafe_characters() {
        assert_eq!(
            inline_disposition("desk photo.jpg"),
            "inline; filename=\"desk photo.jpg\""
        );
        assert_eq!(
            inline_disposition("sch\"reib\ntisch-é.png"),
            "inline; filename=\"sch_reib_tisch-_.png\""
        );
    }
}
