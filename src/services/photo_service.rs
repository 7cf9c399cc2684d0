//! Equipment photos: validation, storage on disk and metadata.
//!
//! Files are written to `<UPLOAD_DIR>/photos/<photo_id>.<ext>`; only the path
//! relative to the upload directory is stored, so the directory can move.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::{
    config::Config,
    db::DbPool,
    error::AppError,
    middleware::auth::AuthUser,
    models::photo::Photo,
    services::equipment_service,
};

/// File extension for an accepted image content type.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    // Ignore parameters such as "; charset=binary"
    let essence = content_type.split(';').next().unwrap_or("").trim();
    match essence.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Keep the last path segment of a client supplied file name.
pub fn sanitize_file_name(name: Option<&str>, fallback: &str) -> String {
    let base = name
        .and_then(|n| n.rsplit(['/', '\\']).next())
        .map(str::trim)
        .filter(|n| !n.is_empty() && *n != "." && *n != "..")
        .unwrap_or(fallback);
    base.chars().filter(|c| !c.is_control()).take(255).collect()
}

/// Reject empty or oversized uploads.
pub fn check_size(len: usize, max: usize) -> Result<(), AppError> {
    if len == 0 {
        return Err(AppError::InvalidRequest("Request body is empty".to_string()));
    }
    if len > max {
        return Err(AppError::PayloadTooLarge);
    }
    Ok(())
}

/// Write bytes below the upload directory, creating parent directories.
pub async fn store_file(upload_dir: &Path, relative: &str, bytes: &[u8]) -> Result<PathBuf, AppError> {
    let path = upload_dir.join(relative);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

/// Remove a stored file. Already missing files are fine.
pub async fn remove_file(upload_dir: &Path, relative: &str) -> Result<(), AppError> {
    match tokio::fs::remove_file(upload_dir.join(relative)).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Store a photo of an equipment item. Admin or the current owner.
///
/// # Errors
///
/// - `UnsupportedMediaType`: content type is not JPEG, PNG or WebP
/// - `PayloadTooLarge`: body exceeds `MAX_UPLOAD_BYTES`
pub async fn upload_photo(
    pool: &DbPool,
    config: &Config,
    user: &AuthUser,
    equipment_id: Uuid,
    content_type: Option<&str>,
    file_name: Option<&str>,
    bytes: &[u8],
) -> Result<Photo, AppError> {
    let equipment = equipment_service::get_equipment(pool, user, equipment_id).await?;
    if !equipment_service::can_contribute(user, &equipment) {
        return Err(AppError::Forbidden);
    }

    let content_type = content_type.unwrap_or_default();
    let ext = extension_for(content_type).ok_or_else(|| {
        AppError::UnsupportedMediaType(format!(
            "Expected image/jpeg, image/png or image/webp, got '{}'",
            content_type
        ))
    })?;
    check_size(bytes.len(), config.max_upload_bytes)?;

    let id = Uuid::new_v4();
    let relative = format!("photos/{}.{}", id, ext);
    let file_name = sanitize_file_name(file_name, &format!("photo.{}", ext));

    store_file(&config.upload_dir, &relative, bytes).await?;

    let inserted = sqlx::query_as::<_, Photo>(
        r#"
        INSERT INTO equipment_photos (id, equipment_id, file_name, content_type, size_bytes,
                                      storage_path, uploaded_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(equipment_id)
    .bind(&file_name)
    .bind(format!("image/{}", if ext == "jpg" { "jpeg" } else { ext }))
    .bind(bytes.len() as i64)
    .bind(&relative)
    .bind(user.id)
    .fetch_one(pool)
    .await;

    match inserted {
        Ok(photo) => {
            tracing::info!(photo_id = %photo.id, equipment_id = %equipment_id, size = bytes.len(), "Photo stored");
            Ok(photo)
        }
        Err(e) => {
            // Do not leave orphaned files behind
            if let Err(cleanup) = remove_file(&config.upload_dir, &relative).await {
                tracing::warn!("Failed to remove orphaned photo {}: {:?}", relative, cleanup);
            }
            Err(e.into())
        }
    }
}

pub async fn list_photos(
    pool: &DbPool,
    user: &AuthUser,
    equipment_id: Uuid,
) -> Result<Vec<Photo>, AppError> {
    equipment_service::get_equipment(pool, user, equipment_id).await?;

    let photos = sqlx::query_as::<_, Photo>(
        "SELECT * FROM equipment_photos WHERE equipment_id = $1 ORDER BY created_at DESC",
    )
    .bind(equipment_id)
    .fetch_all(pool)
    .await?;

    Ok(photos)
}

/// Fetch photo metadata, checking that the user may see its equipment.
pub async fn get_photo(pool: &DbPool, user: &AuthUser, photo_id: Uuid) -> Result<Photo, AppError> {
    let photo = sqlx::query_as::<_, Photo>(
        r#"
        SELECT p.* FROM equipment_photos p
        JOIN equipment e ON e.id = p.equipment_id
        WHERE p.id = $1 AND e.organization_id = $2
        "#,
    )
    .bind(photo_id)
    .bind(user.organization_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("photo"))?;

    equipment_service::get_equipment(pool, user, photo.equipment_id)
        .await
        .map_err(|e| match e {
            AppError::NotFound(_) => AppError::NotFound("photo"),
            other => other,
        })?;

    Ok(photo)
}

/// Read the bytes of a stored photo.
pub async fn read_photo(config: &Config, photo: &Photo) -> Result<Vec<u8>, AppError> {
    match tokio::fs::read(config.upload_dir.join(&photo.storage_path)).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::error!(photo_id = %photo.id, "Photo file missing from storage");
            Err(AppError::NotFound("photo"))
        }
        Err(e) => Err(e.into()),
    }
}

/// Delete a photo and its file. Admin only.
pub async fn delete_photo(
    pool: &DbPool,
    config: &Config,
    user: &AuthUser,
    photo_id: Uuid,
) -> Result<(), AppError> {
    user.require_admin()?;
    let photo = get_photo(pool, user, photo_id).await?;

    sqlx::query("DELETE FROM equipment_photos WHERE id = $1")
        .bind(photo.id)
        .execute(pool)
        .await?;
    remove_file(&config.upload_dir, &photo.storage_path).await?;

    tracing::info!(photo_id = %photo.id, "Photo deleted");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_only_supported_images() {
        assert_eq!(extension_for("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for("IMAGE/PNG"), Some("png"));
        assert_eq!(extension_for("image/webp; q=1"), Some("webp"));
        assert_eq!(extension_for("image/gif"), None);
        assert_eq!(extension_for("application/pdf"), None);
        assert_eq!(extension_for(""), None);
    }

    #[test]
    fn file_names_lose_directories() {
        assert_eq!(sanitize_file_name(Some("../../etc/passwd"), "x"), "passwd");
        assert_eq!(sanitize_file_name(Some("C:\\photos\\desk.png"), "x"), "desk.png");
        assert_eq!(sanitize_file_name(Some("  "), "photo.jpg"), "photo.jpg");
        assert_eq!(sanitize_file_name(Some("dir/.."), "photo.jpg"), "photo.jpg");
        assert_eq!(sanitize_file_name(None, "photo.png"), "photo.png");
    }

    #[test]
    fn size_limits() {
        assert!(matches!(check_size(0, 10), Err(AppError::InvalidRequest(_))));
        assert!(check_size(10, 10).is_ok());
        assert!(matches!(check_size(11, 10), Err(AppError::PayloadTooLarge)));
    }

    #[tokio::test]
    async fn stores_and_removes_files() {
        let dir = std::env::temp_dir().join(format!("inventory-photos-{}", Uuid::new_v4()));

        let path = store_file(&dir, "photos/a.png", b"png-bytes").await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"png-bytes");

        remove_file(&dir, "photos/a.png").await.unwrap();
        assert!(!path.exists());

        // Second removal is a no-op
        remove_file(&dir, "photos/a.png").await.unwrap();

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
