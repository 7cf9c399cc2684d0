//! Equipment photo models.
//!
//! Photo bytes live on disk under the configured upload directory; the
//! `equipment_photos` table holds the metadata and the relative storage path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Photo {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,

    /// Path relative to the upload directory
    pub storage_path: String,

    pub uploaded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Query string of a photo upload.
#[derive(Debug, Default, Deserialize)]
pub struct UploadPhotoQuery {
    pub file_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PhotoResponse {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Drops the on-disk path, which is an implementation detail.
impl From<Photo> for PhotoResponse {
    fn from(photo: Photo) -> Self {
        Self {
            id: photo.id,
            equipment_id: photo.equipment_id,
            file_name: photo.file_name,
            content_type: photo.content_type,
            size_bytes: photo.size_bytes,
            uploaded_by: photo.uploaded_by,
            created_at: photo.created_at,
        }
    }
}
