pub(crate) mod sled;

use std::{fmt::Debug, sync::Arc};

use time::OffsetDateTime;
use uuid::Uuid;

use crate::error_code::ErrorCode;

pub(crate) type ArcRepo = Arc<dyn VideoRepo>;

/// A video's metadata
///
/// `video_key` is only ever set after the object it names has been fully uploaded.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub(crate) struct Video {
    pub(crate) id: Uuid,
    pub(crate) user_id: Uuid,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) thumbnail_url: Option<String>,
    pub(crate) video_key: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) updated_at: OffsetDateTime,
}

#[derive(Debug)]
pub(crate) struct NewVideo {
    pub(crate) user_id: Uuid,
    pub(crate) title: String,
    pub(crate) description: String,
}

impl Video {
    pub(crate) fn draft(NewVideo { user_id, title, description }: NewVideo) -> Self {
        let now = OffsetDateTime::now_utc();

        Video {
            id: Uuid::now_v7(),
            user_id,
            title,
            description,
            thumbnail_url: None,
            video_key: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = OffsetDateTime::now_utc();
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum RepoError {
    #[error("Error in sled")]
    SledError(#[from] self::sled::SledError),

    #[error("Video {0} does not exist")]
    Missing(Uuid),

    #[error("Panic in blocking operation")]
    Canceled,
}

impl RepoError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::SledError(e) => e.error_code(),
            Self::Missing(_) => ErrorCode::VIDEO_NOT_FOUND,
            Self::Canceled => ErrorCode::PANIC,
        }
    }
}

#[async_trait::async_trait(?Send)]
pub(crate) trait VideoRepo: Debug + Send + Sync {
    async fn health_check(&self) -> Result<(), RepoError>;

    async fn create_video(&self, new_video: NewVideo) -> Result<Video, RepoError>;

    async fn video(&self, id: Uuid) -> Result<Option<Video>, RepoError>;

    /// Overwrite a stored record. Concurrent writers are not serialized, the last write wins.
    async fn update_video(&self, video: &Video) -> Result<(), RepoError>;

    async fn videos_for_user(&self, user_id: Uuid) -> Result<Vec<Video>, RepoError>;
}
