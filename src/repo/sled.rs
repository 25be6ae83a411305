use std::path::PathBuf;

use sled::{Db, Tree};
use uuid::Uuid;

use crate::error_code::ErrorCode;

use super::{NewVideo, RepoError, Video, VideoRepo};

macro_rules! b {
    ($self:ident.$ident:ident, $expr:expr) => {{
        let $ident = $self.$ident.clone();

        actix_web::rt::task::spawn_blocking(move || $expr)
            .await
            .map_err(|_| RepoError::Canceled)?
            .map_err(SledError::from)?
    }};
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum SledError {
    #[error("Error in database")]
    Sled(#[from] sled::Error),

    #[error("Invalid video json")]
    Video(#[from] serde_json::Error),
}

impl SledError {
    pub(super) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Sled(_) | Self::Video(_) => ErrorCode::SLED_ERROR,
        }
    }
}

#[derive(Clone)]
pub(crate) struct SledRepo {
    videos: Tree,
    user_videos: Tree,
    db: Db,
}

impl std::fmt::Debug for SledRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledRepo").finish()
    }
}

impl SledRepo {
    #[tracing::instrument]
    pub(crate) fn build(path: PathBuf, cache_capacity: u64) -> Result<Self, SledError> {
        let db = sled::Config::new()
            .cache_capacity(cache_capacity)
            .path(path)
            .open()?;

        Self::from_db(db)
    }

    pub(crate) fn from_db(db: Db) -> Result<Self, SledError> {
        Ok(SledRepo {
            videos: db.open_tree("vid-rs-videos-tree")?,
            user_videos: db.open_tree("vid-rs-user-videos-tree")?,
            db,
        })
    }
}

fn user_video_key(user_id: Uuid, video_id: Uuid) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(video_id.as_bytes());
    key
}

#[async_trait::async_trait(?Send)]
impl VideoRepo for SledRepo {
    async fn health_check(&self) -> Result<(), RepoError> {
        let next = self.db.generate_id().map_err(SledError::from)?;

        b!(self.db, db.insert("vid-rs-healthz", &next.to_be_bytes()[..]));
        b!(self.db, db.flush());

        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn create_video(&self, new_video: NewVideo) -> Result<Video, RepoError> {
        let video = Video::draft(new_video);

        let value = serde_json::to_vec(&video).map_err(SledError::from)?;
        let id = video.id;
        let index_key = user_video_key(video.user_id, video.id);

        b!(self.videos, videos.insert(id.as_bytes(), value));
        b!(self.user_videos, user_videos.insert(index_key, &b""[..]));

        Ok(video)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn video(&self, id: Uuid) -> Result<Option<Video>, RepoError> {
        let opt = b!(self.videos, videos.get(id.as_bytes()));

        opt.map(|ivec| serde_json::from_slice(&ivec))
            .transpose()
            .map_err(SledError::from)
            .map_err(RepoError::from)
    }

    #[tracing::instrument(level = "debug", skip(self, video), fields(id = %video.id))]
    async fn update_video(&self, video: &Video) -> Result<(), RepoError> {
        let value = serde_json::to_vec(video).map_err(SledError::from)?;
        let id = video.id;

        let updated = b!(
            self.videos,
            videos.update_and_fetch(id.as_bytes(), |existing| existing.map(|_| value.clone()))
        );

        if updated.is_none() {
            return Err(RepoError::Missing(id));
        }

        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn videos_for_user(&self, user_id: Uuid) -> Result<Vec<Video>, RepoError> {
        let videos = self.videos.clone();
        let user_videos = self.user_videos.clone();

        let found = actix_web::rt::task::spawn_blocking(move || -> Result<_, SledError> {
            let mut found = Vec::new();

            for res in user_videos.scan_prefix(user_id.as_bytes()) {
                let (key, _) = res?;

                let Some(video_id) = key.get(16..) else {
                    continue;
                };

                if let Some(ivec) = videos.get(video_id)? {
                    found.push(serde_json::from_slice::<Video>(&ivec)?);
                }
            }

            Ok(found)
        })
        .await
        .map_err(|_| RepoError::Canceled)??;

        Ok(found)
    }
}
