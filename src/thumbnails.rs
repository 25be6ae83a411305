use std::{fmt::Debug, path::PathBuf, sync::Arc};

use actix_web::web::Bytes;
use dashmap::DashMap;
use uuid::Uuid;

use crate::{error_code::ErrorCode, formats::mimes};

pub(crate) type ArcThumbnails = Arc<dyn ThumbnailStore>;

#[derive(Clone, Debug)]
pub(crate) struct Thumbnail {
    pub(crate) media_type: mime::Mime,
    pub(crate) bytes: Bytes,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ThumbnailError {
    #[error("Failed to read or write thumbnail")]
    Io(#[from] std::io::Error),
}

impl ThumbnailError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Io(_) => ErrorCode::FILE_IO_ERROR,
        }
    }
}

/// Keeps one thumbnail per video
#[async_trait::async_trait(?Send)]
pub(crate) trait ThumbnailStore: Debug + Send + Sync {
    /// Store a video's thumbnail, replacing any previous one
    ///
    /// Returns the path, relative to the public url, the thumbnail is served from.
    async fn set(&self, video_id: Uuid, thumbnail: Thumbnail) -> Result<String, ThumbnailError>;

    async fn get(&self, video_id: Uuid) -> Result<Option<Thumbnail>, ThumbnailError>;
}

/// Thumbnails written to the assets directory as `{id}.{ext}`
#[derive(Debug)]
pub(crate) struct AssetsThumbnails {
    assets_root: PathBuf,
}

impl AssetsThumbnails {
    pub(crate) fn new(assets_root: PathBuf) -> Self {
        AssetsThumbnails { assets_root }
    }

    /// Every `{id}.{ext}` file for the video, with its extension
    ///
    /// Extensions come from media subtypes and may contain dots themselves.
    async fn find_all(&self, video_id: Uuid) -> Result<Vec<(PathBuf, String)>, ThumbnailError> {
        let prefix = format!("{video_id}.");
        let mut found = Vec::new();

        let mut entries = tokio::fs::read_dir(&self.assets_root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();

            let Some(ext) = name.to_str().and_then(|name| name.strip_prefix(&prefix)) else {
                continue;
            };

            if !ext.is_empty() {
                found.push((entry.path(), String::from(ext)));
            }
        }

        Ok(found)
    }
}

#[async_trait::async_trait(?Send)]
impl ThumbnailStore for AssetsThumbnails {
    #[tracing::instrument(level = "debug", skip(self, thumbnail))]
    async fn set(&self, video_id: Uuid, thumbnail: Thumbnail) -> Result<String, ThumbnailError> {
        let ext = mimes::media_type_to_ext(thumbnail.media_type.essence_str());
        let file_name = format!("{video_id}.{ext}");
        let path = self.assets_root.join(&file_name);

        // a re-upload may change the extension
        for (previous, _) in self.find_all(video_id).await? {
            if previous != path {
                tokio::fs::remove_file(previous).await?;
            }
        }

        tokio::fs::write(&path, &thumbnail.bytes).await?;

        Ok(format!("assets/{file_name}"))
    }

    async fn get(&self, video_id: Uuid) -> Result<Option<Thumbnail>, ThumbnailError> {
        let Some((path, ext)) = self.find_all(video_id).await?.into_iter().next() else {
            return Ok(None);
        };

        let bytes = tokio::fs::read(&path).await?;

        Ok(Some(Thumbnail {
            media_type: thumbnail_media_type(&ext),
            bytes: Bytes::from(bytes),
        }))
    }
}

// Extensions are image subtypes, so one without a known mapping names its own media type
fn thumbnail_media_type(ext: &str) -> mime::Mime {
    let media_type = mimes::ext_to_content_type(ext);

    if media_type == mime::APPLICATION_OCTET_STREAM && ext != "bin" {
        if let Ok(image) = format!("image/{ext}").parse() {
            return image;
        }
    }

    media_type
}

/// Thumbnails held in process memory, lost on restart
#[derive(Debug, Default)]
pub(crate) struct MemoryThumbnails {
    inner: DashMap<Uuid, Thumbnail>,
}

#[async_trait::async_trait(?Send)]
impl ThumbnailStore for MemoryThumbnails {
    async fn set(&self, video_id: Uuid, thumbnail: Thumbnail) -> Result<String, ThumbnailError> {
        self.inner.insert(video_id, thumbnail);

        Ok(format!("thumbnails/{video_id}"))
    }

    async fn get(&self, video_id: Uuid) -> Result<Option<Thumbnail>, ThumbnailError> {
        Ok(self.inner.get(&video_id).map(|entry| entry.value().clone()))
    }
}
