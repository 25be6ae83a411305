mod key_policy;


use std::{path::Path, sync::Arc};

use actix_web::{http::header::HeaderMap, web::Bytes};
use futures_core::Stream;
use sha2::{Digest, Sha256};
use streem::IntoStreamer;
use tokio::io::AsyncWriteExt;
use tracing::Instrument;
use url::Url;
use uuid::Uuid;

use crate::{
    auth,
    discover::{self, ProbeTool},
    error::{Error, UploadError},
    ffmpeg::{RemuxTool, PROCESSED_SUFFIX},
    formats::mimes,
    future::WithMetrics,
    repo::{ArcRepo, Video},
    store::Store,
    thumbnails::{ArcThumbnails, Thumbnail},
    tmp_file::{release_all, TmpDir, TmpFile},
};

pub(crate) use key_policy::{KeyPolicy, KeyStrategy};

/// Largest accepted video upload, inclusive
pub(crate) const MAX_VIDEO_SIZE: u64 = 1 << 30;

/// Largest accepted thumbnail upload, inclusive
pub(crate) const MAX_THUMBNAIL_SIZE: u64 = 10 << 20;

/// External tools the pipeline shells out to
#[derive(Clone)]
pub(crate) struct MediaTools {
    pub(crate) probe: Arc<dyn ProbeTool>,
    pub(crate) remux: Arc<dyn RemuxTool>,
}

impl std::fmt::Debug for MediaTools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaTools").finish()
    }
}

/// An upload written to scratch space, waiting to be processed
#[derive(Debug)]
pub(crate) struct StagedVideo {
    file: TmpFile,
    content_hash: [u8; 32],
    size: u64,
}

/// Resolve the caller and the video they are acting on
///
/// Fails before touching the request body, so a rejected request leaves nothing behind.
#[tracing::instrument(level = "debug", skip(repo, headers, jwt_secret))]
pub(crate) async fn authorize(
    repo: &ArcRepo,
    headers: &HeaderMap,
    jwt_secret: &str,
    video_id: &str,
) -> Result<Video, Error> {
    let video_id = Uuid::parse_str(video_id).map_err(|_| UploadError::InvalidVideoId)?;

    let token = auth::bearer_token(headers)?;
    let user_id = auth::validate_jwt(token, jwt_secret)?;

    let video = repo
        .video(video_id)
        .await?
        .ok_or(UploadError::VideoNotFound(video_id))?;

    if !video.is_owned_by(user_id) {
        return Err(UploadError::NotOwner.into());
    }

    Ok(video)
}

/// Write an uploaded video into a fresh scratch file
///
/// The declared media type is checked before any file is created, and a part without one is
/// rejected. The staged file is removed again if the upload fails partway.
#[tracing::instrument(level = "debug", skip(tmp_dir, stream))]
pub(crate) async fn stage_video<S>(
    tmp_dir: &TmpDir,
    content_type: Option<&mime::Mime>,
    stream: S,
) -> Result<StagedVideo, Error>
where
    S: Stream<Item = Result<Bytes, Error>>,
{
    let content_type = declared(content_type)?;

    if content_type.essence_str() != mimes::VIDEO_MP4 {
        return Err(UploadError::InvalidMediaType(content_type.to_string()).into());
    }

    let file = tmp_dir.tmp_file(Some(mimes::media_type_to_ext(mimes::VIDEO_MP4)));

    match write_stream(&file, stream).await {
        Ok((content_hash, size)) => {
            tracing::debug!("Staged {size} bytes");

            Ok(StagedVideo {
                file,
                content_hash,
                size,
            })
        }
        Err(e) => {
            release_all(vec![file]).await;
            Err(e)
        }
    }
}

fn declared(content_type: Option<&mime::Mime>) -> Result<&mime::Mime, UploadError> {
    content_type.ok_or_else(|| UploadError::InvalidMediaType(String::from("none")))
}

async fn write_stream<S>(path: &Path, stream: S) -> Result<([u8; 32], u64), Error>
where
    S: Stream<Item = Result<Bytes, Error>>,
{
    let mut file = tokio::fs::File::create(path).await?;
    let mut hasher = Sha256::new();
    let mut size = 0;

    let stream = std::pin::pin!(stream);
    let mut stream = stream.into_streamer();

    while let Some(bytes) = stream.try_next().await? {
        hasher.update(&bytes);
        size += bytes.len() as u64;

        file.write_all(&bytes).await?;
    }

    file.flush().await?;

    Ok((hasher.finalize().into(), size))
}

/// Collect an uploaded thumbnail into memory
#[tracing::instrument(level = "debug", skip(stream))]
pub(crate) async fn read_thumbnail<S>(
    content_type: Option<&mime::Mime>,
    stream: S,
) -> Result<Thumbnail, Error>
where
    S: Stream<Item = Result<Bytes, Error>>,
{
    let content_type = declared(content_type)?;

    if content_type.type_() != mime::IMAGE {
        return Err(UploadError::InvalidMediaType(content_type.to_string()).into());
    }

    let stream = std::pin::pin!(stream);
    let mut stream = stream.into_streamer();

    let mut buf = Vec::new();

    while let Some(bytes) = stream.try_next().await? {
        buf.extend_from_slice(&bytes);
    }

    Ok(Thumbnail {
        media_type: content_type.clone(),
        bytes: Bytes::from(buf),
    })
}

/// Store a video's thumbnail and record the URL it is served from
#[tracing::instrument(level = "debug", skip(repo, thumbnails, public_url, thumbnail))]
pub(crate) async fn attach_thumbnail(
    repo: &ArcRepo,
    thumbnails: &ArcThumbnails,
    public_url: &Url,
    video_id: Uuid,
    thumbnail: Thumbnail,
) -> Result<Video, Error> {
    let served_at = thumbnails.set(video_id, thumbnail).await?;
    let thumbnail_url = public_url.join(&served_at)?;

    metrics::counter!(crate::init_metrics::THUMBNAILS).increment(1);

    let mut current = repo
        .video(video_id)
        .await?
        .ok_or(UploadError::VideoNotFound(video_id))?;

    current.thumbnail_url = Some(thumbnail_url.to_string());
    current.touch();

    repo.update_video(&current).await?;

    Ok(current)
}

/// Turn a staged upload into a stored, playable video
///
/// Probing and remuxing run side by side over the staged file. Both are always awaited, so
/// neither leaves output behind when the other fails. The video's key is persisted only after
/// the upload succeeded, and every scratch file is removed before returning.
#[tracing::instrument(skip_all, fields(%video_id, size = staged.size))]
pub(crate) async fn ingest_video<S>(
    tools: &MediaTools,
    store: &S,
    repo: &ArcRepo,
    key_policy: &KeyPolicy,
    video_id: Uuid,
    staged: StagedVideo,
) -> Result<Video, Error>
where
    S: Store,
{
    let StagedVideo {
        file, content_hash, ..
    } = staged;

    let processed = file.with_suffix(PROCESSED_SUFFIX);

    let res = process_and_store(
        tools,
        store,
        repo,
        key_policy,
        video_id,
        &file,
        &processed,
        &content_hash,
    )
    .with_metrics(crate::init_metrics::INGEST_VIDEO)
    .await;

    release_all(vec![file, processed]).await;

    metrics::counter!(crate::init_metrics::INGEST_END, "success" => res.is_ok().to_string())
        .increment(1);

    res
}

#[allow(clippy::too_many_arguments)]
async fn process_and_store<S>(
    tools: &MediaTools,
    store: &S,
    repo: &ArcRepo,
    key_policy: &KeyPolicy,
    video_id: Uuid,
    input: &Path,
    processed: &Path,
    content_hash: &[u8; 32],
) -> Result<Video, Error>
where
    S: Store,
{
    let (orientation, remuxed) = tokio::join!(
        discover::classify(&*tools.probe, input)
            .instrument(tracing::debug_span!("Classify")),
        tools
            .remux
            .remux_faststart(input, processed)
            .instrument(tracing::debug_span!("Remux")),
    );

    let orientation = orientation?;
    remuxed?;

    let key = key_policy.key(orientation, video_id, content_hash);

    store
        .save_file(processed, &key, mimes::video_mp4())
        .instrument(tracing::info_span!("Upload", %key))
        .await?;

    metrics::counter!(crate::init_metrics::UPLOADS, "orientation" => orientation.as_str())
        .increment(1);

    // Other fields may have changed while the video was processing
    let mut current = match repo.video(video_id).await {
        Ok(Some(current)) => current,
        Ok(None) => {
            orphaned(&key);
            return Err(UploadError::VideoNotFound(video_id).into());
        }
        Err(e) => {
            orphaned(&key);
            return Err(e.into());
        }
    };

    current.video_key = Some(key.clone());
    current.touch();

    if let Err(e) = repo.update_video(&current).await {
        orphaned(&key);
        return Err(e.into());
    }

    Ok(current)
}

fn orphaned(key: &str) {
    metrics::counter!(crate::init_metrics::ORPHANED_OBJECTS).increment(1);
    tracing::error!("Failed to persist video key, {key} is orphaned in the store");
}
