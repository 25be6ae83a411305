use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use color_eyre::Report;

use crate::error_code::ErrorCode;

pub(crate) struct Error {
    inner: color_eyre::Report,
}

impl Error {
    pub(crate) fn kind(&self) -> Option<&UploadError> {
        self.inner.downcast_ref()
    }

    pub(crate) fn root_cause(&self) -> &(dyn std::error::Error + 'static) {
        self.inner.root_cause()
    }

    pub(crate) fn error_code(&self) -> ErrorCode {
        self.kind()
            .map(|e| e.error_code())
            .unwrap_or(ErrorCode::UNKNOWN_ERROR)
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.inner, f)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.inner, f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl<T> From<T> for Error
where
    UploadError: From<T>,
{
    fn from(error: T) -> Self {
        Error {
            inner: Report::from(UploadError::from(error)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum UploadError {
    #[error("Couldn't upload file")]
    Upload(#[from] actix_form_data::Error),

    #[error("Error in DB")]
    Repo(#[from] crate::repo::RepoError),

    #[error("Error interacting with filesystem")]
    Io(#[from] std::io::Error),

    #[error("Error in store")]
    Store(#[from] crate::store::StoreError),

    #[error("Error storing thumbnail")]
    Thumbnail(#[from] crate::thumbnails::ThumbnailError),

    #[error("Error probing video")]
    Probe(#[from] crate::discover::ProbeError),

    #[error("Error remuxing video")]
    Remux(#[from] crate::ffmpeg::RemuxError),

    #[error("Error authenticating request")]
    Auth(#[from] crate::auth::AuthError),

    #[error("Couldn't build URL from the configured public URL")]
    PublicUrl(#[from] url::ParseError),

    #[error("Invalid video ID")]
    InvalidVideoId,

    #[error("Video {0} not found")]
    VideoNotFound(uuid::Uuid),

    #[error("Not authorized to update this video")]
    NotOwner,

    #[error("No thumbnail for video {0}")]
    ThumbnailNotFound(uuid::Uuid),

    #[error("Requested asset doesn't exist")]
    AssetNotFound,

    #[error("Missing {0} file in upload")]
    NoFiles(&'static str),

    #[error("Unsupported media type {0}")]
    InvalidMediaType(String),

    #[error("Hit limit")]
    Limit(#[from] crate::stream::LimitError),
}

impl UploadError {
    const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Upload(_) => ErrorCode::FILE_UPLOAD_ERROR,
            Self::Repo(e) => e.error_code(),
            Self::Io(_) => ErrorCode::IO_ERROR,
            Self::Store(e) => e.error_code(),
            Self::Thumbnail(e) => e.error_code(),
            Self::Probe(e) => e.error_code(),
            Self::Remux(e) => e.error_code(),
            Self::Auth(e) => e.error_code(),
            Self::PublicUrl(_) => ErrorCode::INVALID_PUBLIC_URL,
            Self::InvalidVideoId => ErrorCode::INVALID_VIDEO_ID,
            Self::VideoNotFound(_) => ErrorCode::VIDEO_NOT_FOUND,
            Self::NotOwner => ErrorCode::NOT_OWNER,
            Self::ThumbnailNotFound(_) => ErrorCode::THUMBNAIL_NOT_FOUND,
            Self::AssetNotFound => ErrorCode::ASSET_NOT_FOUND,
            Self::NoFiles(_) => ErrorCode::VALIDATE_NO_FILES,
            Self::InvalidMediaType(_) => ErrorCode::VALIDATE_MEDIA_TYPE,
            Self::Limit(_) => ErrorCode::VALIDATE_FILE_SIZE,
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            Some(
                UploadError::Limit(_)
                | UploadError::NoFiles(_)
                | UploadError::Upload(_)
                | UploadError::InvalidVideoId
                | UploadError::InvalidMediaType(_),
            ) => StatusCode::BAD_REQUEST,
            Some(UploadError::Auth(e)) if e.is_client_error() => StatusCode::UNAUTHORIZED,
            Some(UploadError::NotOwner) => StatusCode::FORBIDDEN,
            Some(UploadError::Store(e)) if e.is_client_error() => StatusCode::FORBIDDEN,
            Some(
                UploadError::VideoNotFound(_)
                | UploadError::ThumbnailNotFound(_)
                | UploadError::AssetNotFound
                | UploadError::Repo(crate::repo::RepoError::Missing(_)),
            ) => StatusCode::NOT_FOUND,
            Some(UploadError::Store(e)) if e.is_not_found() => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .content_type("application/json")
            .body(
                serde_json::to_string(&serde_json::json!({
                    "msg": self.root_cause().to_string(),
                    "code": self.error_code()
                }))
                .unwrap_or_else(|_| {
                    r#"{"msg":"Request failed","code":"unknown-error"}"#.to_string()
                }),
            )
    }
}
