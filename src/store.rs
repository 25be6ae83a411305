use std::{fmt::Debug, path::Path, time::Duration};

use crate::error_code::ErrorCode;

pub(crate) mod file_store;
pub(crate) mod object_store;

#[derive(Debug, thiserror::Error)]
pub(crate) enum StoreError {
    #[error("Error in file store")]
    FileStore(#[source] crate::store::file_store::FileError),

    #[error("Error in object store")]
    ObjectStore(#[source] crate::store::object_store::ObjectError),

    #[error("Requested file is not found")]
    FileNotFound(#[source] std::io::Error),
}

impl StoreError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::FileStore(e) => e.error_code(),
            Self::ObjectStore(e) => e.error_code(),
            Self::FileNotFound(_) => ErrorCode::OBJECT_NOT_FOUND,
        }
    }

    pub(crate) const fn is_not_found(&self) -> bool {
        matches!(self, Self::FileNotFound(_))
    }

    pub(crate) const fn is_client_error(&self) -> bool {
        matches!(self, Self::FileStore(e) if e.is_client_error())
    }
}

impl From<crate::store::file_store::FileError> for StoreError {
    fn from(value: crate::store::file_store::FileError) -> Self {
        match value {
            crate::store::file_store::FileError::Io(e)
                if e.kind() == std::io::ErrorKind::NotFound =>
            {
                Self::FileNotFound(e)
            }
            e => Self::FileStore(e),
        }
    }
}

impl From<crate::store::object_store::ObjectError> for StoreError {
    fn from(value: crate::store::object_store::ObjectError) -> Self {
        Self::ObjectStore(value)
    }
}

/// Durable storage for finished videos
#[async_trait::async_trait(?Send)]
pub(crate) trait Store: Clone + Debug {
    async fn health_check(&self) -> Result<(), StoreError>;

    /// Stream the local file at `path` into the store under `key`
    ///
    /// Nothing becomes visible under `key` unless the whole file was written.
    async fn save_file(
        &self,
        path: &Path,
        key: &str,
        content_type: mime::Mime,
    ) -> Result<(), StoreError>;

    /// Mint a URL granting read access to `key` for `ttl`
    ///
    /// Each call produces a different URL, even for the same key.
    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<url::Url, StoreError>;
}
