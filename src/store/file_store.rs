use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::Url;
use uuid::Uuid;

use crate::{error_code::ErrorCode, store::Store};

use super::StoreError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub(crate) enum FileError {
    #[error("Failed to read or write file")]
    Io(#[from] std::io::Error),

    #[error("Object key is not a relative path")]
    InvalidKey,

    #[error("Public url cannot carry a media path")]
    InvalidUrl,

    #[error("Signing key is unusable")]
    SigningKey,

    #[error("Link signature does not match")]
    InvalidSignature,

    #[error("Link has expired")]
    ExpiredSignature,
}

impl FileError {
    pub(super) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Io(_) => ErrorCode::FILE_IO_ERROR,
            Self::InvalidKey => ErrorCode::INVALID_OBJECT_KEY,
            Self::InvalidUrl | Self::SigningKey => ErrorCode::SIGNATURE_ERROR,
            Self::InvalidSignature => ErrorCode::INVALID_SIGNATURE,
            Self::ExpiredSignature => ErrorCode::EXPIRED_SIGNATURE,
        }
    }

    pub(super) const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidKey | Self::InvalidSignature | Self::ExpiredSignature
        )
    }
}

/// Query parameters carried by a signed media link
#[derive(Debug, serde::Deserialize, serde::Serialize)]
pub(crate) struct SignedQuery {
    pub(crate) expires: i64,
    pub(crate) nonce: String,
    pub(crate) signature: String,
}

#[derive(Clone)]
pub(crate) struct FileStore {
    root_dir: PathBuf,
    media_url: Url,
    signing_secret: Arc<str>,
}

#[async_trait::async_trait(?Send)]
impl Store for FileStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        tokio::fs::metadata(&self.root_dir)
            .await
            .map_err(FileError::from)?;

        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn save_file(
        &self,
        path: &Path,
        key: &str,
        _content_type: mime::Mime,
    ) -> Result<(), StoreError> {
        let target = self.key_to_path(key)?;

        safe_create_parent(&target).await?;

        // Written under a hidden name first so a partial copy is never visible at `key`
        let partial = target.with_file_name(format!(".{}.part", Uuid::new_v4()));

        if let Err(e) = tokio::fs::copy(path, &partial).await {
            remove_partial(&partial).await;
            return Err(FileError::from(e).into());
        }

        if let Err(e) = tokio::fs::rename(&partial, &target).await {
            remove_partial(&partial).await;
            return Err(FileError::from(e).into());
        }

        Ok(())
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<Url, StoreError> {
        self.key_to_path(key)?;

        let expires = unix_now().saturating_add(ttl.as_secs().try_into().unwrap_or(i64::MAX));
        let nonce = Uuid::new_v4().simple().to_string();
        let signature = self.sign(key, expires, &nonce)?;

        let mut url = self.media_url.clone();

        url.path_segments_mut()
            .map_err(|()| FileError::InvalidUrl)?
            .pop_if_empty()
            .extend(key.split('/'));

        url.query_pairs_mut()
            .append_pair("expires", &expires.to_string())
            .append_pair("nonce", &nonce)
            .append_pair("signature", &signature);

        Ok(url)
    }
}

impl FileStore {
    #[tracing::instrument(skip(signing_secret))]
    pub(crate) async fn build(
        root_dir: PathBuf,
        public_url: &Url,
        signing_secret: &str,
    ) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(&root_dir)
            .await
            .map_err(FileError::from)?;

        Ok(FileStore {
            root_dir,
            media_url: public_url.join("media/").map_err(|_| FileError::InvalidUrl)?,
            signing_secret: Arc::from(signing_secret),
        })
    }

    /// Check a media link against its signature, returning the file it grants access to
    #[tracing::instrument(level = "debug", skip(self, query))]
    pub(crate) fn verify(&self, key: &str, query: &SignedQuery) -> Result<PathBuf, StoreError> {
        self.verify_at(key, query, unix_now())
    }

    fn verify_at(&self, key: &str, query: &SignedQuery, now: i64) -> Result<PathBuf, StoreError> {
        let path = self.key_to_path(key)?;

        let signature = hex::decode(&query.signature).map_err(|_| FileError::InvalidSignature)?;

        self.mac(key, query.expires, &query.nonce)?
            .verify_slice(&signature)
            .map_err(|_| FileError::InvalidSignature)?;

        if query.expires < now {
            return Err(FileError::ExpiredSignature.into());
        }

        Ok(path)
    }

    fn mac(&self, key: &str, expires: i64, nonce: &str) -> Result<HmacSha256, FileError> {
        let mut mac = HmacSha256::new_from_slice(self.signing_secret.as_bytes())
            .map_err(|_| FileError::SigningKey)?;

        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        mac.update(b"\n");
        mac.update(nonce.as_bytes());

        Ok(mac)
    }

    fn sign(&self, key: &str, expires: i64, nonce: &str) -> Result<String, FileError> {
        let mac = self.mac(key, expires, nonce)?;

        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn key_to_path(&self, key: &str) -> Result<PathBuf, FileError> {
        let relative = Path::new(key);

        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));

        if !is_plain {
            return Err(FileError::InvalidKey);
        }

        Ok(self.root_dir.join(relative))
    }
}

fn unix_now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove partial file {path:?}: {e}");
        }
    }
}

pub(crate) async fn safe_create_parent<P: AsRef<Path>>(path: P) -> Result<(), FileError> {
    if let Some(path) = path.as_ref().parent() {
        tokio::fs::create_dir_all(path).await?;
    }

    Ok(())
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("root_dir", &self.root_dir)
            .field("media_url", &self.media_url.as_str())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use url::Url;

    use super::{FileError, FileStore, SignedQuery};
    use crate::store::{Store, StoreError};

    async fn store(root: &std::path::Path) -> FileStore {
        FileStore::build(
            root.join("files"),
            &Url::parse("http://localhost:8080/").unwrap(),
            "test-secret",
        )
        .await
        .unwrap()
    }

    fn query_of(url: &Url) -> SignedQuery {
        let mut expires = None;
        let mut nonce = None;
        let mut signature = None;

        for (k, v) in url.query_pairs() {
            match k.as_ref() {
                "expires" => expires = Some(v.parse().unwrap()),
                "nonce" => nonce = Some(v.into_owned()),
                "signature" => signature = Some(v.into_owned()),
                _ => {}
            }
        }

        SignedQuery {
            expires: expires.unwrap(),
            nonce: nonce.unwrap(),
            signature: signature.unwrap(),
        }
    }

    #[tokio::test]
    async fn saves_file_under_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).await;

        let source = dir.path().join("source.mp4");
        tokio::fs::write(&source, b"moov").await.unwrap();

        store
            .save_file(&source, "landscape/abc.mp4", crate::formats::mimes::video_mp4())
            .await
            .unwrap();

        let saved = tokio::fs::read(dir.path().join("files/landscape/abc.mp4"))
            .await
            .unwrap();
        assert_eq!(saved, b"moov");

        let mut entries = tokio::fs::read_dir(dir.path().join("files/landscape"))
            .await
            .unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name());
        }
        assert_eq!(names, ["abc.mp4"]);
    }

    #[tokio::test]
    async fn missing_source_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).await;

        let res = store
            .save_file(
                &dir.path().join("nope.mp4"),
                "portrait/abc.mp4",
                crate::formats::mimes::video_mp4(),
            )
            .await;

        assert!(res.is_err());

        let mut entries = tokio::fs::read_dir(dir.path().join("files/portrait"))
            .await
            .unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).await;

        for key in ["", "../escape.mp4", "/etc/passwd", "landscape/../../x"] {
            assert!(
                matches!(
                    store.signed_url(key, Duration::from_secs(60)).await,
                    Err(StoreError::FileStore(FileError::InvalidKey))
                ),
                "{key}"
            );
        }
    }

    #[tokio::test]
    async fn signed_urls_differ_and_verify() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).await;

        let first = store
            .signed_url("landscape/abc.mp4", Duration::from_secs(300))
            .await
            .unwrap();
        let second = store
            .signed_url("landscape/abc.mp4", Duration::from_secs(300))
            .await
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(first.path(), "/media/landscape/abc.mp4");

        for url in [&first, &second] {
            let path = store.verify("landscape/abc.mp4", &query_of(url)).unwrap();
            assert!(path.ends_with("files/landscape/abc.mp4"));
        }
    }

    #[tokio::test]
    async fn tampered_links_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).await;

        let url = store
            .signed_url("landscape/abc.mp4", Duration::from_secs(300))
            .await
            .unwrap();

        let res = store.verify("landscape/other.mp4", &query_of(&url));
        assert!(matches!(
            res,
            Err(StoreError::FileStore(FileError::InvalidSignature))
        ));

        let mut query = query_of(&url);
        query.expires += 3600;
        let res = store.verify("landscape/abc.mp4", &query);
        assert!(matches!(
            res,
            Err(StoreError::FileStore(FileError::InvalidSignature))
        ));
    }

    #[tokio::test]
    async fn expired_links_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).await;

        let url = store
            .signed_url("landscape/abc.mp4", Duration::from_secs(300))
            .await
            .unwrap();
        let query = query_of(&url);

        let res = store.verify_at("landscape/abc.mp4", &query, query.expires + 1);

        assert!(matches!(
            res,
            Err(StoreError::FileStore(FileError::ExpiredSignature))
        ));
    }
}
