use std::{path::Path, sync::Arc, time::Duration};

use object_store::{
    aws::{AmazonS3, AmazonS3Builder},
    path::Path as ObjectPath,
    signer::Signer,
    Attribute, Attributes, ObjectStore as _, PutMultipartOpts, WriteMultipart,
};
use streem::IntoStreamer;
use tokio_util::io::ReaderStream;
use url::Url;

use crate::{error_code::ErrorCode, store::Store};

use super::StoreError;

const CHUNK_SIZE: usize = 8_388_608; // 8 Mebibytes, min is 5 (5_242_880)
const MAX_CONCURRENT_PARTS: usize = 4;

#[derive(Debug, thiserror::Error)]
pub(crate) enum ObjectError {
    #[error("Failed to build object storage client")]
    Build(#[source] object_store::Error),

    #[error("Invalid object key")]
    Key(#[source] object_store::path::Error),

    #[error("Failed to read file for upload")]
    Io(#[from] std::io::Error),

    #[error("Error making object storage request")]
    Request(#[source] object_store::Error),

    #[error("Failed to sign object url")]
    Sign(#[source] object_store::Error),
}

impl ObjectError {
    pub(super) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Build(_) | Self::Request(_) => ErrorCode::OBJECT_REQUEST_ERROR,
            Self::Key(_) => ErrorCode::INVALID_OBJECT_KEY,
            Self::Io(_) => ErrorCode::FILE_IO_ERROR,
            Self::Sign(_) => ErrorCode::SIGNATURE_ERROR,
        }
    }
}

#[derive(Clone)]
pub(crate) struct ObjectStore {
    client: Arc<AmazonS3>,
    bucket_name: Arc<str>,
}

#[async_trait::async_trait(?Send)]
impl Store for ObjectStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        self.client
            .list_with_delimiter(None)
            .await
            .map_err(ObjectError::Request)?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn save_file(
        &self,
        path: &Path,
        key: &str,
        content_type: mime::Mime,
    ) -> Result<(), StoreError> {
        let location = ObjectPath::parse(key).map_err(ObjectError::Key)?;

        let file = tokio::fs::File::open(path)
            .await
            .map_err(ObjectError::from)?;

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());

        let upload = self
            .client
            .put_multipart_opts(
                &location,
                PutMultipartOpts {
                    attributes,
                    ..Default::default()
                },
            )
            .await
            .map_err(ObjectError::Request)?;

        let mut writer = WriteMultipart::new_with_chunk_size(upload, CHUNK_SIZE);

        let stream = std::pin::pin!(ReaderStream::with_capacity(file, 64 * 1024));
        let mut stream = stream.into_streamer();

        let res: Result<(), ObjectError> = async {
            while let Some(bytes) = stream.try_next().await? {
                writer
                    .wait_for_capacity(MAX_CONCURRENT_PARTS)
                    .await
                    .map_err(ObjectError::Request)?;

                writer.write(&bytes);
            }

            Ok(())
        }
        .await;

        // An unfinished multipart upload never becomes visible at the key
        if let Err(e) = res {
            if let Err(abort_error) = writer.abort().await {
                tracing::warn!("Failed to abort multipart upload for {key}: {abort_error}");
            }

            return Err(e.into());
        }

        writer.finish().await.map_err(ObjectError::Request)?;

        Ok(())
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<Url, StoreError> {
        let location = ObjectPath::parse(key).map_err(ObjectError::Key)?;

        let url = self
            .client
            .signed_url(http::Method::GET, &location, ttl)
            .await
            .map_err(ObjectError::Sign)?;

        Ok(url)
    }
}

impl ObjectStore {
    #[allow(clippy::too_many_arguments)]
    #[tracing::instrument(skip(access_key, secret_key, session_token))]
    pub(crate) fn build(
        endpoint: Option<Url>,
        bucket_name: String,
        use_path_style: bool,
        region: String,
        access_key: String,
        secret_key: String,
        session_token: Option<String>,
    ) -> Result<Self, StoreError> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&bucket_name)
            .with_region(region)
            .with_access_key_id(access_key)
            .with_secret_access_key(secret_key)
            .with_virtual_hosted_style_request(!use_path_style);

        if let Some(endpoint) = endpoint {
            builder = builder
                .with_allow_http(endpoint.scheme() == "http")
                .with_endpoint(endpoint.as_str().trim_end_matches('/'));
        }

        if let Some(token) = session_token {
            builder = builder.with_token(token);
        }

        let client = builder.build().map_err(ObjectError::Build)?;

        Ok(ObjectStore {
            client: Arc::new(client),
            bucket_name: Arc::from(bucket_name),
        })
    }
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("bucket_name", &self.bucket_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use url::Url;

    use super::ObjectStore;
    use crate::store::Store;

    fn store() -> ObjectStore {
        ObjectStore::build(
            Some(Url::parse("http://localhost:9000").unwrap()),
            String::from("vid-rs"),
            true,
            String::from("us-east-1"),
            String::from("access"),
            String::from("secret"),
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn presigned_urls_carry_a_signature() {
        let url = store()
            .signed_url("landscape/abc.mp4", Duration::from_secs(300))
            .await
            .unwrap();

        assert_eq!(url.path(), "/vid-rs/landscape/abc.mp4");
        assert!(url
            .query_pairs()
            .any(|(k, _)| k.eq_ignore_ascii_case("X-Amz-Signature")));
        assert!(url
            .query_pairs()
            .any(|(k, v)| k == "X-Amz-Expires" && v == "300"));
    }

    #[tokio::test]
    async fn presigned_urls_differ_over_time() {
        let store = store();

        let first = store
            .signed_url("landscape/abc.mp4", Duration::from_secs(300))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1100)).await;

        let second = store
            .signed_url("landscape/abc.mp4", Duration::from_secs(300))
            .await
            .unwrap();

        assert_ne!(first, second);
    }
}
