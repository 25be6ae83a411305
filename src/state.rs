use crate::{
    config::Configuration,
    ingest::{KeyPolicy, MediaTools},
    repo::ArcRepo,
    thumbnails::ArcThumbnails,
    tmp_file::ArcTmpDir,
};

#[derive(Clone)]
pub(crate) struct State<S> {
    pub(super) config: Configuration,
    pub(super) tmp_dir: ArcTmpDir,
    pub(super) repo: ArcRepo,
    pub(super) store: S,
    pub(super) tools: MediaTools,
    pub(super) thumbnails: ArcThumbnails,
    pub(super) key_policy: KeyPolicy,
}

impl<S> State<S> {
    pub(super) fn jwt_secret(&self) -> &str {
        &self.config.auth.jwt_secret
    }

    pub(super) fn signature_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.config.media.signature_duration)
    }
}
