use std::{
    ops::Deref,
    path::{Path, PathBuf},
    sync::Arc,
};

use uuid::Uuid;

pub(crate) type ArcTmpDir = Arc<TmpDir>;

/// A per-process scratch directory
///
/// Every file handed out lives directly beneath it and is named by a random v4 uuid, so
/// concurrent requests never contend for the same path.
#[derive(Debug)]
pub(crate) struct TmpDir {
    path: Option<PathBuf>,
}

impl TmpDir {
    pub(crate) async fn init<P: AsRef<Path>>(path: P) -> std::io::Result<Arc<Self>> {
        let path = path.as_ref().join(Uuid::now_v7().to_string());
        tokio::fs::create_dir_all(&path).await?;
        Ok(Arc::new(TmpDir { path: Some(path) }))
    }

    fn build_tmp_file(&self, ext: Option<&str>) -> PathBuf {
        let root = self.path.as_deref().unwrap_or_else(|| Path::new("."));

        if let Some(ext) = ext {
            root.join(format!("{}.{}", Uuid::new_v4(), ext))
        } else {
            root.join(Uuid::new_v4().to_string())
        }
    }

    /// Allocate a fresh scratch path
    ///
    /// Nothing is created on disk until the caller writes to the path.
    pub(crate) fn tmp_file(&self, ext: Option<&str>) -> TmpFile {
        TmpFile(Some(self.build_tmp_file(ext)))
    }

    pub(crate) async fn cleanup(self: Arc<Self>) -> std::io::Result<()> {
        if let Some(path) = Arc::into_inner(self).and_then(|mut this| this.path.take()) {
            tokio::fs::remove_dir_all(path).await?;
        }

        Ok(())
    }
}

impl Drop for TmpDir {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let _ = std::fs::remove_dir_all(path);
        }
    }
}

#[must_use]
#[derive(Debug)]
pub(crate) struct TmpFile(Option<PathBuf>);

impl TmpFile {
    /// A scratch path next to this one, sharing its random name
    pub(crate) fn with_suffix(&self, suffix: &str) -> TmpFile {
        let mut path = self.as_ref().as_os_str().to_owned();
        path.push(suffix);

        TmpFile(Some(PathBuf::from(path)))
    }

    /// Remove the file, treating an already-missing file as removed
    ///
    /// If removal fails the path is kept so the drop guard gets one more try.
    pub(crate) async fn cleanup(mut self) -> std::io::Result<()> {
        if let Some(path) = self.0.as_ref() {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }

        self.0.take();
        Ok(())
    }
}

impl AsRef<Path> for TmpFile {
    fn as_ref(&self) -> &Path {
        self.0.as_deref().unwrap_or_else(|| Path::new(""))
    }
}

impl Deref for TmpFile {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        self.as_ref()
    }
}

impl Drop for TmpFile {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Remove every listed scratch file
///
/// A failure on one file is logged and does not stop the rest from being removed. Returns how
/// many files could not be removed.
#[tracing::instrument(level = "debug", skip_all, fields(count = files.len()))]
pub(crate) async fn release_all(files: Vec<TmpFile>) -> usize {
    let mut failures = 0;

    for file in files {
        let path = file.to_path_buf();

        if let Err(e) = file.cleanup().await {
            failures += 1;

            metrics::counter!(crate::init_metrics::CLEANUP_FAILURE).increment(1);
            tracing::warn!("Failed to remove scratch file {}: {e}", path.display());
        }
    }

    failures
}
