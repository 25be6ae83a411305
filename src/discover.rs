mod ffmpeg;

use std::path::Path;

use crate::{error_code::ErrorCode, formats::Orientation, process::ProcessError};

pub(crate) use ffmpeg::FfProbe;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Dimensions {
    pub(crate) width: u64,
    pub(crate) height: u64,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ProbeError {
    #[error("Error in ffprobe process")]
    Process(#[source] ProcessError),

    #[error("Error parsing ffprobe output")]
    Json(#[source] serde_json::Error),

    #[error("Invalid file path")]
    Path,

    #[error("aspect ratio unavailable")]
    AspectRatioUnavailable,
}

impl ProbeError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Process(e) => e.error_code(),
            Self::Json(_) => ErrorCode::PROBE_OUTPUT,
            Self::Path => ErrorCode::INVALID_PATH,
            Self::AspectRatioUnavailable => ErrorCode::ASPECT_RATIO_UNAVAILABLE,
        }
    }
}

/// Reads the dimensions of a file's first video stream
#[async_trait::async_trait(?Send)]
pub(crate) trait ProbeTool: Send + Sync {
    async fn dimensions(&self, path: &Path) -> Result<Dimensions, ProbeError>;
}

#[tracing::instrument(level = "debug", skip(probe))]
pub(crate) async fn classify<P>(probe: &P, path: &Path) -> Result<Orientation, ProbeError>
where
    P: ProbeTool + ?Sized,
{
    let Dimensions { width, height } = probe.dimensions(path).await?;

    let orientation = Orientation::classify(width, height);

    tracing::debug!("{width}x{height} classified as {orientation}");

    Ok(orientation)
}
