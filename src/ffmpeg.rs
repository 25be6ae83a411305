#[cfg(test)]
mod tests;

use std::{path::Path, sync::Arc};

use crate::{
    error_code::ErrorCode,
    process::{Process, ProcessError},
};

/// Appended to the staged upload's path to name the remuxed output
pub(crate) const PROCESSED_SUFFIX: &str = ".processed";

#[derive(Debug, thiserror::Error)]
pub(crate) enum RemuxError {
    #[error("Error in ffmpeg process")]
    Process(#[source] ProcessError),

    #[error("Invalid file path")]
    Path,
}

impl RemuxError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Process(e) => e.error_code(),
            Self::Path => ErrorCode::INVALID_PATH,
        }
    }
}

/// Rewrites a video's container so playback can begin before the download finishes
///
/// Implementations copy the audio and video streams without re-encoding. The input is left in
/// place, and the caller owns removal of both files.
#[async_trait::async_trait(?Send)]
pub(crate) trait RemuxTool: Send + Sync {
    async fn remux_faststart(&self, input: &Path, output: &Path) -> Result<(), RemuxError>;
}

#[derive(Clone, Debug)]
pub(crate) struct FfMpeg {
    command: Arc<str>,
    timeout: u64,
}

impl FfMpeg {
    pub(crate) fn new(command: &str, timeout: u64) -> Self {
        FfMpeg {
            command: Arc::from(command),
            timeout,
        }
    }
}

fn faststart_args<'a>(input: &'a str, output: &'a str) -> [&'a str; 16] {
    [
        "-hide_banner",
        "-v",
        "error",
        "-y",
        "-i",
        input,
        "-movflags",
        "faststart",
        "-map_metadata",
        "0",
        "-codec",
        "copy",
        "-f",
        "mp4",
        "--",
        output,
    ]
}

#[async_trait::async_trait(?Send)]
impl RemuxTool for FfMpeg {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn remux_faststart(&self, input: &Path, output: &Path) -> Result<(), RemuxError> {
        let input_str = input.to_str().ok_or(RemuxError::Path)?;
        let output_str = output.to_str().ok_or(RemuxError::Path)?;

        let process = Process::run(
            &self.command,
            &faststart_args(input_str, output_str),
            self.timeout,
        )
        .map_err(RemuxError::Process)?;

        process.wait().await.map_err(RemuxError::Process)?;

        Ok(())
    }
}
