
use std::{path::Path, sync::Arc};

use crate::process::Process;

use super::{Dimensions, ProbeError, ProbeTool};

#[derive(Debug, serde::Deserialize)]
struct FfProbeOutput {
    #[serde(default)]
    streams: Vec<FfProbeStream>,
}

// Kept loose so a malformed stream reports a missing aspect ratio rather than a parse failure
#[derive(Debug, serde::Deserialize)]
struct FfProbeStream {
    width: Option<serde_json::Value>,
    height: Option<serde_json::Value>,
}

#[derive(Clone, Debug)]
pub(crate) struct FfProbe {
    command: Arc<str>,
    timeout: u64,
}

impl FfProbe {
    pub(crate) fn new(command: &str, timeout: u64) -> Self {
        FfProbe {
            command: Arc::from(command),
            timeout,
        }
    }
}

#[async_trait::async_trait(?Send)]
impl ProbeTool for FfProbe {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn dimensions(&self, path: &Path) -> Result<Dimensions, ProbeError> {
        let input_file_str = path.to_str().ok_or(ProbeError::Path)?;

        let process = Process::run(
            &self.command,
            &[
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height",
                "-of",
                "json",
                input_file_str,
            ],
            self.timeout,
        )
        .map_err(ProbeError::Process)?;

        let output = process.read().await.map_err(ProbeError::Process)?;

        parse_dimensions(&output)
    }
}

fn parse_dimensions(output: &[u8]) -> Result<Dimensions, ProbeError> {
    let output: FfProbeOutput = serde_json::from_slice(output).map_err(ProbeError::Json)?;

    let Some(FfProbeStream { width, height }) = output.streams.into_iter().next() else {
        return Err(ProbeError::AspectRatioUnavailable);
    };

    let width = width.as_ref().and_then(serde_json::Value::as_u64);
    let height = height.as_ref().and_then(serde_json::Value::as_u64);

    match (width, height) {
        (Some(width), Some(height)) if width > 0 && height > 0 => Ok(Dimensions { width, height }),
        _ => Err(ProbeError::AspectRatioUnavailable),
    }
}
