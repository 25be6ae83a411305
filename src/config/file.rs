use std::{net::SocketAddr, path::PathBuf};
use url::Url;

use crate::{
    config::primitives::{LogFormat, Store, Targets, ThumbnailBackend},
    ingest::{KeyPolicy, KeyStrategy},
    serde_str::Serde,
};

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct ConfigFile {
    pub(crate) server: Server,

    pub(crate) auth: Auth,

    pub(crate) tracing: Tracing,

    pub(crate) metrics: Metrics,

    pub(crate) media: Media,

    pub(crate) thumbnails: Thumbnails,

    pub(crate) repo: Repo,

    pub(crate) store: Store,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
pub(crate) enum Repo {
    Sled(Sled),
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct Server {
    pub(crate) address: SocketAddr,

    /// The externally reachable base URL, used to build thumbnail and media links
    pub(crate) public_url: Url,

    pub(crate) temporary_directory: PathBuf,

    pub(crate) assets_root: PathBuf,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct Auth {
    pub(crate) jwt_secret: String,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct Tracing {
    pub(crate) logging: Logging,

    pub(crate) opentelemetry: OpenTelemetry,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct Metrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) prometheus_address: Option<SocketAddr>,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct Logging {
    pub(crate) format: LogFormat,

    pub(crate) targets: Serde<Targets>,

    pub(crate) log_spans: bool,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct OpenTelemetry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) url: Option<Url>,

    pub(crate) service_name: String,

    pub(crate) targets: Serde<Targets>,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct Media {
    /// Seconds a single ffmpeg or ffprobe run may take
    pub(crate) process_timeout: u64,

    /// Seconds a signed video link stays valid
    pub(crate) signature_duration: u64,

    pub(crate) ffmpeg_path: String,

    pub(crate) ffprobe_path: String,

    pub(crate) key_naming: KeyNaming,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct KeyNaming {
    pub(crate) strategy: KeyStrategy,

    pub(crate) orientation_prefix: bool,
}

impl KeyNaming {
    pub(crate) const fn policy(&self) -> KeyPolicy {
        KeyPolicy::new(self.strategy, self.orientation_prefix)
    }
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct Thumbnails {
    #[serde(rename = "type")]
    pub(crate) backend: ThumbnailBackend,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct Sled {
    pub(crate) path: PathBuf,

    pub(crate) cache_capacity: u64,
}
