use crate::{
    config::primitives::{LogFormat, Targets, ThumbnailBackend},
    ingest::KeyStrategy,
    serde_str::Serde,
};
use clap::{Parser, Subcommand};
use std::{net::SocketAddr, path::PathBuf};
use url::Url;
use uuid::Uuid;

impl Args {
    pub(super) fn into_output(self) -> Output {
        let Args {
            config_file,
            log_format,
            log_targets,
            log_spans,
            opentelemetry_url,
            opentelemetry_service_name,
            opentelemetry_targets,
            command,
        } = self;

        let tracing = Tracing {
            logging: Logging {
                format: log_format,
                targets: log_targets.map(Serde::new),
                log_spans,
            },
            opentelemetry: OpenTelemetry {
                url: opentelemetry_url,
                service_name: opentelemetry_service_name,
                targets: opentelemetry_targets.map(Serde::new),
            },
        };

        match command.unwrap_or(Command::Run(Run::default())) {
            Command::Run(run) => run.into_output(tracing, config_file),
            Command::Token(Token { user, duration }) => Output {
                config_format: ConfigFormat {
                    tracing,
                    ..Default::default()
                },
                operation: Operation::Token { user, duration },
                config_file,
            },
        }
    }
}

impl Run {
    fn into_output(self, tracing: Tracing, config_file: Option<PathBuf>) -> Output {
        let Run {
            address,
            public_url,
            temporary_directory,
            assets_root,
            jwt_secret,
            metrics_prometheus_address,
            media_process_timeout,
            media_signature_duration,
            media_ffmpeg_path,
            media_ffprobe_path,
            media_key_strategy,
            media_key_orientation_prefix,
            thumbnails,
            store,
        } = self;

        let server = Server {
            address,
            public_url,
            temporary_directory,
            assets_root,
        };

        let auth = Auth { jwt_secret };

        let metrics = Metrics {
            prometheus_address: metrics_prometheus_address,
        };

        let media = Media {
            process_timeout: media_process_timeout,
            signature_duration: media_signature_duration,
            ffmpeg_path: media_ffmpeg_path,
            ffprobe_path: media_ffprobe_path,
            key_naming: KeyNaming {
                strategy: media_key_strategy,
                orientation_prefix: media_key_orientation_prefix,
            },
        };

        let thumbnails = Thumbnails {
            backend: thumbnails,
        };

        let (repo, store) = match store {
            Some(RunStore::Filesystem(RunFilesystem { system, repo })) => {
                (repo, Some(Store::Filesystem(system)))
            }
            Some(RunStore::ObjectStorage(RunObjectStorage { storage, repo })) => {
                (repo, Some(Store::ObjectStorage(storage)))
            }
            None => (None, None),
        };

        Output {
            config_format: ConfigFormat {
                server,
                auth,
                tracing,
                metrics,
                media,
                thumbnails,
                repo,
                store,
            },
            operation: Operation::Run,
            config_file,
        }
    }
}

pub(super) struct Output {
    pub(super) config_format: ConfigFormat,
    pub(super) operation: Operation,
    pub(super) config_file: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub(crate) enum Operation {
    Run,
    Token {
        user: Uuid,
        duration: Option<u64>,
    },
}

/// Overrides collected from the commandline, layered over every other source
#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(super) struct ConfigFormat {
    server: Server,
    auth: Auth,
    tracing: Tracing,
    metrics: Metrics,
    media: Media,
    thumbnails: Thumbnails,
    #[serde(skip_serializing_if = "Option::is_none")]
    repo: Option<Repo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    store: Option<Store>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Server {
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<SocketAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    public_url: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temporary_directory: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assets_root: Option<PathBuf>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Auth {
    #[serde(skip_serializing_if = "Option::is_none")]
    jwt_secret: Option<String>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Tracing {
    logging: Logging,
    opentelemetry: OpenTelemetry,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Logging {
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<LogFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    targets: Option<Serde<Targets>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    log_spans: bool,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct OpenTelemetry {
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    service_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    targets: Option<Serde<Targets>>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Metrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    prometheus_address: Option<SocketAddr>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Media {
    #[serde(skip_serializing_if = "Option::is_none")]
    process_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature_duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ffmpeg_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ffprobe_path: Option<String>,
    key_naming: KeyNaming,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct KeyNaming {
    #[serde(skip_serializing_if = "Option::is_none")]
    strategy: Option<KeyStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    orientation_prefix: Option<bool>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Thumbnails {
    #[serde(rename = "type")]
    #[serde(skip_serializing_if = "Option::is_none")]
    backend: Option<ThumbnailBackend>,
}

/// Run the vid-rs application
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub(super) struct Args {
    /// Path to the vid-rs configuration file
    #[arg(short, long)]
    config_file: Option<PathBuf>,

    /// Format of logs printed to stdout
    #[arg(long)]
    log_format: Option<LogFormat>,
    /// Log levels to print to stdout, respects RUST_LOG formatting
    #[arg(long)]
    log_targets: Option<Targets>,
    /// Whether to log openning and closing of tracing spans to stdout
    #[arg(long)]
    log_spans: bool,

    /// URL to send OpenTelemetry traces
    #[arg(long)]
    opentelemetry_url: Option<Url>,
    /// Service Name to use for OpenTelemetry
    #[arg(long)]
    opentelemetry_service_name: Option<String>,
    /// Log levels to use for OpenTelemetry, respects RUST_LOG formatting
    #[arg(long)]
    opentelemetry_targets: Option<Targets>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Runs the vid-rs web server
    Run(Run),

    /// Prints an access token for the given user, signed with the configured JWT secret
    Token(Token),
}

#[derive(Debug, Default, Parser)]
struct Run {
    /// The address and port to bind the vid-rs web server
    #[arg(short, long)]
    address: Option<SocketAddr>,

    /// The externally reachable URL of this server
    #[arg(long)]
    public_url: Option<Url>,

    /// The directory vid-rs should stage uploads in while processing them
    #[arg(long)]
    temporary_directory: Option<PathBuf>,

    /// The directory static assets, including thumbnails, are served from
    #[arg(long)]
    assets_root: Option<PathBuf>,

    /// The secret access tokens are signed with
    #[arg(long)]
    jwt_secret: Option<String>,

    /// Whether to enable the prometheus scrape endpoint
    #[arg(long)]
    metrics_prometheus_address: Option<SocketAddr>,

    /// Timeout, in seconds, for any ffmpeg or ffprobe invocation
    #[arg(long)]
    media_process_timeout: Option<u64>,

    /// How long, in seconds, signed video links stay valid
    ///
    /// This defaults to 300
    #[arg(long)]
    media_signature_duration: Option<u64>,

    /// The ffmpeg binary to run
    #[arg(long)]
    media_ffmpeg_path: Option<String>,

    /// The ffprobe binary to run
    #[arg(long)]
    media_ffprobe_path: Option<String>,

    /// How stored videos are named
    #[arg(long)]
    media_key_strategy: Option<KeyStrategy>,

    /// Whether stored videos are grouped into a folder per orientation
    #[arg(long)]
    media_key_orientation_prefix: Option<bool>,

    /// Where uploaded thumbnails are kept
    #[arg(long)]
    thumbnails: Option<ThumbnailBackend>,

    #[command(subcommand)]
    store: Option<RunStore>,
}

#[derive(Debug, Parser)]
struct Token {
    /// The user the token identifies
    #[arg(short, long)]
    user: Uuid,

    /// How long, in seconds, the token is valid
    ///
    /// This defaults to one day
    #[arg(short, long)]
    duration: Option<u64>,
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
enum Store {
    Filesystem(Filesystem),

    ObjectStorage(crate::config::primitives::ObjectStorage),
}

/// Run vid-rs with the provided storage
#[derive(Debug, Subcommand)]
enum RunStore {
    /// Run vid-rs with filesystem storage
    Filesystem(RunFilesystem),

    /// Run vid-rs with object storage
    ObjectStorage(RunObjectStorage),
}

/// Run vid-rs with the provided filesystem storage
#[derive(Debug, Parser)]
struct RunFilesystem {
    #[command(flatten)]
    system: Filesystem,

    #[command(subcommand)]
    repo: Option<Repo>,
}

/// Run vid-rs with the provided object storage
#[derive(Debug, Parser)]
struct RunObjectStorage {
    #[command(flatten)]
    storage: crate::config::primitives::ObjectStorage,

    #[command(subcommand)]
    repo: Option<Repo>,
}

/// Configuration for data repositories
#[derive(Debug, Subcommand, serde::Serialize)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
enum Repo {
    /// Run vid-rs with the provided sled-backed data repository
    Sled(Sled),
}

/// Configuration for filesystem media storage
#[derive(Clone, Debug, Parser, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Filesystem {
    /// The path to store uploaded videos
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,

    /// The secret media links are signed with
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    signing_secret: Option<String>,
}

/// Configuration for the sled-backed data repository
#[derive(Debug, Parser, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Sled {
    /// The path to store the sled database
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,

    /// The cache capacity, in bytes, allowed to sled for in-memory operations
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_capacity: Option<u64>,
}
