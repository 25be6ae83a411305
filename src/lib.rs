mod auth;
mod config;
mod discover;
mod error;
mod error_code;
mod ffmpeg;
mod formats;
mod future;
mod ingest;
mod init_metrics;
mod init_tracing;
mod process;
mod repo;
mod root_span_builder;
mod serde_str;
mod state;
mod store;
mod stream;
mod thumbnails;
mod tmp_file;

use actix_form_data::{Field, Form, FormData, Multipart, Value};
use actix_web::{
    http::header::HeaderMap, web, App, FromRequest, HttpRequest, HttpResponse, HttpServer,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::{
    path::{Component, Path},
    sync::Arc,
    time::Duration,
};
use time::OffsetDateTime;
use tokio_util::io::ReaderStream;
use tracing::Instrument;
use tracing_actix_web::TracingLogger;
use url::Url;
use uuid::Uuid;

use self::{
    config::{Configuration, Filesystem, ObjectStorage, Operation, Repo, Sled, ThumbnailBackend},
    discover::FfProbe,
    error::{Error, UploadError},
    ffmpeg::FfMpeg,
    formats::mimes,
    ingest::{MediaTools, StagedVideo, MAX_THUMBNAIL_SIZE, MAX_VIDEO_SIZE},
    init_tracing::init_tracing,
    repo::{sled::SledRepo, ArcRepo, NewVideo, Video},
    root_span_builder::RootSpanBuilder,
    state::State,
    store::{
        file_store::{FileError, FileStore, SignedQuery},
        object_store::ObjectStore,
        Store,
    },
    stream::StreamLimit,
    thumbnails::{ArcThumbnails, AssetsThumbnails, MemoryThumbnails, Thumbnail},
    tmp_file::TmpDir,
};

pub use self::config::{ConfigSource, VidRsConfiguration};

const DAYS: u64 = 24 * 60 * 60;

struct VideoUpload<S: Store + 'static>(Value<StagedVideo>, std::marker::PhantomData<S>);

impl<S: Store + 'static> FormData for VideoUpload<S> {
    type Item = StagedVideo;
    type Error = Error;

    fn form(req: &HttpRequest) -> Result<Form<Self::Item, Self::Error>, Self::Error> {
        // A single file field, 'video'. The exact ceiling is enforced while streaming.
        let state = req
            .app_data::<web::Data<State<S>>>()
            .expect("No state in request")
            .clone();

        Ok(Form::new()
            .max_files(1)
            .max_file_size(MAX_VIDEO_SIZE as usize + 1)
            .transform_error(transform_error)
            .field(
                "video",
                Field::file(move |filename, content_type, stream| {
                    let state = state.clone();

                    let span = tracing::info_span!("file-upload", ?filename);

                    Box::pin(
                        async move {
                            let stream = crate::stream::from_err(stream).limit(MAX_VIDEO_SIZE);

                            ingest::stage_video(&state.tmp_dir, content_type.as_ref(), stream)
                                .await
                        }
                        .instrument(span),
                    )
                }),
            ))
    }

    fn extract(value: Value<Self::Item>) -> Result<Self, Self::Error> {
        Ok(VideoUpload(value, std::marker::PhantomData))
    }
}

struct ThumbnailUpload(Value<Thumbnail>);

impl FormData for ThumbnailUpload {
    type Item = Thumbnail;
    type Error = Error;

    fn form(_: &HttpRequest) -> Result<Form<Self::Item, Self::Error>, Self::Error> {
        Ok(Form::new()
            .max_files(1)
            .max_file_size(MAX_THUMBNAIL_SIZE as usize + 1)
            .transform_error(transform_error)
            .field(
                "thumbnail",
                Field::file(|filename, content_type, stream| {
                    let span = tracing::info_span!("thumbnail-upload", ?filename);

                    Box::pin(
                        async move {
                            let stream =
                                crate::stream::from_err(stream).limit(MAX_THUMBNAIL_SIZE);

                            ingest::read_thumbnail(content_type.as_ref(), stream).await
                        }
                        .instrument(span),
                    )
                }),
            ))
    }

    fn extract(value: Value<Self::Item>) -> Result<Self, Self::Error> {
        Ok(ThumbnailUpload(value))
    }
}

fn single_file<T>(value: Value<T>, field: &'static str) -> Result<T, Error> {
    value
        .map()
        .and_then(|mut map| map.remove(field))
        .and_then(|value| value.file())
        .map(|file| file.result)
        .ok_or_else(|| UploadError::NoFiles(field).into())
}

/// A video as the API presents it, with a freshly signed link in place of the storage key
#[derive(Debug, serde::Serialize)]
struct VideoResponse {
    id: Uuid,
    user_id: Uuid,
    title: String,
    description: String,
    thumbnail_url: Option<String>,
    video_url: Option<Url>,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

async fn video_response<S: Store>(state: &State<S>, video: Video) -> Result<VideoResponse, Error> {
    let Video {
        id,
        user_id,
        title,
        description,
        thumbnail_url,
        video_key,
        created_at,
        updated_at,
    } = video;

    let video_url = if let Some(key) = video_key {
        let url = state
            .store
            .signed_url(&key, state.signature_duration())
            .await?;

        metrics::counter!(crate::init_metrics::SIGNED_URLS).increment(1);

        Some(url)
    } else {
        None
    };

    Ok(VideoResponse {
        id,
        user_id,
        title,
        description,
        thumbnail_url,
        video_url,
        created_at,
        updated_at,
    })
}

fn caller(headers: &HeaderMap, jwt_secret: &str) -> Result<Uuid, Error> {
    let token = auth::bearer_token(headers)?;

    Ok(auth::validate_jwt(token, jwt_secret)?)
}

#[derive(Debug, serde::Deserialize)]
struct CreateVideo {
    title: String,
    #[serde(default)]
    description: String,
}

#[tracing::instrument(name = "Creating video", skip(req, body, state))]
async fn create_video<S: Store + 'static>(
    req: HttpRequest,
    body: web::Json<CreateVideo>,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, Error> {
    let user_id = caller(req.headers(), state.jwt_secret())?;

    let CreateVideo { title, description } = body.into_inner();

    let video = state
        .repo
        .create_video(NewVideo {
            user_id,
            title,
            description,
        })
        .await?;

    Ok(HttpResponse::Created().json(&video_response(&state, video).await?))
}

#[tracing::instrument(name = "Listing videos", skip(req, state))]
async fn list_videos<S: Store + 'static>(
    req: HttpRequest,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, Error> {
    let user_id = caller(req.headers(), state.jwt_secret())?;

    let videos = state.repo.videos_for_user(user_id).await?;

    let mut responses = Vec::with_capacity(videos.len());
    for video in videos {
        responses.push(video_response(&state, video).await?);
    }

    Ok(HttpResponse::Ok().json(&responses))
}

#[tracing::instrument(name = "Fetching video", skip(req, state))]
async fn video<S: Store + 'static>(
    req: HttpRequest,
    video_id: web::Path<String>,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, Error> {
    let video = ingest::authorize(&state.repo, req.headers(), state.jwt_secret(), &video_id).await?;

    Ok(HttpResponse::Ok().json(&video_response(&state, video).await?))
}

/// Accept a video upload
///
/// The caller must own the video. Authorization happens before the multipart body is read, so a
/// rejected request never touches scratch space.
#[tracing::instrument(name = "Uploading video", skip(req, payload, state))]
async fn upload_video<S: Store + 'static>(
    req: HttpRequest,
    payload: web::Payload,
    video_id: web::Path<String>,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, actix_web::Error> {
    let video = ingest::authorize(&state.repo, req.headers(), state.jwt_secret(), &video_id).await?;

    let Multipart(VideoUpload(value, _)) =
        Multipart::<VideoUpload<S>>::from_request(&req, &mut payload.into_inner()).await?;

    let staged = single_file(value, "video")?;

    let video = ingest::ingest_video(
        &state.tools,
        &state.store,
        &state.repo,
        &state.key_policy,
        video.id,
        staged,
    )
    .await?;

    Ok(HttpResponse::Ok().json(&video_response(&state, video).await?))
}

#[tracing::instrument(name = "Uploading thumbnail", skip(req, payload, state))]
async fn upload_thumbnail<S: Store + 'static>(
    req: HttpRequest,
    payload: web::Payload,
    video_id: web::Path<String>,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, actix_web::Error> {
    let video = ingest::authorize(&state.repo, req.headers(), state.jwt_secret(), &video_id).await?;

    let Multipart(ThumbnailUpload(value)) =
        Multipart::<ThumbnailUpload>::from_request(&req, &mut payload.into_inner()).await?;

    let thumbnail = single_file(value, "thumbnail")?;

    let video = ingest::attach_thumbnail(
        &state.repo,
        &state.thumbnails,
        &state.config.server.public_url,
        video.id,
        thumbnail,
    )
    .await?;

    Ok(HttpResponse::Ok().json(&video_response(&state, video).await?))
}

#[tracing::instrument(name = "Serving thumbnail", skip(state))]
async fn thumbnail<S: Store + 'static>(
    video_id: web::Path<String>,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, Error> {
    let video_id = Uuid::parse_str(&video_id).map_err(|_| UploadError::InvalidVideoId)?;

    let Some(Thumbnail { media_type, bytes }) = state.thumbnails.get(video_id).await? else {
        return Err(UploadError::ThumbnailNotFound(video_id).into());
    };

    Ok(HttpResponse::Ok().content_type(media_type).body(bytes))
}

#[tracing::instrument(name = "Serving asset", skip(state))]
async fn asset<S: Store + 'static>(
    file: web::Path<String>,
    state: web::Data<State<S>>,
) -> Result<HttpResponse, Error> {
    let file = Path::new(file.as_str());

    // only plain file names directly beneath the assets root
    let mut components = file.components();
    if !matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) {
        return Err(UploadError::AssetNotFound.into());
    }

    let content_type = file
        .extension()
        .and_then(|ext| ext.to_str())
        .map(mimes::ext_to_content_type)
        .unwrap_or(mime::APPLICATION_OCTET_STREAM);

    let file = match tokio::fs::File::open(state.config.server.assets_root.join(file)).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(UploadError::AssetNotFound.into())
        }
        Err(e) => return Err(e.into()),
    };

    Ok(HttpResponse::Ok()
        .content_type(content_type)
        .streaming(ReaderStream::new(file)))
}

/// Serve a stored video through a signed link minted by the filesystem store
#[tracing::instrument(name = "Serving media", skip(query, state))]
async fn media(
    key: web::Path<String>,
    query: Option<web::Query<SignedQuery>>,
    state: web::Data<State<FileStore>>,
) -> Result<HttpResponse, Error> {
    let Some(query) = query else {
        return Err(store::StoreError::from(FileError::InvalidSignature).into());
    };

    let path = state.store.verify(&key, &query)?;

    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| store::StoreError::from(FileError::from(e)))?;

    Ok(HttpResponse::Ok()
        .content_type(mimes::video_mp4())
        .streaming(ReaderStream::new(file)))
}

async fn healthz<S: Store>(state: web::Data<State<S>>) -> Result<HttpResponse, Error> {
    state.repo.health_check().await?;
    state.store.health_check().await?;
    Ok(HttpResponse::Ok().finish())
}

fn transform_error(error: actix_form_data::Error) -> actix_web::Error {
    let error: Error = error.into();
    let error: actix_web::Error = error.into();
    error
}

fn configure_endpoints<S: Store + 'static, F: Fn(&mut web::ServiceConfig)>(
    config: &mut web::ServiceConfig,
    state: State<S>,
    extra_config: F,
) {
    config
        .app_data(web::Data::new(state))
        .route("/healthz", web::get().to(healthz::<S>))
        .service(
            web::scope("/videos")
                .service(
                    web::resource("")
                        .route(web::post().to(create_video::<S>))
                        .route(web::get().to(list_videos::<S>)),
                )
                .service(
                    web::resource("/{video_id}")
                        .route(web::get().to(video::<S>))
                        .route(web::post().to(upload_video::<S>)),
                ),
        )
        .service(
            web::resource("/thumbnails/{video_id}")
                .route(web::get().to(thumbnail::<S>))
                .route(web::post().to(upload_thumbnail::<S>)),
        )
        .service(web::resource("/assets/{file}").route(web::get().to(asset::<S>)))
        .configure(extra_config);
}

fn file_store_config(sc: &mut web::ServiceConfig) {
    sc.service(web::resource("/media/{key:.*}").route(web::get().to(media)));
}

async fn launch_file_store(state: State<FileStore>) -> std::io::Result<()> {
    let address = state.config.server.address;

    HttpServer::new(move || {
        let state = state.clone();

        App::new()
            .wrap(TracingLogger::<RootSpanBuilder>::new())
            .configure(move |sc| configure_endpoints(sc, state, file_store_config))
    })
    .bind(address)?
    .run()
    .await
}

async fn launch_object_store(state: State<ObjectStore>) -> std::io::Result<()> {
    let address = state.config.server.address;

    HttpServer::new(move || {
        let state = state.clone();

        App::new()
            .wrap(TracingLogger::<RootSpanBuilder>::new())
            .configure(move |sc| configure_endpoints(sc, state, |_| {}))
    })
    .bind(address)?
    .run()
    .await
}

/// Create the directory static assets are served from, if it doesn't exist yet
#[tracing::instrument(level = "debug")]
async fn ensure_assets_dir(assets_root: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(assets_root).await
}

fn media_tools(config: &Configuration) -> MediaTools {
    let timeout = config.media.process_timeout;

    MediaTools {
        probe: Arc::new(FfProbe::new(&config.media.ffprobe_path, timeout)),
        remux: Arc::new(FfMpeg::new(&config.media.ffmpeg_path, timeout)),
    }
}

fn thumbnail_store(config: &Configuration) -> ArcThumbnails {
    match config.thumbnails.backend {
        ThumbnailBackend::Assets => {
            Arc::new(AssetsThumbnails::new(config.server.assets_root.clone()))
        }
        ThumbnailBackend::Memory => Arc::new(MemoryThumbnails::default()),
    }
}

fn open_repo(config: &Configuration) -> color_eyre::Result<ArcRepo> {
    match config.repo.clone() {
        Repo::Sled(Sled {
            path,
            cache_capacity,
        }) => Ok(Arc::new(SledRepo::build(path, cache_capacity)?)),
    }
}

impl<P: AsRef<Path>, T: serde::Serialize> ConfigSource<P, T> {
    /// Initialize the vid-rs configuration
    ///
    /// When running vid-rs as a library, configuration is limited to environment variables and
    /// configuration files. Commandline options are not available.
    ///
    /// ```rust
    /// fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     vid_rs::ConfigSource::memory(serde_json::json!({
    ///         "server": {
    ///             "address": "127.0.0.1:8080"
    ///         },
    ///         "auth": {
    ///             "jwt_secret": "change me"
    ///         },
    ///         "repo": {
    ///             "type": "sled",
    ///             "path": "./sled-repo"
    ///         },
    ///         "store": {
    ///             "type": "filesystem",
    ///             "path": "./files"
    ///         }
    ///     })).init()?;
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn init(self) -> color_eyre::Result<VidRsConfiguration> {
        config::configure_without_clap(self)
    }
}

impl VidRsConfiguration {
    /// Build the vid-rs configuration from commandline arguments
    ///
    /// This is probably not useful for 3rd party applications that handle their own commandline
    pub fn build_default() -> color_eyre::Result<Self> {
        config::configure()
    }

    /// Install the default vid-rs tracer
    ///
    /// This is probably not useful for 3rd party applications that install their own tracing
    /// subscribers.
    pub fn install_tracing(self) -> color_eyre::Result<Self> {
        init_tracing(&self.config.tracing)?;
        Ok(self)
    }

    pub fn install_metrics(self) -> color_eyre::Result<Self> {
        if let Some(addr) = self.config.metrics.prometheus_address {
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()?;

            init_metrics::init_metrics();
        }

        Ok(self)
    }

    /// Run the vid-rs application
    pub async fn run(self) -> color_eyre::Result<()> {
        let VidRsConfiguration { config, operation } = self;

        match operation {
            Operation::Run => (),
            Operation::Token { user, duration } => {
                let token = auth::make_jwt(
                    user,
                    &config.auth.jwt_secret,
                    Duration::from_secs(duration.unwrap_or(DAYS)),
                )?;

                println!("{token}");

                return Ok(());
            }
        }

        ensure_assets_dir(&config.server.assets_root).await?;

        let tmp_dir = TmpDir::init(&config.server.temporary_directory).await?;
        let repo = open_repo(&config)?;
        let tools = media_tools(&config);
        let thumbnails = thumbnail_store(&config);
        let key_policy = config.media.key_naming.policy();

        match config.store.clone() {
            config::Store::Filesystem(Filesystem {
                path,
                signing_secret,
            }) => {
                let signing_secret =
                    signing_secret.unwrap_or_else(|| config.auth.jwt_secret.clone());

                let store =
                    FileStore::build(path, &config.server.public_url, &signing_secret).await?;

                launch_file_store(State {
                    config,
                    tmp_dir: tmp_dir.clone(),
                    repo,
                    store,
                    tools,
                    thumbnails,
                    key_policy,
                })
                .await?;
            }
            config::Store::ObjectStorage(ObjectStorage {
                endpoint,
                use_path_style,
                bucket_name,
                region,
                access_key,
                secret_key,
                session_token,
            }) => {
                let store = ObjectStore::build(
                    endpoint,
                    bucket_name,
                    use_path_style,
                    region,
                    access_key,
                    secret_key,
                    session_token,
                )?;

                launch_object_store(State {
                    config,
                    tmp_dir: tmp_dir.clone(),
                    repo,
                    store,
                    tools,
                    thumbnails,
                    key_policy,
                })
                .await?;
            }
        }

        tmp_dir.cleanup().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests;
