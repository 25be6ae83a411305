use std::{path::PathBuf, sync::Arc, time::Duration};

use actix_web::{
    body::MessageBody,
    dev::ServiceResponse,
    http::{header, StatusCode},
    test, App,
};
use uuid::Uuid;

use crate::{
    config::ConfigSource,
    ingest::tests::{files_under, tools},
    repo::sled::SledRepo,
    state::State,
    store::file_store::FileStore,
    thumbnails::MemoryThumbnails,
    tmp_file::TmpDir,
};

const SECRET: &str = "http-secret";
const BOUNDARY: &str = "vid-rs-test-boundary";

struct Server {
    root: tempfile::TempDir,
    state: State<FileStore>,
}

impl Server {
    async fn new(dimensions: Option<(u64, u64)>) -> Self {
        let root = tempfile::tempdir().expect("Created tempdir");

        let config = ConfigSource::memory(serde_json::json!({
            "server": {
                "public_url": "http://localhost:8080/",
                "temporary_directory": root.path().join("tmp"),
                "assets_root": root.path().join("assets"),
            },
            "auth": { "jwt_secret": SECRET },
            "thumbnails": { "type": "memory" },
            "store": {
                "type": "filesystem",
                "path": root.path().join("store"),
            }
        }))
        .init()
        .expect("Configured")
        .config;

        crate::ensure_assets_dir(&config.server.assets_root)
            .await
            .expect("Created assets dir");

        let tmp_dir = TmpDir::init(&config.server.temporary_directory)
            .await
            .expect("Created tmp dir");

        let db = sled::Config::new()
            .temporary(true)
            .open()
            .expect("Opened db");

        let store = FileStore::build(root.path().join("store"), &config.server.public_url, SECRET)
            .await
            .expect("Built store");

        let key_policy = config.media.key_naming.policy();

        Server {
            root,
            state: State {
                config,
                tmp_dir,
                repo: Arc::new(SledRepo::from_db(db).expect("Opened trees")),
                store,
                tools: tools(dimensions, false),
                thumbnails: Arc::new(MemoryThumbnails::default()),
                key_policy,
            },
        }
    }

    fn scratch_files(&self) -> Vec<PathBuf> {
        files_under(&self.root.path().join("tmp"))
    }
}

fn bearer(user_id: Uuid) -> (header::HeaderName, String) {
    let token =
        crate::auth::make_jwt(user_id, SECRET, Duration::from_secs(60)).expect("Signed token");

    (header::AUTHORIZATION, format!("Bearer {token}"))
}

fn multipart(field: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
    multipart_part(field, Some(content_type), bytes)
}

fn multipart_part(field: &str, content_type: Option<&str>, bytes: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"upload\"\r\n"
    )
    .into_bytes();

    if let Some(content_type) = content_type {
        body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
    }

    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_header() -> (header::HeaderName, String) {
    (
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    )
}

async fn json<B: MessageBody>(response: ServiceResponse<B>) -> serde_json::Value {
    test::read_body_json(response).await
}

macro_rules! app {
    ($server:expr) => {
        test::init_service(App::new().configure(|sc| {
            crate::configure_endpoints(sc, $server.state.clone(), crate::file_store_config)
        }))
        .await
    };
}

macro_rules! create {
    ($app:expr, $user_id:expr) => {{
        let req = test::TestRequest::post()
            .uri("/videos")
            .insert_header(bearer($user_id))
            .set_json(serde_json::json!({ "title": "boots", "description": "a video about boots" }))
            .to_request();

        let response = test::call_service(&$app, req).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        json(response).await
    }};
}

#[actix_web::test]
async fn upload_then_stream_through_signed_link() {
    let server = Server::new(Some((1920, 1080))).await;
    let app = app!(server);
    let user = Uuid::new_v4();

    let created = create!(app, user);
    assert!(created["video_url"].is_null());

    let id = created["id"].as_str().expect("Video id").to_owned();

    let req = test::TestRequest::post()
        .uri(&format!("/videos/{id}"))
        .insert_header(bearer(user))
        .insert_header(multipart_header())
        .set_payload(multipart("video", "video/mp4", b"not really an mp4"))
        .to_request();

    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), StatusCode::OK);

    let uploaded = json(response).await;
    let link = uploaded["video_url"].as_str().expect("Signed link").to_owned();
    assert!(link.starts_with("http://localhost:8080/media/landscape/"));
    assert!(server.scratch_files().is_empty());

    let fetch = || {
        test::TestRequest::get()
            .uri(&format!("/videos/{id}"))
            .insert_header(bearer(user))
            .to_request()
    };

    let first = json(test::call_service(&app, fetch()).await).await;
    let second = json(test::call_service(&app, fetch()).await).await;
    assert_ne!(first["video_url"], second["video_url"]);

    let link = url::Url::parse(&link).expect("Valid link");
    let req = test::TestRequest::get()
        .uri(&format!("{}?{}", link.path(), link.query().expect("Signed query")))
        .to_request();

    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "video/mp4"
    );
    assert_eq!(test::read_body(response).await, &b"not really an mp4"[..]);
}

#[actix_web::test]
async fn other_users_cannot_upload() {
    let server = Server::new(Some((1080, 1920))).await;
    let app = app!(server);

    let created = create!(app, Uuid::new_v4());
    let id = created["id"].as_str().expect("Video id");

    let req = test::TestRequest::post()
        .uri(&format!("/videos/{id}"))
        .insert_header(bearer(Uuid::new_v4()))
        .insert_header(multipart_header())
        .set_payload(multipart("video", "video/mp4", b"someone else's video"))
        .to_request();

    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = json(response).await;
    assert_eq!(body["code"], "not-owner");
    assert!(server.scratch_files().is_empty());
}

#[actix_web::test]
async fn requests_without_a_token_are_unauthorized() {
    let server = Server::new(Some((1920, 1080))).await;
    let app = app!(server);

    let req = test::TestRequest::get().uri("/videos").to_request();

    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn unknown_videos_are_not_found() {
    let server = Server::new(Some((1920, 1080))).await;
    let app = app!(server);

    let req = test::TestRequest::get()
        .uri(&format!("/videos/{}", Uuid::new_v4()))
        .insert_header(bearer(Uuid::new_v4()))
        .to_request();

    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get()
        .uri("/videos/not-a-uuid")
        .insert_header(bearer(Uuid::new_v4()))
        .to_request();

    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn upload_without_video_field_is_rejected() {
    let server = Server::new(Some((1920, 1080))).await;
    let app = app!(server);
    let user = Uuid::new_v4();

    let created = create!(app, user);
    let id = created["id"].as_str().expect("Video id");

    let req = test::TestRequest::post()
        .uri(&format!("/videos/{id}"))
        .insert_header(bearer(user))
        .insert_header(multipart_header())
        .set_payload(format!("--{BOUNDARY}--\r\n"))
        .to_request();

    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(server.scratch_files().is_empty());
}

#[actix_web::test]
async fn upload_without_media_type_is_rejected() {
    let server = Server::new(Some((1920, 1080))).await;
    let app = app!(server);
    let user = Uuid::new_v4();

    let created = create!(app, user);
    let id = created["id"].as_str().expect("Video id");

    let req = test::TestRequest::post()
        .uri(&format!("/videos/{id}"))
        .insert_header(bearer(user))
        .insert_header(multipart_header())
        .set_payload(multipart_part("video", None, b"moov bytes"))
        .to_request();

    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(server.scratch_files().is_empty());
    assert!(files_under(&server.root.path().join("store")).is_empty());
}

#[actix_web::test]
async fn non_mp4_upload_is_rejected() {
    let server = Server::new(Some((1920, 1080))).await;
    let app = app!(server);
    let user = Uuid::new_v4();

    let created = create!(app, user);
    let id = created["id"].as_str().expect("Video id");

    let req = test::TestRequest::post()
        .uri(&format!("/videos/{id}"))
        .insert_header(bearer(user))
        .insert_header(multipart_header())
        .set_payload(multipart("video", "video/webm", b"webm bytes"))
        .to_request();

    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(server.scratch_files().is_empty());

    let req = test::TestRequest::get()
        .uri(&format!("/videos/{id}"))
        .insert_header(bearer(user))
        .to_request();

    let body = json(test::call_service(&app, req).await).await;
    assert!(body["video_url"].is_null());
}

#[actix_web::test]
async fn thumbnails_are_served_back() {
    let server = Server::new(Some((1920, 1080))).await;
    let app = app!(server);
    let user = Uuid::new_v4();

    let created = create!(app, user);
    let id = created["id"].as_str().expect("Video id");

    let req = test::TestRequest::post()
        .uri(&format!("/thumbnails/{id}"))
        .insert_header(bearer(user))
        .insert_header(multipart_header())
        .set_payload(multipart("thumbnail", "image/png", b"png bytes"))
        .to_request();

    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json(response).await;
    assert_eq!(
        body["thumbnail_url"],
        format!("http://localhost:8080/thumbnails/{id}")
    );

    let req = test::TestRequest::get()
        .uri(&format!("/thumbnails/{id}"))
        .to_request();

    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/png"
    );
    assert_eq!(test::read_body(response).await, &b"png bytes"[..]);
}

#[actix_web::test]
async fn tampered_media_links_are_forbidden() {
    let server = Server::new(Some((1920, 1080))).await;
    let app = app!(server);

    let link = crate::store::Store::signed_url(
        &server.state.store,
        "landscape/missing.mp4",
        Duration::from_secs(60),
    )
    .await
    .expect("Signed link");

    let query = link.query().expect("Signed query").replace("signature=", "signature=00");

    let req = test::TestRequest::get()
        .uri(&format!("{}?{query}", link.path()))
        .to_request();

    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get()
        .uri(link.path())
        .to_request();

    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn assets_stay_inside_the_assets_root() {
    let server = Server::new(Some((1920, 1080))).await;
    let app = app!(server);

    std::fs::write(
        server.state.config.server.assets_root.join("logo.png"),
        b"logo",
    )
    .expect("Wrote asset");

    let req = test::TestRequest::get().uri("/assets/logo.png").to_request();
    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(test::read_body(response).await, &b"logo"[..]);

    let req = test::TestRequest::get().uri("/assets/..").to_request();
    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get().uri("/assets/missing.png").to_request();
    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn healthz_checks_repo_and_store() {
    let server = Server::new(None).await;
    let app = app!(server);

    let req = test::TestRequest::get().uri("/healthz").to_request();

    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[actix_web::test]
async fn listing_only_shows_own_videos() {
    let server = Server::new(Some((1920, 1080))).await;
    let app = app!(server);
    let user = Uuid::new_v4();

    create!(app, user);
    create!(app, user);
    create!(app, Uuid::new_v4());

    let req = test::TestRequest::get()
        .uri("/videos")
        .insert_header(bearer(user))
        .to_request();

    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json(response).await;
    let videos = body.as_array().expect("List of videos");
    assert_eq!(videos.len(), 2);
    assert!(videos
        .iter()
        .all(|video| video["user_id"] == user.to_string()));
}
