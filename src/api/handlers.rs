// HTTP request handlers for API endpoints

use crate::api::auth::AdminSession;
use crate::api::error::ApiError;
use crate::api::models::*;
use crate::api::state::AppState;
use crate::error::MigrationError;
use crate::media::{RehostOptions, RehostSource, MAX_IMAGE_BYTES};
use actix_multipart::{Multipart, MultipartError};
use actix_web::http::header::{CacheControl, CacheDirective};
use actix_web::{web, HttpRequest, HttpResponse};
use bytes::{Bytes, BytesMut};
use futures::TryStreamExt;

/// Public image used to exercise the media store credentials.
const STORE_CHECK_IMAGE: &str =
    "https://images.unsplash.com/photo-1586023492125-27b2c045efd7?w=400";

type HandlerResult = Result<HttpResponse, ApiError>;

/// Key for the per-client throttle: the socket peer's IP, or the forwarded
/// client address when the deployment trusts its proxy headers.
fn client_key(req: &HttpRequest, trust_forwarded: bool) -> String {
    if trust_forwarded {
        if let Some(addr) = req.connection_info().realip_remote_addr() {
            return addr.to_string();
        }
    }
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn throttle(state: &AppState, req: &HttpRequest) -> Result<(), ApiError> {
    let key = client_key(req, state.trust_forwarded);
    if state.throttle.hit(&key) {
        Ok(())
    } else {
        tracing::warn!(client = %key, path = req.path(), "rate limit exceeded");
        Err(ApiError::RateLimited)
    }
}

/// Health check endpoint
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let store = match state.migrator.store().ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!(error = %e, "content store ping failed");
            "disconnected"
        }
    };
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        store: store.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Migrate every project still referencing an external CDN.
pub async fn migrate_batch(admin: AdminSession, state: web::Data<AppState>) -> HandlerResult {
    tracing::info!(admin = %admin.0.username, "batch media migration requested");
    let report = state.migrator.run_batch().await.map_err(|e| {
        tracing::error!(error = %e, "batch media migration aborted");
        ApiError::Internal(e.to_string())
    })?;
    Ok(HttpResponse::Ok().json(BatchMigrationResponse::from(report)))
}

/// Migrate one image on demand; failures answer with a proxy URL.
pub async fn lazy_migrate(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: web::Json<LazyMigrateRequest>,
) -> HandlerResult {
    throttle(&state, &req)?;
    let (image_url, project_id) = payload
        .parts()
        .ok_or_else(|| ApiError::BadRequest("Missing imageUrl or projectId".into()))?;

    let outcome = state.migrator.lazy_migrate(image_url, project_id).await?;
    Ok(HttpResponse::Ok().json(LazyMigrateResponse::from(outcome)))
}

/// Relay a remote image through this origin, body streamed as received.
pub async fn image_proxy(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<ProxyQuery>,
) -> HandlerResult {
    throttle(&state, &req)?;
    let url = query
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing url parameter".into()))?;
    if !state.migrator.is_external(url) {
        return Err(MigrationError::NotExternal(url.to_string()).into());
    }

    let image = state.fetcher.fetch(url).await.map_err(|e| {
        tracing::warn!(%url, error = %e, "proxy fetch failed");
        ApiError::from(e)
    })?;

    let mut resp = HttpResponse::Ok();
    resp.content_type(
        image
            .content_type
            .as_deref()
            .unwrap_or("application/octet-stream"),
    )
    .insert_header(CacheControl(vec![CacheDirective::NoStore]));
    if let Some(len) = image.content_length {
        resp.no_chunking(len);
    }
    Ok(resp.streaming(image.body))
}

/// Upload a known public image to confirm the media store credentials work.
pub async fn media_store_check(_admin: AdminSession, state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(store_check_report(&state).await)
}

/// Credential presence plus the outcome of one test upload.
pub async fn store_check_report(state: &AppState) -> StoreCheckResponse {
    let config = state.media_store.presence();
    let options = RehostOptions {
        transformation: Some("w_400,h_300,c_fill,q_auto".to_string()),
        ..RehostOptions::plain(&state.media_store)
    };
    let public_id = format!("test-upload-{}", chrono::Utc::now().timestamp_millis());

    match state
        .rehoster
        .rehost(
            RehostSource::RemoteUrl(STORE_CHECK_IMAGE.to_string()),
            Some(&public_id),
            &options,
        )
        .await
    {
        Ok(asset) => StoreCheckResponse {
            success: true,
            message: "Media store test successful".into(),
            config,
            test_result: Some(StoreTestResult {
                uploaded_url: asset.secure_url,
                public_id: asset.public_id,
            }),
            error: None,
        },
        Err(e) => StoreCheckResponse {
            success: false,
            message: "Media store upload test failed".into(),
            config,
            test_result: None,
            error: Some(e.to_string()),
        },
    }
}

/// Store the `file` part of a multipart form in the media store.
pub async fn upload_image(
    _admin: AdminSession,
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: web::Payload,
) -> HandlerResult {
    let mut form = Multipart::new(req.headers(), payload);
    let (data, content_type) = read_file_part(&mut form)
        .await?
        .ok_or_else(|| ApiError::BadRequest("No file".into()))?;
    let asset = state
        .rehoster
        .rehost(
            RehostSource::Bytes { data, content_type },
            None,
            &RehostOptions::plain(&state.media_store),
        )
        .await?;
    Ok(HttpResponse::Ok().json(UploadResponse {
        ok: true,
        url: asset.secure_url,
    }))
}

/// Body and declared content type of the first non-empty `file` part.
async fn read_file_part(
    form: &mut Multipart,
) -> Result<Option<(Bytes, Option<String>)>, ApiError> {
    let invalid = |e: MultipartError| ApiError::BadRequest(format!("Invalid upload form: {e}"));
    while let Some(mut field) = form.try_next().await.map_err(invalid)? {
        if field.name() != Some("file") {
            while field.try_next().await.map_err(invalid)?.is_some() {}
            continue;
        }
        let content_type = field.content_type().map(|m| m.to_string());
        let mut buf = BytesMut::new();
        while let Some(chunk) = field.try_next().await.map_err(invalid)? {
            if buf.len() + chunk.len() > MAX_IMAGE_BYTES {
                return Err(ApiError::BadRequest(format!(
                    "File exceeds {MAX_IMAGE_BYTES} bytes"
                )));
            }
            buf.extend_from_slice(&chunk);
        }
        if !buf.is_empty() {
            return Ok(Some((buf.freeze(), content_type)));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::{SessionClaims, SessionKeys};
    use crate::api::routes::configure_routes;
    use crate::config::{AuthConfig, MediaStoreConfig, MigrationConfig, DEFAULT_TRANSFORMATION};
    use crate::content::{ContentStore, MemoryContentStore};
    use crate::orchestrator::tests::{record, FakeFetcher, FakeRehoster};
    use crate::throttle::ClientRateLimiter;
    use actix_web::cookie::Cookie;
    use actix_web::http::{header, StatusCode};
    use actix_web::{test, App};
    use std::sync::Arc;
    use std::time::Duration;

    const IG: &str = "https://cdninstagram.com/a.jpg";
    const UNSPLASH: &str = "https://images.unsplash.com/b.jpg";

    fn media_store() -> MediaStoreConfig {
        MediaStoreConfig {
            cloud_name: "demo".into(),
            api_key: "k".into(),
            api_secret: "s".into(),
            upload_folder: "saththebuilder".into(),
            api_base: "https://api.cloudinary.com".into(),
            transformation: DEFAULT_TRANSFORMATION.into(),
        }
    }

    fn auth() -> AuthConfig {
        AuthConfig {
            jwt_secret: "handler-test-secret".into(),
            cookie_name: "sb_token".into(),
        }
    }

    fn state(
        store: Arc<MemoryContentStore>,
        fetcher: FakeFetcher,
        rate_limit: u32,
    ) -> web::Data<AppState> {
        web::Data::new(app_state(store, fetcher, Arc::default(), rate_limit))
    }

    fn app_state(
        store: Arc<MemoryContentStore>,
        fetcher: FakeFetcher,
        rehoster: Arc<FakeRehoster>,
        rate_limit: u32,
    ) -> AppState {
        AppState::with_parts(
            store,
            Arc::new(fetcher),
            rehoster,
            Arc::new(ClientRateLimiter::new(rate_limit, Duration::from_secs(60))),
            media_store(),
            MigrationConfig::default(),
        )
    }

    fn multipart(boundary: &str, parts: &[(&str, &str, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, content_type, data) in parts {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"; \
                     filename=\"{name}.bin\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        body
    }

    fn admin_cookie() -> Cookie<'static> {
        let token = SessionKeys::new(&auth())
            .issue(&SessionClaims::new(
                "u1",
                "admin@example.com",
                "sath",
                "admin",
                chrono::Duration::days(7),
            ))
            .unwrap();
        Cookie::new("sb_token", token)
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data($state)
                    .app_data(web::Data::new(SessionKeys::new(&auth())))
                    .configure(configure_routes),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn batch_requires_admin_session() {
        let store = Arc::new(MemoryContentStore::new(vec![record("p1", &[IG])]));
        let app = app!(state(store, FakeFetcher::default(), 100));

        let req = test::TestRequest::post()
            .uri("/api/migrate-instagram")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn batch_reports_partial_failure_with_200() {
        let store = Arc::new(MemoryContentStore::new(vec![
            record("p1", &[IG, UNSPLASH]),
            record("p2", &["https://cdninstagram.com/broken.jpg"]),
        ]));
        let fetcher = FakeFetcher {
            failures: vec![("https://cdninstagram.com/broken.jpg".into(), 404)],
            ..Default::default()
        };
        let app = app!(state(store.clone(), fetcher, 100));

        let req = test::TestRequest::post()
            .uri("/api/migrate-instagram")
            .cookie(admin_cookie())
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["success"], true);
        assert_eq!(body["summary"]["projectsProcessed"], 2);
        assert_eq!(body["summary"]["totalImages"], 3);
        assert_eq!(body["summary"]["successfulMigrations"], 1);
        assert_eq!(body["summary"]["failedMigrations"], 1);
        assert_eq!(
            body["message"],
            "Migration completed! 1 images migrated to the media store, 1 failed"
        );
        assert_eq!(
            store.get("p1").await.unwrap().unwrap().images[0],
            "https://media.store/p1-image-1.jpg"
        );
    }

    #[actix_web::test]
    async fn lazy_migrate_success_and_fallback_shapes() {
        let store = Arc::new(MemoryContentStore::new(vec![
            record("p1", &[IG]),
            record("p2", &["https://cdninstagram.com/gone.jpg"]),
        ]));
        let fetcher = FakeFetcher {
            failures: vec![("https://cdninstagram.com/gone.jpg".into(), 410)],
            ..Default::default()
        };
        let app = app!(state(store, fetcher, 100));

        let req = test::TestRequest::post()
            .uri("/api/lazy-migrate")
            .set_json(serde_json::json!({"imageUrl": IG, "projectId": "p1"}))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["newUrl"], "https://media.store/p1-image-1.jpg");

        let req = test::TestRequest::post()
            .uri("/api/lazy-migrate")
            .set_json(serde_json::json!({
                "imageUrl": "https://cdninstagram.com/gone.jpg",
                "projectId": "p2"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(
            body["fallbackUrl"],
            "/api/instagram-proxy?url=https%3A%2F%2Fcdninstagram.com%2Fgone.jpg"
        );
        assert!(body["error"].as_str().unwrap().contains("410"));
    }

    #[actix_web::test]
    async fn lazy_migrate_input_and_lookup_errors() {
        let store = Arc::new(MemoryContentStore::new(vec![record("p1", &[IG])]));
        let app = app!(state(store, FakeFetcher::default(), 100));

        let cases = [
            (serde_json::json!({"imageUrl": IG}), StatusCode::BAD_REQUEST),
            (
                serde_json::json!({"imageUrl": UNSPLASH, "projectId": "p1"}),
                StatusCode::BAD_REQUEST,
            ),
            (
                serde_json::json!({"imageUrl": IG, "projectId": "missing"}),
                StatusCode::NOT_FOUND,
            ),
            (
                serde_json::json!({"imageUrl": "https://cdninstagram.com/x.jpg", "projectId": "p1"}),
                StatusCode::NOT_FOUND,
            ),
        ];
        for (payload, expected) in cases {
            let req = test::TestRequest::post()
                .uri("/api/lazy-migrate")
                .set_json(&payload)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), expected, "payload: {payload}");
        }
    }

    #[actix_web::test]
    async fn proxy_streams_image_with_original_content_type() {
        let store = Arc::new(MemoryContentStore::default());
        let app = app!(state(store, FakeFetcher::default(), 100));

        let req = test::TestRequest::get()
            .uri("/api/instagram-proxy?url=https%3A%2F%2Fcdninstagram.com%2Fa.jpg")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "image/jpeg"
        );
        assert_eq!(resp.headers().get(header::CACHE_CONTROL).unwrap(), "no-store");
        let body = test::read_body(resp).await;
        assert_eq!(&body[..], b"\xff\xd8\xff\xe0fake");
    }

    #[actix_web::test]
    async fn proxy_relays_upstream_404_without_body() {
        let store = Arc::new(MemoryContentStore::default());
        let fetcher = FakeFetcher {
            failures: vec![(IG.into(), 404)],
            ..Default::default()
        };
        let app = app!(state(store, fetcher, 100));

        let req = test::TestRequest::get()
            .uri("/api/instagram-proxy?url=https%3A%2F%2Fcdninstagram.com%2Fa.jpg")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
    }

    #[actix_web::test]
    async fn proxy_rejects_missing_and_non_cdn_urls() {
        let store = Arc::new(MemoryContentStore::default());
        let app = app!(state(store, FakeFetcher::default(), 100));

        for uri in [
            "/api/instagram-proxy",
            "/api/instagram-proxy?url=",
            "/api/instagram-proxy?url=http%3A%2F%2F169.254.169.254%2Flatest",
        ] {
            let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "uri: {uri}");
        }
    }

    #[actix_web::test]
    async fn public_endpoints_are_throttled() {
        let store = Arc::new(MemoryContentStore::default());
        let app = app!(state(store, FakeFetcher::default(), 1));

        let uri = "/api/instagram-proxy?url=https%3A%2F%2Fcdninstagram.com%2Fa.jpg";
        let first = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(first.status(), StatusCode::OK);
        let second = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[actix_web::test]
    async fn throttle_keys_on_peer_not_forwarded_headers() {
        let store = Arc::new(MemoryContentStore::default());
        let app = app!(state(store, FakeFetcher::default(), 1));

        let uri = "/api/instagram-proxy?url=https%3A%2F%2Fcdninstagram.com%2Fa.jpg";
        let mut statuses = Vec::new();
        for i in 0..5 {
            let req = test::TestRequest::get()
                .uri(uri)
                .peer_addr("10.0.0.1:40000".parse().unwrap())
                .insert_header(("X-Forwarded-For", format!("1.2.3.{i}")))
                .to_request();
            statuses.push(test::call_service(&app, req).await.status());
        }
        assert_eq!(statuses[0], StatusCode::OK);
        assert!(statuses[1..]
            .iter()
            .all(|s| *s == StatusCode::TOO_MANY_REQUESTS));
    }

    #[actix_web::test]
    async fn forwarded_client_is_used_when_trusted() {
        let store = Arc::new(MemoryContentStore::default());
        let mut state = app_state(store, FakeFetcher::default(), Arc::default(), 1);
        state.trust_forwarded = true;
        let app = app!(web::Data::new(state));

        let uri = "/api/instagram-proxy?url=https%3A%2F%2Fcdninstagram.com%2Fa.jpg";
        for client in ["1.2.3.4", "5.6.7.8"] {
            let req = test::TestRequest::get()
                .uri(uri)
                .peer_addr("10.0.0.1:40000".parse().unwrap())
                .insert_header(("X-Forwarded-For", client))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        }
    }

    #[actix_web::test]
    async fn upload_stores_only_the_file_part() {
        let store = Arc::new(MemoryContentStore::default());
        let rehoster = Arc::new(FakeRehoster::default());
        let app = app!(web::Data::new(app_state(
            store,
            FakeFetcher::default(),
            rehoster.clone(),
            100
        )));

        let body = multipart(
            "XyZ",
            &[
                ("title", "text/plain", &b"Oak bench"[..]),
                ("file", "image/png", &b"\x89PNG"[..]),
            ],
        );
        let req = test::TestRequest::post()
            .uri("/api/uploads")
            .cookie(admin_cookie())
            .insert_header((header::CONTENT_TYPE, "multipart/form-data; boundary=XyZ"))
            .set_payload(body)
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["url"], "https://media.store/anonymous.jpg");

        let sources = rehoster.sources.lock().unwrap();
        match &sources[..] {
            [RehostSource::Bytes { data, content_type }] => {
                assert_eq!(&data[..], b"\x89PNG");
                assert_eq!(content_type.as_deref(), Some("image/png"));
            }
            other => panic!("unexpected uploads: {other:?}"),
        }
    }

    #[actix_web::test]
    async fn upload_without_file_part_is_rejected() {
        let store = Arc::new(MemoryContentStore::default());
        let rehoster = Arc::new(FakeRehoster::default());
        let app = app!(web::Data::new(app_state(
            store,
            FakeFetcher::default(),
            rehoster.clone(),
            100
        )));

        let requests = [
            test::TestRequest::post()
                .uri("/api/uploads")
                .cookie(admin_cookie())
                .insert_header((header::CONTENT_TYPE, "multipart/form-data; boundary=XyZ"))
                .set_payload(multipart("XyZ", &[("title", "text/plain", &b"Oak bench"[..])])),
            test::TestRequest::post()
                .uri("/api/uploads")
                .cookie(admin_cookie())
                .insert_header((header::CONTENT_TYPE, "image/png"))
                .set_payload(&b"\x89PNG"[..]),
            test::TestRequest::post()
                .uri("/api/uploads")
                .cookie(admin_cookie()),
        ];
        for req in requests {
            let resp = test::call_service(&app, req.to_request()).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        }
        assert!(rehoster.sources.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn store_check_reports_presence_and_result() {
        let store = Arc::new(MemoryContentStore::default());
        let app = app!(state(store, FakeFetcher::default(), 100));

        let req = test::TestRequest::get()
            .uri("/api/media-store/check")
            .cookie(admin_cookie())
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["config"]["hasApiKey"], true);
        assert!(body["testResult"]["publicId"]
            .as_str()
            .unwrap()
            .starts_with("test-upload-"));
    }

    #[actix_web::test]
    async fn health_reports_store_status() {
        let store = Arc::new(MemoryContentStore::default());
        let app = app!(state(store, FakeFetcher::default(), 100));

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["store"], "connected");
    }
}
