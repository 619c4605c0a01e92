//! ルーティング - 主要パスと旧デバイス向けのエイリアス
//!
//! ボディ上限・CORS・リクエストトレースのレイヤーもここで掛ける。

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::app::Gateway;

/// multipart の境界やヘッダ分の余裕。画像本体の上限は MediaIngest が判定する
const BODY_LIMIT_HEADROOM: usize = 1024 * 1024;

pub fn router(gateway: Arc<Gateway>) -> Router {
    let body_limit = gateway.max_upload_bytes().saturating_add(BODY_LIMIT_HEADROOM);

    Router::new()
        .route("/telemetry", post(handlers::ingest_telemetry))
        .route("/telemetry/latest", get(handlers::latest_telemetry))
        .route("/telemetry/aggregate", get(handlers::aggregate_telemetry))
        .route("/media", post(handlers::upload_media))
        .route("/media/latest", get(handlers::latest_media))
        .route("/media/cleanup", post(handlers::cleanup_media))
        .route("/api/sensor", post(handlers::ingest_telemetry))
        .route("/api/sensor/latest", get(handlers::latest_telemetry))
        .route("/api/sensor/aggregate", get(handlers::aggregate_telemetry))
        .route("/upload", post(handlers::upload_media))
        .route("/api/camera/latest", get(handlers::latest_media))
        .route("/api/camera/cleanup", post(handlers::cleanup_media))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    use axum::body::{Body, to_bytes};
    use axum::extract::ConnectInfo;
    use axum::http::{Request, StatusCode, header};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use chrono::Duration;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::app::{GatewayBuilder, RateLimit, StoragePolicy, UploadPolicy};
    use crate::domain::{
        DeviceClass, GatewayError, RecordId, TelemetryAggregate, TelemetryRecord,
    };
    use crate::impls::{InMemoryMediaDirectory, InMemoryTelemetryStore};
    use crate::ports::{FixedClock, MediaDirectory, TelemetryStore};
    use crate::testing::{fixed_clock, sample_png, t0};

    const SENSOR_KEY: &str = "sensor-secret";
    const CAMERA_KEY: &str = "camera-secret";

    struct Harness {
        app: Router,
        clock: Arc<FixedClock>,
        store: Arc<InMemoryTelemetryStore>,
        media: Arc<InMemoryMediaDirectory>,
    }

    struct Options {
        storage: StoragePolicy,
        upload: UploadPolicy,
        rate_limit: RateLimit,
    }

    impl Default for Options {
        fn default() -> Self {
            Self {
                storage: StoragePolicy::default(),
                upload: UploadPolicy::default(),
                rate_limit: RateLimit::per_minute(1000),
            }
        }
    }

    fn harness_with(options: Options) -> Harness {
        let clock = fixed_clock();
        let store = Arc::new(InMemoryTelemetryStore::new());
        let media = Arc::new(InMemoryMediaDirectory::new(clock.clone()));
        let gateway = GatewayBuilder::new()
            .register_device(SENSOR_KEY, DeviceClass::Sensor)
            .unwrap()
            .register_device(CAMERA_KEY, DeviceClass::Camera)
            .unwrap()
            .telemetry_store(store.clone())
            .media_directory(media.clone())
            .clock(clock.clone())
            .storage_policy(options.storage)
            .upload_policy(options.upload)
            .rate_limit(options.rate_limit)
            .build()
            .unwrap();
        Harness {
            app: router(Arc::new(gateway)),
            clock,
            store,
            media,
        }
    }

    fn harness() -> Harness {
        harness_with(Options::default())
    }

    fn post_json(uri: &str, key: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(key) = key {
            builder = builder.header("X-API-KEY", key);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn post_bytes(uri: &str, key: Option<&str>, body: Vec<u8>) -> Request<Body> {
        let mut builder =
            Request::post(uri).header(header::CONTENT_TYPE, "application/octet-stream");
        if let Some(key) = key {
            builder = builder.header("X-API-KEY", key);
        }
        builder.body(Body::from(body)).unwrap()
    }

    fn post_multipart(uri: &str, key: &str, field: &str, payload: &[u8]) -> Request<Body> {
        let boundary = "roomsense-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"frame.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(payload);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        Request::post(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .header("X-API-KEY", key)
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn reading() -> Value {
        json!({"temp": 25, "hum": 50, "light": 60, "motion": 1, "sound": 30})
    }

    // --- telemetry ---

    #[tokio::test]
    async fn telemetry_round_trip_through_http() {
        let h = harness();

        let (status, body) = send(&h.app, post_json("/telemetry", Some(SENSOR_KEY), reading())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "success");
        assert_eq!(body["message"], "Data saved");
        let id = body["id"].as_str().unwrap().to_string();

        let (status, body) = send(&h.app, get("/telemetry/latest")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        let record = &body["data"][0];
        assert_eq!(record["_id"], id.as_str());
        for (field, value) in [("temp", 25), ("hum", 50), ("light", 60), ("motion", 1), ("sound", 30)] {
            assert_eq!(record[field], value, "{field}");
        }
        assert_eq!(record["device_type"], "ESP32-Sensor");
        assert!(record["timestamp"].as_str().unwrap().starts_with("2024-05-06T07:08:09"));
    }

    #[tokio::test]
    async fn latest_is_capped_at_ten_newest_first() {
        let h = harness();
        for i in 0..12 {
            h.clock.advance(Duration::seconds(1));
            let mut payload = reading();
            payload["temp"] = json!(i);
            send(&h.app, post_json("/api/sensor", Some(SENSOR_KEY), payload)).await;
        }

        let (_, body) = send(&h.app, get("/api/sensor/latest")).await;
        assert_eq!(body["count"], 10);
        let temps: Vec<i64> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["temp"].as_i64().unwrap())
            .collect();
        assert_eq!(temps, (2..12).rev().collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn missing_field_is_400_and_stores_nothing() {
        let h = harness();
        let payload = json!({"temp": 25, "hum": 50, "light": 60, "sound": 30});

        let (status, body) = send(&h.app, post_json("/telemetry", Some(SENSOR_KEY), payload)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().contains("motion"));
        assert!(h.store.is_empty().await);
    }

    #[tokio::test]
    async fn malformed_json_is_400() {
        let h = harness();
        let request = Request::post("/telemetry")
            .header("X-API-KEY", SENSOR_KEY)
            .body(Body::from("{not json"))
            .unwrap();

        let (status, _) = send(&h.app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn aggregate_over_posted_records() {
        let h = harness();
        for (temp, motion) in [(20, 1), (30, 0)] {
            let mut payload = reading();
            payload["temp"] = json!(temp);
            payload["motion"] = json!(motion);
            send(&h.app, post_json("/telemetry", Some(SENSOR_KEY), payload)).await;
        }

        let (status, body) = send(&h.app, get("/telemetry/aggregate")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["avgTemp"], 25.0);
        assert_eq!(body["data"]["avgHum"], 50.0);
        assert_eq!(body["data"]["avgLight"], 60.0);
        assert_eq!(body["data"]["avgSound"], 30.0);
        assert_eq!(body["data"]["motionCount"], 1);
    }

    #[tokio::test]
    async fn aggregate_on_empty_store_is_404_no_data() {
        let h = harness();
        let (status, body) = send(&h.app, get("/api/sensor/aggregate")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"status": "error", "message": "no telemetry data"}));
    }

    struct FailingStore;

    #[async_trait::async_trait]
    impl TelemetryStore for FailingStore {
        async fn initialize(&self) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn insert(&self, _record: TelemetryRecord) -> Result<RecordId, GatewayError> {
            Err(GatewayError::Upstream("connection refused".into()))
        }

        async fn latest(&self, _limit: usize) -> Result<Vec<TelemetryRecord>, GatewayError> {
            Err(GatewayError::Upstream("connection refused".into()))
        }

        async fn aggregate(&self) -> Result<Option<TelemetryAggregate>, GatewayError> {
            Err(GatewayError::Upstream("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn unreachable_store_is_500() {
        let gateway = GatewayBuilder::new()
            .register_device(SENSOR_KEY, DeviceClass::Sensor)
            .unwrap()
            .register_device(CAMERA_KEY, DeviceClass::Camera)
            .unwrap()
            .telemetry_store(Arc::new(FailingStore))
            .media_directory(Arc::new(InMemoryMediaDirectory::new(fixed_clock())))
            .build()
            .unwrap();
        let app = router(Arc::new(gateway));

        let (status, body) = send(&app, post_json("/telemetry", Some(SENSOR_KEY), reading())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");

        let (status, _) = send(&app, get("/telemetry/latest")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    // --- auth ---

    #[tokio::test]
    async fn bad_credentials_are_401_without_state_change() {
        let h = harness();
        h.media
            .insert_with_created("esp32cam_20240101_000000.jpg", vec![1, 2, 3], t0());

        let attempts = [
            post_json("/telemetry", None, reading()),
            post_json("/telemetry", Some("guess"), reading()),
            post_json("/telemetry", Some(CAMERA_KEY), reading()),
            post_bytes("/media", None, sample_png(4, 4)),
            post_bytes("/media", Some(SENSOR_KEY), sample_png(4, 4)),
            post_bytes("/media/cleanup", Some("guess"), Vec::new()),
            post_bytes("/api/camera/cleanup", Some(SENSOR_KEY), Vec::new()),
        ];
        for request in attempts {
            let uri = request.uri().to_string();
            let (status, body) = send(&h.app, request).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(body, json!({"status": "error", "message": "Unauthorized"}));
        }

        assert!(h.store.is_empty().await);
        assert_eq!(h.media.names(), vec!["esp32cam_20240101_000000.jpg".to_string()]);
    }

    // --- media ---

    #[tokio::test]
    async fn raw_upload_then_latest() {
        let h = harness();

        let (status, body) = send(&h.app, post_bytes("/media", Some(CAMERA_KEY), sample_png(8, 8))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["filename"], "esp32cam_20240506_070809.jpg");
        assert_eq!(body["message"], "Image received and saved");
        let size = body["size"].as_str().unwrap();
        assert!(size.ends_with("KB") && size.contains('.'), "{size}");

        let (status, body) = send(&h.app, get("/media/latest")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["filename"], "esp32cam_20240506_070809.jpg");
        assert_eq!(body["timestamp"], "20240506_070809");
        let decoded = STANDARD.decode(body["image_data"].as_str().unwrap()).unwrap();
        assert_eq!(
            decoded,
            h.media.read("esp32cam_20240506_070809.jpg").await.unwrap()
        );
    }

    #[tokio::test]
    async fn multipart_image_field_is_accepted() {
        let h = harness();

        let (status, body) = send(
            &h.app,
            post_multipart("/upload", CAMERA_KEY, "image", &sample_png(6, 6)),
        )
        .await;

        assert_eq!(status, StatusCode::OK, "{body}");
        assert!(h.media.contains("esp32cam_20240506_070809.jpg"));
    }

    #[tokio::test]
    async fn multipart_without_image_field_is_400() {
        let h = harness();

        let (status, body) = send(
            &h.app,
            post_multipart("/media", CAMERA_KEY, "photo", &sample_png(6, 6)),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "No image data received");
        assert!(h.media.names().is_empty());
    }

    #[tokio::test]
    async fn empty_upload_is_400() {
        let h = harness();
        let (status, body) = send(&h.app, post_bytes("/media", Some(CAMERA_KEY), Vec::new())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "No image data received");
    }

    #[tokio::test]
    async fn undecodable_upload_is_400() {
        let h = harness();
        let (status, _) = send(
            &h.app,
            post_bytes("/media", Some(CAMERA_KEY), b"not an image at all".to_vec()),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(h.media.names().is_empty());
    }

    #[tokio::test]
    async fn oversize_upload_is_400_and_directory_unchanged() {
        let h = harness_with(Options {
            upload: UploadPolicy {
                max_upload_bytes: 1024,
                jpeg_quality: 90,
            },
            ..Options::default()
        });
        h.media
            .insert_with_created("esp32cam_20240101_000000.jpg", vec![9; 10], t0());

        // 上限 + 1 バイト
        let (status, body) = send(&h.app, post_bytes("/media", Some(CAMERA_KEY), vec![0; 1025])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");

        // ボディ上限そのものも超える場合
        let (status, body) = send(
            &h.app,
            post_bytes("/media", Some(CAMERA_KEY), vec![0; 1024 + BODY_LIMIT_HEADROOM + 1]),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");

        // multipart でも同じ
        let (status, _) = send(
            &h.app,
            post_multipart("/upload", CAMERA_KEY, "image", &vec![0; 1024 + BODY_LIMIT_HEADROOM + 1]),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert_eq!(h.media.names(), vec!["esp32cam_20240101_000000.jpg".to_string()]);
        assert_eq!(h.media.total_size(), 10);
    }

    #[tokio::test]
    async fn same_second_uploads_overwrite_each_other() {
        let h = harness();

        send(&h.app, post_bytes("/media", Some(CAMERA_KEY), sample_png(4, 4))).await;
        h.clock.advance(Duration::milliseconds(500));
        let (status, body) = send(&h.app, post_bytes("/media", Some(CAMERA_KEY), sample_png(32, 32))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["filename"], "esp32cam_20240506_070809.jpg");
        assert_eq!(h.media.names().len(), 1);
    }

    #[tokio::test]
    async fn upload_over_capacity_evicts_oldest_before_writing() {
        // 1 単位 = 1 KiB に縮尺。105 個 → 上限 100 超過 → 80 以下まで削除
        let h = harness_with(Options {
            storage: StoragePolicy {
                cap_bytes: 100 * 1024,
                target_ratio: 0.8,
            },
            ..Options::default()
        });
        for i in 0..105 {
            h.media.insert_with_created(
                &format!("esp32cam_20240101_{:06}.jpg", i),
                vec![0; 1024],
                t0() - Duration::hours(2) + Duration::seconds(i),
            );
        }

        let (status, _) = send(&h.app, post_bytes("/media", Some(CAMERA_KEY), sample_png(4, 4))).await;
        assert_eq!(status, StatusCode::OK);

        let names = h.media.names();
        // 最古の 25 個が消え、新しい 80 個と今回の 1 枚が残る
        assert_eq!(names.len(), 81);
        for i in 0..25 {
            assert!(!h.media.contains(&format!("esp32cam_20240101_{:06}.jpg", i)));
        }
        for i in 25..105 {
            assert!(h.media.contains(&format!("esp32cam_20240101_{:06}.jpg", i)));
        }
        assert!(h.media.contains("esp32cam_20240506_070809.jpg"));
    }

    #[tokio::test]
    async fn latest_media_with_no_images_is_404() {
        let h = harness();
        let (status, body) = send(&h.app, get("/api/camera/latest")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"status": "error", "message": "No images found"}));
    }

    #[tokio::test]
    async fn cleanup_on_empty_directory() {
        let h = harness();
        let (status, body) = send(&h.app, post_bytes("/media/cleanup", Some(CAMERA_KEY), Vec::new())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "success", "deleted": [], "count": 0}));
    }

    #[tokio::test]
    async fn cleanup_reports_success_despite_partial_failure() {
        let h = harness();
        h.media.insert_with_created("a.jpg", vec![1], t0());
        h.media.insert_with_created("b.jpg", vec![1], t0());
        h.media.fail_removal_of("a.jpg");

        let (status, body) = send(&h.app, post_bytes("/media/cleanup", Some(CAMERA_KEY), Vec::new())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "success", "deleted": ["b.jpg"], "count": 1}));
    }

    #[tokio::test]
    async fn cleanup_in_a_directory_of_many_small_files() {
        let h = harness();
        for i in 0..2000 {
            h.media
                .insert_with_created(&format!("esp32cam_20240101_{:06}.jpg", i), vec![0; 8], t0());
        }

        let started = std::time::Instant::now();
        let (status, body) = send(&h.app, post_bytes("/media/cleanup", Some(CAMERA_KEY), Vec::new())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2000);
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[tokio::test]
    async fn uploads_are_rate_limited_per_client() {
        let h = harness_with(Options {
            rate_limit: RateLimit::per_minute(2),
            ..Options::default()
        });
        let from = |ip: [u8; 4]| {
            let mut request = post_bytes("/media", Some(CAMERA_KEY), sample_png(4, 4));
            request
                .extensions_mut()
                .insert(ConnectInfo(SocketAddr::from((ip, 40000))));
            request
        };

        for _ in 0..2 {
            let (status, _) = send(&h.app, from([192, 168, 1, 10])).await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, body) = send(&h.app, from([192, 168, 1, 10])).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["status"], "error");

        let (status, _) = send(&h.app, from([192, 168, 1, 11])).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn cors_preflight_is_answered() {
        let h = harness();
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/telemetry/latest")
            .header(header::ORIGIN, "http://dashboard.local")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap();

        let response = h.app.clone().oneshot(request).await.unwrap();
        assert!(response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }
}
