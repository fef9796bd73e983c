use axum::Router;
use crate::state::AppState;
use tower_http::trace::TraceLayer;

pub fn create_app(state: AppState) -> Router {
    crate::routes::configure_routes(&state)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::{AppConfig, StorageConfig, TranscodeConfig};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn app(dir: &std::path::Path) -> Router {
        let config = AppConfig {
            server_port: 0,
            storage: StorageConfig::Local {
                root: dir.join("store"),
                public_base_url: "http://files".to_string(),
            },
            transcode: TranscodeConfig {
                work_dir: dir.join("work"),
                ..TranscodeConfig::default()
            },
            upload_max_bytes: 1024,
        };
        create_app(AppState::build(config).await.unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .await
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_transcode_rejects_empty_source_key() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .await
            .oneshot(
                Request::post("/api/v1/transcode")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"source_key":""}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_source_reports_staging_failure() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .await
            .oneshot(
                Request::post("/api/v1/transcode")
                    .header("content-type", "application/json")
                    .header("client-id", "abc")
                    .body(Body::from(r#"{"source_key":"uploads/none.mp4"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["data"]["stage"], "staging");
        assert_eq!(json["data"]["kind"], "SourceUnavailable");
    }

    fn multipart_upload(file_name: &str, content_type: &str, payload: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--boundary\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            file_name, content_type
        )
        .into_bytes();
        body.extend_from_slice(payload);
        body.extend_from_slice(b"\r\n--boundary--\r\n");

        Request::post("/api/v1/videos/upload")
            .header("content-type", "multipart/form-data; boundary=boundary")
            .header("content-length", body.len())
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_upload_over_limit_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .await
            .oneshot(multipart_upload("clip.mp4", "video/mp4", &[0u8; 4096]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_upload_rejects_non_video() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .await
            .oneshot(multipart_upload("notes.txt", "text/plain", b"hello"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!dir.path().join("store/uploads").exists());
    }
}
