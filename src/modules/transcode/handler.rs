use super::dto::{TranscodeRequest, TranscodeResponse, UploadResponse};
use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::common::upload::receive_video;
use crate::state::AppState;
use axum::{
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use time::OffsetDateTime;
use tokio::task::JoinError;
use tracing::{error, info};
use validator::Validate;

pub const CLIENT_ID_HEADER: &str = "client-id";

fn non_blank(id: String) -> Option<String> {
    (!id.trim().is_empty()).then_some(id)
}

/// Body id first, then the `client-id` header. Blank values count as absent.
fn resolve_client_id(body: Option<String>, headers: &HeaderMap) -> Option<String> {
    body.and_then(non_blank).or_else(|| {
        headers
            .get(CLIENT_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .and_then(non_blank)
    })
}

fn job_aborted(e: JoinError) -> axum::response::Response {
    error!("❌ Transcode task aborted: {}", e);
    ApiError::new("Transcode job aborted", StatusCode::INTERNAL_SERVER_ERROR).into_response()
}

/// Transcode an artifact already in the store
#[utoipa::path(
    post,
    path = "/api/v1/transcode",
    request_body = TranscodeRequest,
    params(
        ("client-id" = Option<String>, Header, description = "Progress channel to notify")
    ),
    responses(
        (status = 200, description = "All renditions and the HLS package were produced", body = ApiResponse<TranscodeResponse>),
        (status = 400, description = "Bad Request"),
        (status = 404, description = "Source artifact not found"),
        (status = 500, description = "Job failed; data carries stage, kind and reason")
    ),
    tag = "Transcode"
)]
pub async fn submit_transcode(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<TranscodeRequest>,
) -> impl IntoResponse {
    if let Err(e) = payload.validate() {
        return ApiError::bad_request(e.to_string()).into_response();
    }

    let client_id = resolve_client_id(payload.client_id, &headers);

    // The job owns its task; a caller that hangs up does not cancel it.
    match state.orchestrator.spawn(payload.source_key, client_id).await {
        Ok(Ok(outputs)) => ApiSuccess(
            ApiResponse::success(TranscodeResponse { outputs }, "Transcoding completed"),
            StatusCode::OK,
        )
        .into_response(),
        Ok(Err(e)) => ApiError::from(e).into_response(),
        Err(e) => job_aborted(e),
    }
}

/// Upload a video and transcode it
#[utoipa::path(
    post,
    path = "/api/v1/videos/upload",
    request_body(content = String, content_type = "multipart/form-data"),
    params(
        ("client-id" = Option<String>, Header, description = "Progress channel to notify")
    ),
    responses(
        (status = 200, description = "Upload stored and processed", body = ApiResponse<UploadResponse>),
        (status = 400, description = "Bad Request"),
        (status = 500, description = "Job failed; data carries stage, kind and reason")
    ),
    tag = "Transcode"
)]
pub async fn upload_and_transcode(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let client_id = resolve_client_id(None, &headers);

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return ApiError::bad_request(format!("Invalid multipart body: {}", e))
                    .into_response();
            }
        };

        if field.name() != Some("file") {
            continue;
        }

        let received = match receive_video(field, state.config.upload_max_bytes).await {
            Ok(received) => received,
            Err(e) => return ApiError::bad_request(format!("Upload failed: {}", e)).into_response(),
        };

        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let key = format!("uploads/{}-{}", millis, received.file_name);
        info!(key = %key, size_bytes = received.bytes.len(), "Upload received");

        let file_url = match state
            .store
            .put(&key, received.bytes, &received.content_type)
            .await
        {
            Ok(locator) => locator,
            Err(e) => {
                return ApiError::new(
                    format!("Upload failed: {}", e),
                    StatusCode::INTERNAL_SERVER_ERROR,
                )
                .into_response();
            }
        };

        return match state.orchestrator.spawn(key, client_id).await {
            Ok(Ok(processed)) => ApiSuccess(
                ApiResponse::success(
                    UploadResponse { file_url, processed },
                    "File uploaded and processed successfully",
                ),
                StatusCode::OK,
            )
            .into_response(),
            Ok(Err(e)) => ApiError::from(e).into_response(),
            Err(e) => job_aborted(e),
        };
    }

    ApiError::bad_request("No file field found in multipart request").into_response()
}
