use utoipa::OpenApi;
use crate::modules::transcode::dto::*;
use crate::modules::transcode::model::{JobFailure, JobStage, TranscodeOutputs};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::transcode::handler::submit_transcode,
        crate::modules::transcode::handler::upload_and_transcode,
        crate::modules::progress::gateway::ws_handler,
    ),
    components(
        schemas(
            TranscodeRequest, TranscodeResponse, UploadResponse,
            TranscodeOutputs, JobFailure, JobStage,
        )
    ),
    tags(
        (name = "Transcode", description = "Rendition and HLS packaging jobs"),
        (name = "Progress", description = "Per-client progress notifications")
    )
)]
pub struct ApiDoc;
