use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::model::TranscodeOutputs;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TranscodeRequest {
    #[validate(length(min = 1, max = 1024, message = "source_key must be 1 to 1024 characters"))]
    pub source_key: String,
    /// Overrides the `client-id` header when present.
    #[validate(length(max = 128, message = "client_id must be at most 128 characters"))]
    pub client_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TranscodeResponse {
    pub outputs: TranscodeOutputs,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub file_url: String,
    pub processed: TranscodeOutputs,
}
