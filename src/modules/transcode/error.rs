use axum::http::StatusCode;
use thiserror::Error;

use super::model::{JobFailure, JobStage};
use crate::common::response::ApiError;

/// Fatal job errors. Each aborts the remaining work of its own job only.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TranscodeError {
    #[error("source {key} is unavailable: {reason}")]
    SourceUnavailable { key: String, reason: String },

    #[error("encoding {rendition} failed: {reason}")]
    EncodeFailed { rendition: String, reason: String },

    #[error("HLS packaging failed: {reason}")]
    PackagingFailed { reason: String },

    #[error("publishing {key} failed: {reason}")]
    StoreWriteFailed { key: String, reason: String },
}

impl TranscodeError {
    pub fn stage(&self) -> JobStage {
        match self {
            TranscodeError::SourceUnavailable { .. } => JobStage::Staging,
            TranscodeError::EncodeFailed { .. } => JobStage::Encoding,
            TranscodeError::PackagingFailed { .. } => JobStage::Packaging,
            TranscodeError::StoreWriteFailed { .. } => JobStage::Finalizing,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TranscodeError::SourceUnavailable { .. } => "SourceUnavailable",
            TranscodeError::EncodeFailed { .. } => "EncodeFailed",
            TranscodeError::PackagingFailed { .. } => "PackagingFailed",
            TranscodeError::StoreWriteFailed { .. } => "StoreWriteFailed",
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            TranscodeError::SourceUnavailable { reason, .. }
            | TranscodeError::EncodeFailed { reason, .. }
            | TranscodeError::PackagingFailed { reason }
            | TranscodeError::StoreWriteFailed { reason, .. } => reason,
        }
    }

    pub fn rendition(&self) -> Option<&str> {
        match self {
            TranscodeError::EncodeFailed { rendition, .. } => Some(rendition),
            _ => None,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            TranscodeError::SourceUnavailable { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TranscodeError> for ApiError {
    fn from(error: TranscodeError) -> Self {
        ApiError::new(error.to_string(), error.status_code()).with_data(&JobFailure::from(&error))
    }
}

/// Removal of a temporary artifact failed. Recorded and logged, never fatal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cleanup of {target} failed: {reason}")]
pub struct CleanupFailed {
    pub target: String,
    pub reason: String,
}
