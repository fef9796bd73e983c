use anyhow::{anyhow, Result};
use axum::{body::Bytes, extract::multipart::Field};
use bytes::BytesMut;
use futures_util::StreamExt;
use tracing::error;

/// A video file received through a multipart form.
#[derive(Debug)]
pub struct ReceivedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Buffer one multipart field, rejecting non-video payloads and anything
/// larger than `max_bytes`.
pub async fn receive_video(mut field: Field<'_>, max_bytes: usize) -> Result<ReceivedFile> {
    let content_type = field
        .content_type()
        .map(str::to_string)
        .or_else(|| {
            field
                .file_name()
                .and_then(|name| mime_guess::from_path(name).first())
                .map(|mime| mime.essence_str().to_string())
        })
        .unwrap_or_else(|| "application/octet-stream".to_string());

    if !content_type.starts_with("video/") {
        return Err(anyhow!("Invalid content type: only video/* allowed"));
    }

    let file_name = sanitize_file_name(field.file_name().unwrap_or("upload"));
    let mut buffer = BytesMut::new();

    while let Some(chunk) = field.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                error!("Stream error: {}", e);
                return Err(anyhow!("Stream interrupted"));
            }
        };

        if buffer.len() + chunk.len() > max_bytes {
            return Err(anyhow!("File exceeds the {} byte upload limit", max_bytes));
        }
        buffer.extend_from_slice(&chunk);
    }

    if buffer.is_empty() {
        return Err(anyhow!("Uploaded file is empty"));
    }

    Ok(ReceivedFile {
        file_name,
        content_type,
        bytes: buffer.freeze(),
    })
}

/// Keep only the final path component and replace anything outside a
/// conservative character set.
pub fn sanitize_file_name(raw: &str) -> String {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
