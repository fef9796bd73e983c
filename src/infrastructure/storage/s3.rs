use async_trait::async_trait;
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::{Client, config::BehaviorVersion, config::Credentials, config::Region};
use bytes::Bytes;
use tracing::{error, info};

use super::{ArtifactStore, Publication, StoreError, StoreResult};

/// Minimum part size for S3 is 5MB; larger payloads go up in 6MB parts.
const PART_SIZE: usize = 6 * 1024 * 1024;

#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub async fn new(endpoint: &str, bucket: &str, access_key: &str, secret_key: &str) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");

        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(true) // Required for MinIO
            .build();

        let client = Client::from_conf(config);

        info!("✅ Connected to S3 (MinIO)");

        Self {
            client,
            bucket: bucket.to_string(),
        }
    }

    async fn put_multipart(&self, key: &str, bytes: Bytes, content_type: &str) -> StoreResult<()> {
        let upload_id = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(backend)?
            .upload_id
            .ok_or_else(|| StoreError::Backend(format!("no upload id returned for {}", key)))?;

        match self.upload_parts(key, &upload_id, bytes).await {
            Ok(parts) => {
                self.client
                    .complete_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(
                        CompletedMultipartUpload::builder()
                            .set_parts(Some(parts))
                            .build(),
                    )
                    .send()
                    .await
                    .map_err(backend)?;
                Ok(())
            }
            Err(e) => {
                error!(key = %key, "❌ Multipart upload failed: {}", e);
                if let Err(abort) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    error!(key = %key, "❌ Failed to abort upload: {}", abort);
                }
                Err(e)
            }
        }
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        bytes: Bytes,
    ) -> StoreResult<Vec<CompletedPart>> {
        let mut parts = Vec::new();
        let mut offset = 0;
        let mut part_number = 1;

        while offset < bytes.len() {
            let end = (offset + PART_SIZE).min(bytes.len());
            let result = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(bytes.slice(offset..end)))
                .send()
                .await
                .map_err(backend)?;

            let e_tag = result.e_tag.ok_or_else(|| {
                StoreError::Backend(format!("no ETag returned for part {}", part_number))
            })?;

            parts.push(
                CompletedPart::builder()
                    .e_tag(e_tag)
                    .part_number(part_number)
                    .build(),
            );
            offset = end;
            part_number += 1;
        }

        Ok(parts)
    }
}

#[async_trait]
impl ArtifactStore for S3Store {
    async fn fetch(&self, key: &str) -> StoreResult<Bytes> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service = e.into_service_error();
                if service.is_no_such_key() {
                    StoreError::NotFound(key.to_string())
                } else {
                    StoreError::Backend(service.to_string())
                }
            })?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Backend(format!("reading {}: {}", key, e)))?;

        Ok(body.into_bytes())
    }

    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> StoreResult<String> {
        if bytes.len() > PART_SIZE {
            self.put_multipart(key, bytes, content_type).await?;
        } else {
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .content_type(content_type)
                .body(ByteStream::from(bytes))
                .send()
                .await
                .map_err(backend)?;
        }

        Ok(self.locate(key))
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        // DeleteObject succeeds for absent keys.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(backend)?;
        Ok(())
    }

    fn locate(&self, key: &str) -> String {
        format!("{}/{}", self.bucket, key)
    }

    fn publication(&self) -> Publication {
        Publication::Remote
    }
}

fn backend(e: impl std::error::Error) -> StoreError {
    StoreError::Backend(aws_sdk_s3::error::DisplayErrorContext(e).to_string())
}
