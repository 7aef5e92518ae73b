//! S3-compatible object store

use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use tracing::debug;

use super::{check_size, ObjectMetadata, ObjectStore, StoreError, StoredObject};

pub struct S3Store {
    client: S3Client,
    bucket: String,
    max_size_bytes: Option<u64>,
}

impl S3Store {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            max_size_bytes: None,
        }
    }

    /// Refuse objects whose Content-Length is over `max_size_bytes` before
    /// reading the body
    pub fn with_size_limit(mut self, max_size_bytes: u64) -> Self {
        self.max_size_bytes = Some(max_size_bytes);
        self
    }

    /// Build a client from the default credential chain
    ///
    /// `endpoint` points the client at MinIO, R2 or LocalStack; path-style
    /// addressing is forced in that case.
    pub async fn connect(bucket: &str, region: &str, endpoint: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()));
        if let Some(endpoint) = endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        let config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(endpoint.is_some())
            .build();
        Self::new(S3Client::from_conf(config), bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StoreError> {
        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    debug!(bucket = %self.bucket, key = %key, "Object not found");
                    return Ok(None);
                }
                return Err(StoreError::Backend(format!("S3 fetch failed: {service_err}")));
            }
        };

        if let Some(length) = response.content_length().and_then(|l| u64::try_from(l).ok()) {
            check_size(length, self.max_size_bytes)?;
        }

        let metadata = ObjectMetadata {
            etag: response
                .e_tag()
                .map(|tag| tag.trim_matches('"').to_string()),
            last_modified: response.last_modified().map(|ts| ts.secs()),
        };

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to read S3 body: {e}")))?
            .into_bytes();

        Ok(Some(StoredObject { bytes, metadata }))
    }

    fn name(&self) -> &'static str {
        "s3"
    }
}
