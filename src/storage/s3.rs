//! Amazon S3 storage backend (requires the `s3` feature).

use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};

use crate::error::{PublishError, Result};
use crate::storage::{ObjectMeta, ObjectStore, PutOptions, StoredObject, target_path};

/// Storage backend that stores objects in an Amazon S3 (or S3-compatible) bucket.
///
/// S3 never renames objects on its own, so the random suffix for
/// non-exact writes is applied client-side.
///
/// # Example
///
/// ```rust,ignore
/// use site_publisher::{S3Storage, Credentials, Region, S3Config};
///
/// let creds = Credentials::new("AKID", "SECRET", None, None, "my-app");
/// let config = S3Config::builder()
///     .region(Region::new("us-east-1"))
///     .credentials_provider(creds)
///     .build();
/// let storage = S3Storage::from_conf(config, "my-bucket")
///     .with_public_base("https://static.example.com");
/// ```
pub struct S3Storage {
    client: Client,
    bucket: String,
    public_base: String,
}

impl S3Storage {
    /// Create a new `S3Storage` with an existing [`Client`] and bucket name.
    ///
    /// Object URLs default to the virtual-hosted bucket endpoint.
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        let bucket = bucket.into();
        let public_base = format!("https://{bucket}.s3.amazonaws.com");
        Self {
            client,
            bucket,
            public_base,
        }
    }

    /// Create an `S3Storage` from an [`aws_sdk_s3::Config`].
    pub fn from_conf(config: aws_sdk_s3::Config, bucket: impl Into<String>) -> Self {
        let client = Client::from_conf(config);
        Self::new(client, bucket)
    }

    /// Create an `S3Storage` using credentials and region from the AWS
    /// environment (env vars, config files, IMDS, etc.).
    pub async fn from_env(bucket: impl Into<String>) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;
        let client = Client::new(&config);
        Self::new(client, bucket)
    }

    /// Override the base URL objects are addressed by (CDN, custom domain).
    pub fn with_public_base(mut self, public_base: impl Into<String>) -> Self {
        self.public_base = public_base.into();
        self
    }
}

impl ObjectStore for S3Storage {
    fn public_base(&self) -> &str {
        &self.public_base
    }

    async fn put(&self, key: &str, content: &[u8], opts: &PutOptions) -> Result<StoredObject> {
        let key = target_path(key, opts);
        // Public visibility is governed by the bucket policy, not per-object ACLs.
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(content.to_vec().into())
            .content_type(&opts.content_type)
            .send()
            .await
            .map_err(|e| PublishError::StoreWrite(Box::new(e)))?;

        tracing::debug!(
            "Uploaded {} bytes to s3://{}/{}",
            content.len(),
            self.bucket,
            key
        );
        Ok(StoredObject {
            url: self.url(&key),
            path: key,
        })
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
                return Ok(None);
            }
            Err(e) => return Err(PublishError::StoreRead(Box::new(e))),
        };

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| PublishError::StoreRead(Box::new(e)))?
            .into_bytes();
        Ok(Some(bytes.to_vec()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut found = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| PublishError::StoreRead(Box::new(e)))?;
            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                let uploaded_at = object
                    .last_modified()
                    .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()))
                    .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
                found.push(ObjectMeta {
                    path: key.to_string(),
                    url: self.url(key),
                    uploaded_at,
                });
            }
        }

        tracing::debug!(
            "Listed {} objects under s3://{}/{}",
            found.len(),
            self.bucket,
            prefix
        );
        Ok(found)
    }
}
