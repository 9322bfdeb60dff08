//! S3-compatible storage backend using the AWS SDK.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::MetadataDirective;
use aws_sdk_s3::Client;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use tracing::trace;

use crate::error::{StorageError, StorageResult};
use crate::traits::{ObjectMeta, ObjectStore, PutOptions};

/// Connection settings for [`S3Store`].
#[derive(Clone)]
pub struct S3Options {
    pub bucket: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Custom endpoint for S3-compatible stores. None means AWS.
    pub endpoint_url: Option<String>,
    /// Path-style addressing, required by most non-AWS endpoints.
    pub path_style: bool,
}

/// Mirror bucket backed by S3 or an S3-compatible service.
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl std::fmt::Debug for S3Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Store")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl S3Store {
    pub fn new(options: S3Options) -> Self {
        let credentials = Credentials::new(
            options.access_key_id,
            options.secret_access_key,
            None,
            None,
            "yumsync-config",
        );
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(options.region))
            .retry_config(RetryConfig::standard().with_max_attempts(4));
        if let Some(endpoint_url) = options.endpoint_url {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        if options.path_style {
            config_builder = config_builder.force_path_style(true);
        }
        let client = Client::from_conf(config_builder.build());

        Self {
            client,
            bucket: options.bucket,
        }
    }
}

fn request_error<E>(action: &'static str, key: &str, err: E) -> StorageError
where
    E: std::error::Error,
{
    StorageError::Request {
        action,
        key: key.to_string(),
        message: DisplayErrorContext(err).to_string(),
    }
}

fn is_not_found<E>(err: &SdkError<E>) -> bool {
    if let SdkError::ServiceError(service_err) = err {
        service_err.raw().status().as_u16() == 404
    } else {
        false
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, key: &str, data: Vec<u8>, opts: &PutOptions) -> StorageResult<()> {
        trace!("putting {key} ({} bytes)", data.len());
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data));
        if let Some(cache_control) = opts.cache_control() {
            request = request.cache_control(cache_control);
        }
        request
            .send()
            .await
            .map_err(|err| request_error("put", key, err))?;
        Ok(())
    }

    async fn put_file(&self, key: &str, path: &Path, opts: &PutOptions) -> StorageResult<()> {
        trace!("uploading {} to {key}", path.display());
        let body = ByteStream::from_path(path)
            .await
            .map_err(|err| request_error("upload", key, err))?;
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body);
        if let Some(cache_control) = opts.cache_control() {
            request = request.cache_control(cache_control);
        }
        request
            .send()
            .await
            .map_err(|err| request_error("upload", key, err))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                if is_not_found(&err) {
                    return Ok(None);
                }
                return Err(request_error("get", key, err));
            }
        };
        let data = output
            .body
            .collect()
            .await
            .map_err(|err| request_error("get", key, err))?
            .to_vec();
        Ok(Some(data))
    }

    async fn head(&self, key: &str) -> StorageResult<Option<ObjectMeta>> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => {
                Ok(Some(ObjectMeta {
                    size: output.content_length().unwrap_or(0) as u64,
                }))
            }
            Err(err) => {
                if is_not_found(&err) {
                    return Ok(None);
                }
                Err(request_error("head", key, err))
            }
        }
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let mut results = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);
            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let output = request
                .send()
                .await
                .map_err(|err| request_error("list", prefix, err))?;

            for obj in output.contents() {
                if let Some(obj_key) = obj.key() {
                    results.push(obj_key.to_string());
                }
            }

            if output.is_truncated() == Some(true) {
                continuation_token = output.next_continuation_token().map(|s| s.to_string());
            } else {
                break;
            }
        }

        Ok(results)
    }

    async fn copy(&self, from: &str, to: &str, opts: &PutOptions) -> StorageResult<()> {
        trace!("copying {from} to {to}");
        // The key portion of CopySource must be URL-encoded. The bucket
        // name and its separating slash must not be.
        let copy_source = format!(
            "{}/{}",
            self.bucket,
            utf8_percent_encode(from, NON_ALPHANUMERIC)
        );

        let mut request = self
            .client
            .copy_object()
            .bucket(&self.bucket)
            .key(to)
            .copy_source(copy_source);
        if let Some(cache_control) = opts.cache_control() {
            request = request
                .metadata_directive(MetadataDirective::Replace)
                .cache_control(cache_control);
        }
        request
            .send()
            .await
            .map_err(|err| request_error("copy", from, err))?;
        Ok(())
    }
}
