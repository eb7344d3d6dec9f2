//! Blob persistence for cached bytes (spec §4.6 / §6 "blob object name is
//! `urlEscape(fingerprint) + "::" + urlEscape(processorName)`").
//!
//! Plays the role of `original_source/pkg/cache/repositories/image_storage.go`,
//! backed by an S3-compatible object store instead of Minio's native client
//! (Minio itself speaks the S3 API, so `aws-sdk-s3` covers the same surface
//! the original reaches through `minio-go`).

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use tracing::warn;

use crate::error::{CacheError, HubError};
use crate::hub::{DataStreamInput, DataStreamOutput};

#[async_trait]
pub trait CachedImagesStorage: Send + Sync {
    async fn save(
        &self,
        fingerprint: &str,
        processor_name: &str,
        mime_type: &str,
        output: DataStreamOutput,
    ) -> Result<(), CacheError>;
    async fn get(
        &self,
        fingerprint: &str,
        processor_name: &str,
        input: DataStreamInput,
    ) -> Result<(), (DataStreamInput, CacheError)>;
    async fn delete(&self, fingerprint: &str, processor_name: &str) -> Result<(), CacheError>;
}

pub struct S3CachedImagesStorage {
    client: Client,
    bucket: String,
}

impl S3CachedImagesStorage {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    fn resource_id(fingerprint: &str, processor_name: &str) -> String {
        format!(
            "{}::{}",
            utf8_percent_encode(fingerprint, NON_ALPHANUMERIC),
            utf8_percent_encode(processor_name, NON_ALPHANUMERIC),
        )
    }

    async fn object_exists(&self, key: &str) -> Result<bool, CacheError> {
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                if is_not_found(&err) {
                    Ok(false)
                } else {
                    Err(CacheError::Blob(Box::new(err)))
                }
            }
        }
    }
}

/// `DataStreamOutput` only exposes `read_at`, not `tokio::io::AsyncRead`, so
/// this loops the cursor to completion instead of going through `write_to`.
async fn drain_to_vec(output: &DataStreamOutput) -> Result<Vec<u8>, HubError> {
    let mut bytes = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = output.read_at(&mut chunk, bytes.len() as u64).await?;
        if n == 0 {
            return Ok(bytes);
        }
        bytes.extend_from_slice(&chunk[..n]);
    }
}

fn is_not_found<E: std::fmt::Debug>(err: &aws_sdk_s3::error::SdkError<E>) -> bool {
    matches!(
        err,
        aws_sdk_s3::error::SdkError::ServiceError(service_err)
            if format!("{service_err:?}").contains("NotFound")
    )
}

#[async_trait]
impl CachedImagesStorage for S3CachedImagesStorage {
    async fn save(
        &self,
        fingerprint: &str,
        processor_name: &str,
        mime_type: &str,
        output: DataStreamOutput,
    ) -> Result<(), CacheError> {
        let key = Self::resource_id(fingerprint, processor_name);

        if self.object_exists(&key).await? {
            let _ = output.close().await;
            return Err(CacheError::EntryAlreadyExists);
        }

        let read_result = drain_to_vec(&output).await;
        let _ = output.close().await;
        let bytes = read_result.map_err(CacheError::Hub)?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(mime_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| CacheError::Blob(Box::new(e)))?;

        Ok(())
    }

    async fn get(
        &self,
        fingerprint: &str,
        processor_name: &str,
        input: DataStreamInput,
    ) -> Result<(), (DataStreamInput, CacheError)> {
        let key = Self::resource_id(fingerprint, processor_name);

        let object = match self.client.get_object().bucket(&self.bucket).key(&key).send().await {
            Ok(obj) => obj,
            Err(err) if is_not_found(&err) => return Err((input, CacheError::EntryNotFound)),
            Err(err) => return Err((input, CacheError::Blob(Box::new(err)))),
        };

        tokio::spawn(async move {
            let mut body = object.body;
            let mut pump_err: Option<HubError> = None;

            loop {
                match body.next().await {
                    Some(Ok(bytes)) => {
                        if let Err(e) = input.write(&bytes).await {
                            pump_err = Some(e);
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        pump_err = Some(HubError::Upstream(e.to_string()));
                        break;
                    }
                    None => break,
                }
            }

            if let Err(e) = input.close(pump_err).await {
                warn!(error = %e, "failed to close cache blob read stream");
            }
        });

        Ok(())
    }

    async fn delete(&self, fingerprint: &str, processor_name: &str) -> Result<(), CacheError> {
        let key = Self::resource_id(fingerprint, processor_name);

        if !self.object_exists(&key).await? {
            return Err(CacheError::EntryNotFound);
        }

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| CacheError::Blob(Box::new(e)))?;

        Ok(())
    }
}
