//! The `CacheFacade` port the Proxy Orchestrator depends on (spec §4.6),
//! composing a metadata repository and a blob store with rollback on
//! partial failure — the Rust shape of
//! `original_source/pkg/cache/cache_service.go`'s `cacheService`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use super::models::CachedImage;
use super::repository::CachedImagesRepository;
use super::storage::CachedImagesStorage;
use crate::error::CacheError;
use crate::hub::{DataStreamInput, DataStreamOutput};

#[async_trait]
pub trait CacheFacade: Send + Sync {
    /// Streams the cached bytes for `(fingerprint, processor_name)` into
    /// `input`. On `EntryNotFound` or any other error, `input` is handed
    /// back unclosed in the `Err` tuple — the caller (Proxy Orchestrator)
    /// reuses the same handle for the transform path instead of opening a
    /// second stream for an id that already exists (spec §9 Open
    /// Questions).
    async fn get(
        &self,
        fingerprint: &str,
        processor_name: &str,
        input: DataStreamInput,
    ) -> Result<(), (DataStreamInput, CacheError)>;

    /// Inserts metadata, then uploads the blob read from `output`. On
    /// partial failure (metadata committed, blob upload failed) both are
    /// rolled back. Always closes `output` on exit.
    async fn save(&self, info: CachedImage, output: DataStreamOutput) -> Result<(), CacheError>;

    /// Removes every cached entry for `source_url`, metadata first then
    /// blob. Aborts on the first error but still returns the entries
    /// removed so far rather than discarding that progress.
    async fn invalidate_all_entries_for_url(
        &self,
        source_url: &str,
    ) -> Result<Vec<CachedImage>, CacheError>;
}

pub struct CacheService {
    repository: Arc<dyn CachedImagesRepository>,
    storage: Arc<dyn CachedImagesStorage>,
}

impl CacheService {
    pub fn new(
        repository: Arc<dyn CachedImagesRepository>,
        storage: Arc<dyn CachedImagesStorage>,
    ) -> Self {
        Self { repository, storage }
    }
}

#[async_trait]
impl CacheFacade for CacheService {
    async fn get(
        &self,
        fingerprint: &str,
        processor_name: &str,
        input: DataStreamInput,
    ) -> Result<(), (DataStreamInput, CacheError)> {
        self.storage.get(fingerprint, processor_name, input).await
    }

    async fn save(&self, info: CachedImage, output: DataStreamOutput) -> Result<(), CacheError> {
        if let Err(e) = self.repository.create_cached_image_info(&info).await {
            let _ = output.close().await;
            return Err(e);
        }

        if let Err(e) = self
            .storage
            .save(&info.fingerprint, &info.processor_name, &info.mime_type, output)
            .await
        {
            if let Err(rollback_err) = self
                .repository
                .delete_cached_image_info(&info.fingerprint, &info.processor_name)
                .await
            {
                error!(error = %rollback_err, "failed to roll back metadata row after blob save failure");
            }
            if let Err(rollback_err) = self
                .storage
                .delete(&info.fingerprint, &info.processor_name)
                .await
            {
                error!(error = %rollback_err, "failed to roll back partial blob after save failure");
            }
            return Err(e);
        }

        Ok(())
    }

    async fn invalidate_all_entries_for_url(
        &self,
        source_url: &str,
    ) -> Result<Vec<CachedImage>, CacheError> {
        let entries = self
            .repository
            .get_cached_image_infos_of_source(source_url)
            .await?;

        let mut removed = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Err(e) = self
                .repository
                .delete_cached_image_info(&entry.fingerprint, &entry.processor_name)
                .await
            {
                error!(error = %e, fingerprint = %entry.fingerprint, "aborting invalidation batch on metadata delete failure");
                return Ok(removed);
            }
            if let Err(e) = self
                .storage
                .delete(&entry.fingerprint, &entry.processor_name)
                .await
            {
                error!(error = %e, fingerprint = %entry.fingerprint, "aborting invalidation batch on blob delete failure");
                return Ok(removed);
            }
            removed.push(entry);
        }

        Ok(removed)
    }
}
