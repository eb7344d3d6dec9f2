//! Metadata persistence for cached image info (spec §4.6 / §6 "metadata
//! collection keyed uniquely on (fingerprint, processorName)").
//!
//! Plays the role of `original_source/pkg/cache/repositories/image_repository.go`,
//! backed by Postgres instead of MongoDB — reached only through
//! `CachedImagesRepository`, matching `interfaces.go` in the original.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::models::CachedImage;
use crate::error::CacheError;

#[async_trait]
pub trait CachedImagesRepository: Send + Sync {
    async fn create_cached_image_info(&self, info: &CachedImage) -> Result<(), CacheError>;
    async fn delete_cached_image_info(
        &self,
        fingerprint: &str,
        processor_name: &str,
    ) -> Result<(), CacheError>;
    async fn get_cached_image_info(
        &self,
        fingerprint: &str,
        processor_name: &str,
    ) -> Result<CachedImage, CacheError>;
    async fn get_cached_image_infos_of_source(
        &self,
        source_url: &str,
    ) -> Result<Vec<CachedImage>, CacheError>;
}

pub struct PostgresCachedImagesRepository {
    pool: PgPool,
}

impl PostgresCachedImagesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_image(row: &sqlx::postgres::PgRow) -> CachedImage {
        let params: sqlx::types::Json<BTreeMap<String, Vec<String>>> = row.get("params");
        CachedImage {
            raw_request: row.get("raw_request"),
            fingerprint: row.get("fingerprint"),
            processor_name: row.get("processor_name"),
            endpoint: row.get("endpoint"),
            mime_type: row.get("mime_type"),
            byte_size: row.get("byte_size"),
            source_url: row.get("source_url"),
            params: params.0,
        }
    }
}

fn to_metadata_error(err: sqlx::Error) -> CacheError {
    CacheError::Metadata(Box::new(err))
}

#[async_trait]
impl CachedImagesRepository for PostgresCachedImagesRepository {
    async fn create_cached_image_info(&self, info: &CachedImage) -> Result<(), CacheError> {
        let existing = sqlx::query(
            "SELECT 1 FROM cached_images WHERE fingerprint = $1 AND processor_name = $2",
        )
        .bind(&info.fingerprint)
        .bind(&info.processor_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(to_metadata_error)?;

        if existing.is_some() {
            return Err(CacheError::EntryAlreadyExists);
        }

        sqlx::query(
            r"INSERT INTO cached_images
                (fingerprint, processor_name, raw_request, endpoint, mime_type, byte_size, source_url, params)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&info.fingerprint)
        .bind(&info.processor_name)
        .bind(&info.raw_request)
        .bind(&info.endpoint)
        .bind(&info.mime_type)
        .bind(info.byte_size)
        .bind(&info.source_url)
        .bind(sqlx::types::Json(&info.params))
        .execute(&self.pool)
        .await
        .map_err(to_metadata_error)?;

        Ok(())
    }

    async fn delete_cached_image_info(
        &self,
        fingerprint: &str,
        processor_name: &str,
    ) -> Result<(), CacheError> {
        let result = sqlx::query(
            "DELETE FROM cached_images WHERE fingerprint = $1 AND processor_name = $2",
        )
        .bind(fingerprint)
        .bind(processor_name)
        .execute(&self.pool)
        .await
        .map_err(to_metadata_error)?;

        if result.rows_affected() == 0 {
            return Err(CacheError::EntryNotFound);
        }

        Ok(())
    }

    async fn get_cached_image_info(
        &self,
        fingerprint: &str,
        processor_name: &str,
    ) -> Result<CachedImage, CacheError> {
        let row = sqlx::query(
            "SELECT * FROM cached_images WHERE fingerprint = $1 AND processor_name = $2",
        )
        .bind(fingerprint)
        .bind(processor_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(to_metadata_error)?;

        row.as_ref()
            .map(Self::row_to_image)
            .ok_or(CacheError::EntryNotFound)
    }

    async fn get_cached_image_infos_of_source(
        &self,
        source_url: &str,
    ) -> Result<Vec<CachedImage>, CacheError> {
        let rows = sqlx::query("SELECT * FROM cached_images WHERE source_url = $1")
            .bind(source_url)
            .fetch_all(&self.pool)
            .await
            .map_err(to_metadata_error)?;

        Ok(rows.iter().map(Self::row_to_image).collect())
    }
}
