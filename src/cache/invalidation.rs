//! Invalidator: journals invalidation batches per (project, commit) and
//! drives the cache facade (spec §4.10).

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::facade::CacheFacade;
use super::models::{CachedImage, InvalidationRecord};
use crate::error::InvalidationError;

#[async_trait]
pub trait InvalidationsRepository: Send + Sync {
    async fn create_invalidation(&self, record: &InvalidationRecord) -> Result<(), InvalidationError>;
    async fn get_latest_invalidation(
        &self,
        project_name: &str,
    ) -> Result<InvalidationRecord, InvalidationError>;
}

pub struct PostgresInvalidationsRepository {
    pool: PgPool,
}

impl PostgresInvalidationsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_metadata_error(err: sqlx::Error) -> InvalidationError {
    InvalidationError::Metadata(Box::new(err))
}

#[async_trait]
impl InvalidationsRepository for PostgresInvalidationsRepository {
    async fn create_invalidation(&self, record: &InvalidationRecord) -> Result<(), InvalidationError> {
        if record.project_name.is_empty() {
            return Err(InvalidationError::ProjectNameNotAllowed);
        }
        if record.commit_hash.is_empty() {
            return Err(InvalidationError::CommitHashNotAllowed);
        }

        sqlx::query(
            r"INSERT INTO invalidations
                (project_name, commit_hash, date, requested, done, invalidated, error_text)
              VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&record.project_name)
        .bind(&record.commit_hash)
        .bind(record.date)
        .bind(sqlx::types::Json(&record.requested))
        .bind(sqlx::types::Json(&record.done))
        .bind(sqlx::types::Json(&record.invalidated))
        .bind(&record.error_text)
        .execute(&self.pool)
        .await
        .map_err(to_metadata_error)?;

        Ok(())
    }

    async fn get_latest_invalidation(
        &self,
        project_name: &str,
    ) -> Result<InvalidationRecord, InvalidationError> {
        if project_name.is_empty() {
            return Err(InvalidationError::ProjectNameNotAllowed);
        }

        let row = sqlx::query(
            "SELECT * FROM invalidations WHERE project_name = $1 ORDER BY date DESC LIMIT 1",
        )
        .bind(project_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(to_metadata_error)?;

        let row = row.ok_or(InvalidationError::ProjectNotFound)?;

        let requested: sqlx::types::Json<Vec<String>> = row.get("requested");
        let done: sqlx::types::Json<Vec<String>> = row.get("done");
        let invalidated: sqlx::types::Json<Vec<CachedImage>> = row.get("invalidated");

        Ok(InvalidationRecord {
            project_name: row.get("project_name"),
            commit_hash: row.get("commit_hash"),
            date: row.get("date"),
            requested: requested.0,
            done: done.0,
            invalidated: invalidated.0,
            error_text: row.get("error_text"),
        })
    }
}

pub struct Invalidator {
    cache: Arc<dyn CacheFacade>,
    repository: Arc<dyn InvalidationsRepository>,
}

impl Invalidator {
    pub fn new(cache: Arc<dyn CacheFacade>, repository: Arc<dyn InvalidationsRepository>) -> Self {
        Self { cache, repository }
    }

    /// Invalidates every cached entry for each of `urls` under
    /// `(project_name, commit_hash)`. Stops at the first error but still
    /// persists the partial record with `error_text` set.
    pub async fn invalidate(
        &self,
        project_name: &str,
        commit_hash: &str,
        urls: &[String],
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<InvalidationRecord, InvalidationError> {
        if project_name.is_empty() {
            return Err(InvalidationError::ProjectNameNotAllowed);
        }
        if commit_hash.is_empty() {
            return Err(InvalidationError::CommitHashNotAllowed);
        }

        let mut record = InvalidationRecord {
            project_name: project_name.to_owned(),
            commit_hash: commit_hash.to_owned(),
            date: now,
            requested: urls.to_vec(),
            done: Vec::new(),
            invalidated: Vec::new(),
            error_text: None,
        };

        let mut first_error = None;
        for url in urls {
            match self.cache.invalidate_all_entries_for_url(url).await {
                Ok(mut entries) => {
                    record.invalidated.append(&mut entries);
                    record.done.push(url.clone());
                }
                Err(e) => {
                    first_error = Some(e);
                    break;
                }
            }
        }

        if let Some(err) = &first_error {
            record.error_text = Some(err.to_string());
        }

        self.repository.create_invalidation(&record).await?;

        match first_error {
            Some(err) => Err(InvalidationError::Cache(err)),
            None => Ok(record),
        }
    }

    pub async fn get_last_known_invalidation(
        &self,
        project_name: &str,
    ) -> Result<InvalidationRecord, InvalidationError> {
        self.repository.get_latest_invalidation(project_name).await
    }
}
