//! Data model for cached entries and invalidation records (spec §3).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A cached transformed image, identified by `(fingerprint, processor_name)`
/// — uniqueness enforced at the metadata layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedImage {
    pub raw_request: String,
    pub fingerprint: String,
    pub processor_name: String,
    pub endpoint: String,
    pub mime_type: String,
    pub byte_size: i64,
    pub source_url: String,
    /// Stored as a jsonb column rather than flattened columns, mirroring the
    /// original's `map[string][]string` parameter bag without a migration
    /// per transform parameter.
    pub params: BTreeMap<String, Vec<String>>,
}

/// A journal entry for one invalidation batch against a project/commit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvalidationRecord {
    pub project_name: String,
    pub commit_hash: String,
    pub date: chrono::DateTime<chrono::Utc>,
    pub requested: Vec<String>,
    pub done: Vec<String>,
    pub invalidated: Vec<CachedImage>,
    pub error_text: Option<String>,
}
