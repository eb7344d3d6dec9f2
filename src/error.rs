//! Error taxonomy shared across the crate (spec §7).
//!
//! Each component gets its own enum at the boundary it owns; the HTTP layer
//! (`http::response`) is the only place that collapses them into status
//! codes.

use thiserror::Error;

/// Errors surfaced by the Resource / Hub Storage layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HubError {
    #[error("unknown stream")]
    UnknownStream,
    #[error("stream already exists")]
    StreamAlreadyExists,
    #[error("stream closed for writing")]
    StreamClosedForWriting,
    #[error("stream already closed")]
    StreamAlreadyClosed,
    #[error("offset out of range")]
    OffsetOutOfRange,
    #[error("operation cancelled")]
    Cancelled,
    /// A producer `Close(err)` promoted to a reader's terminal error. The
    /// inner string is the rendered upstream error, not the error itself —
    /// upstream errors come from other components and we don't want a
    /// circular `From` dependency between `HubError` and every other error
    /// enum.
    #[error("{0}")]
    Upstream(String),
}

/// Errors from the cache facade (spec §4.6 / §7 "Cache").
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("entry not found")]
    EntryNotFound,
    #[error("entry already exists")]
    EntryAlreadyExists,
    #[error("hub error: {0}")]
    Hub(#[from] HubError),
    #[error("metadata store error: {0}")]
    Metadata(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("blob store error: {0}")]
    Blob(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors from the transform client (spec §4.7 / §7 "Input" + "Upstream").
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("url query parameter is required")]
    UrlParamMissing,
    #[error("operation not supported")]
    OperationNotSupported,
    #[error("malformed request path: {0}")]
    BadRequestPath(String),
    #[error("upstream transform service returned non-200 status: {0}")]
    StatusNotOk(u16),
    #[error("upstream transform service response is missing Content-Type")]
    UnknownContentType,
    #[error("upstream transform service response has no positive Content-Length")]
    UnknownContentLength,
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("hub error: {0}")]
    Hub(#[from] HubError),
}

/// Errors from the upstream origin fetcher (spec §4.8).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("response returned 404 status code")]
    NotFound404,
    #[error("response returned non-200 status code")]
    StatusNotOk,
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
}

/// Errors from `Invalidator` (spec §4.10).
#[derive(Debug, Error)]
pub enum InvalidationError {
    #[error("project name is not allowed")]
    ProjectNameNotAllowed,
    #[error("commit hash is not allowed")]
    CommitHashNotAllowed,
    #[error("project not found")]
    ProjectNotFound,
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("metadata store error: {0}")]
    Metadata(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors from the Proxy Orchestrator's admission checks (spec §4.9 / §7 "Input").
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("request origin not allowed")]
    OriginNotAllowed,
    #[error("source image domain not allowed")]
    DomainNotAllowed,
    #[error("bad request path")]
    BadRequestPath,
    #[error("unknown processor")]
    UnknownProcessor,
}

/// Top-level error surfaced by `ProxyOrchestrator::handle`, composing every
/// component error so the HTTP layer can collapse it into a single status
/// code (spec §7).
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("admission error: {0}")]
    Admission(#[from] AdmissionError),
    #[error("transform error: {0}")]
    Transform(#[from] TransformError),
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),
    #[error("hub error: {0}")]
    Hub(#[from] HubError),
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}
