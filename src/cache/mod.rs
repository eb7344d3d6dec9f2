//! Cache Facade: Get/Save/InvalidateByURL across a metadata repository and a
//! blob store, with rollback on partial failure (spec §4.6), plus the
//! Invalidator that journals invalidation batches (spec §4.10).

mod facade;
mod invalidation;
mod models;
mod repository;
mod storage;

pub use facade::{CacheFacade, CacheService};
pub use invalidation::{Invalidator, InvalidationsRepository, PostgresInvalidationsRepository};
pub use models::{CachedImage, InvalidationRecord};
pub use repository::{CachedImagesRepository, PostgresCachedImagesRepository};
pub use storage::{CachedImagesStorage, S3CachedImagesStorage};
