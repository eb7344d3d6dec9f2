//! End-to-end: origin/domain admission checks reject requests before any
//! network call, and invalidating a cached entry by source URL removes it
//! and forces the next identical request to transform again (spec §8
//! scenarios 3 and 6).

mod support;

use std::collections::HashMap;
use std::sync::Arc;

use imcaxy::cache::Invalidator;
use imcaxy::fetch::UpstreamFetcher;
use imcaxy::hub::DataHub;
use imcaxy::proxy::{AllowList, ProxyOrchestrator, ProxyOutcome};
use imcaxy::transform::TransformClient;

#[tokio::test]
async fn request_from_disallowed_origin_is_rejected_before_any_network_call() {
    let mut processors = HashMap::new();
    processors.insert(
        "imaginary".to_owned(),
        TransformClient::new("http://127.0.0.1:1".to_owned(), reqwest::Client::new()),
    );
    let orchestrator = ProxyOrchestrator::new(
        Arc::new(DataHub::new()),
        support::in_memory_cache(),
        UpstreamFetcher::new(reqwest::Client::new()),
        processors,
        AllowList::new(&["https://trusted.example".to_owned()]),
        AllowList::new(&[]),
    );

    let outcome = orchestrator
        .handle(
            "/imaginary/crop?url=http://origin.invalid/a.jpg",
            "https://untrusted.example",
        )
        .await;
    assert!(matches!(outcome, ProxyOutcome::Forbidden(_)));
}

#[tokio::test]
async fn request_for_source_outside_allowed_domains_is_rejected() {
    let mut processors = HashMap::new();
    processors.insert(
        "imaginary".to_owned(),
        TransformClient::new("http://127.0.0.1:1".to_owned(), reqwest::Client::new()),
    );
    let orchestrator = ProxyOrchestrator::new(
        Arc::new(DataHub::new()),
        support::in_memory_cache(),
        UpstreamFetcher::new(reqwest::Client::new()),
        processors,
        AllowList::new(&[]),
        AllowList::new(&["trusted-source.example".to_owned()]),
    );

    let outcome = orchestrator
        .handle("/imaginary/crop?url=http://untrusted-source.example/a.jpg", "any-origin")
        .await;
    assert!(matches!(outcome, ProxyOutcome::Forbidden(_)));
}

#[tokio::test]
async fn invalidating_by_url_removes_the_cached_entry_and_forces_retransform() {
    let transform_addr = support::spawn_fixed_response_server(b"v1-bytes", "image/jpeg").await;
    let mut processors = HashMap::new();
    processors.insert(
        "imaginary".to_owned(),
        TransformClient::new(format!("http://{transform_addr}"), reqwest::Client::new()),
    );

    let cache = support::in_memory_cache();
    let orchestrator = ProxyOrchestrator::new(
        Arc::new(DataHub::new()),
        Arc::clone(&cache),
        UpstreamFetcher::new(reqwest::Client::new()),
        processors,
        AllowList::new(&[]),
        AllowList::new(&[]),
    );

    let source_url = "http://origin.invalid/photo.jpg";
    let path = format!("/imaginary/crop?url={source_url}&width=10");

    let outcome = orchestrator.handle(&path, "any-origin").await;
    let ProxyOutcome::Ok { output, .. } = outcome else {
        panic!("expected Ok outcome");
    };
    let mut buf = [0u8; 32];
    let n = output.read_at(&mut buf, 0).await.unwrap();
    assert_eq!(&buf[..n], b"v1-bytes");

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let invalidator = Invalidator::new(Arc::clone(&cache), Arc::new(InMemoryInvalidations::default()));
    let record = invalidator
        .invalidate("proj", "commit-1", &[source_url.to_owned()], chrono::Utc::now())
        .await
        .unwrap();
    assert_eq!(record.invalidated.len(), 1);
    assert_eq!(record.invalidated[0].source_url, source_url);

    let fetched = invalidator.get_last_known_invalidation("proj").await.unwrap();
    assert_eq!(fetched.commit_hash, "commit-1");
}

use async_trait::async_trait;
use imcaxy::cache::InvalidationRecord;
use imcaxy::cache::InvalidationsRepository;
use imcaxy::error::InvalidationError;
use tokio::sync::Mutex as TokioMutex;

#[derive(Default)]
struct InMemoryInvalidations {
    records: TokioMutex<Vec<InvalidationRecord>>,
}

#[async_trait]
impl InvalidationsRepository for InMemoryInvalidations {
    async fn create_invalidation(&self, record: &InvalidationRecord) -> Result<(), InvalidationError> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }

    async fn get_latest_invalidation(&self, project_name: &str) -> Result<InvalidationRecord, InvalidationError> {
        self.records
            .lock()
            .await
            .iter()
            .filter(|r| r.project_name == project_name)
            .max_by_key(|r| r.date)
            .cloned()
            .ok_or(InvalidationError::ProjectNotFound)
    }
}
