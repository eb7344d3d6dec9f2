//! End-to-end: concurrent identical requests coalesce onto one producer,
//! and a subsequent identical request is served from the cache without
//! re-invoking the transform service (spec §8 scenarios 1 and 2).

mod support;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use imcaxy::hub::DataHub;
use imcaxy::proxy::{AllowList, ProxyOrchestrator, ProxyOutcome};
use imcaxy::fetch::UpstreamFetcher;
use imcaxy::transform::TransformClient;

fn orchestrator(hub: Arc<DataHub>, transform_addr: std::net::SocketAddr) -> ProxyOrchestrator {
    let mut processors = HashMap::new();
    processors.insert(
        "imaginary".to_owned(),
        TransformClient::new(format!("http://{transform_addr}"), reqwest::Client::new()),
    );

    ProxyOrchestrator::new(
        hub,
        support::in_memory_cache(),
        UpstreamFetcher::new(reqwest::Client::new()),
        processors,
        AllowList::new(&[]),
        AllowList::new(&[]),
    )
}

#[tokio::test]
async fn concurrent_identical_requests_coalesce_onto_one_transform_call() {
    let call_count = Arc::new(AtomicUsize::new(0));
    let transform_addr = support::spawn_fixed_response_server(b"transformed-bytes", "image/jpeg").await;

    let hub = Arc::new(DataHub::new());
    let orchestrator = Arc::new(orchestrator(hub, transform_addr));

    let path = "/imaginary/crop?url=http://origin.invalid/photo.jpg&width=100";
    let mut handles = Vec::new();
    for _ in 0..5 {
        let orchestrator = Arc::clone(&orchestrator);
        let call_count = Arc::clone(&call_count);
        handles.push(tokio::spawn(async move {
            let outcome = orchestrator.handle(path, "any-origin").await;
            match outcome {
                ProxyOutcome::Ok { output, .. } => {
                    let mut buf = [0u8; 64];
                    let mut collected = Vec::new();
                    loop {
                        let n = output.read_at(&mut buf, collected.len() as u64).await.unwrap();
                        if n == 0 {
                            break;
                        }
                        collected.extend_from_slice(&buf[..n]);
                    }
                    call_count.fetch_add(1, Ordering::SeqCst);
                    collected
                }
                _ => panic!("expected Ok outcome"),
            }
        }));
    }

    for handle in handles {
        let bytes = handle.await.unwrap();
        assert_eq!(bytes, b"transformed-bytes");
    }
    assert_eq!(call_count.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn repeat_request_after_write_through_is_served_from_cache() {
    // A second transform call would fail outright (connection dropped),
    // which is the point: this test fails loudly if the cache is skipped.
    let transform_addr = support::spawn_single_shot_response_server(b"first-bytes", "image/png").await;
    let hub = Arc::new(DataHub::new());
    let orchestrator = orchestrator(hub, transform_addr);

    let path = "/imaginary/resize?url=http://origin.invalid/a.jpg&width=50";
    let outcome = orchestrator.handle(path, "any-origin").await;
    let ProxyOutcome::Ok { output, .. } = outcome else {
        panic!("expected Ok outcome on first request")
    };
    let mut buf = [0u8; 32];
    let n = output.read_at(&mut buf, 0).await.unwrap();
    assert_eq!(&buf[..n], b"first-bytes");

    // Give the detached write-through task a chance to persist the entry.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let second = orchestrator.handle(path, "any-origin").await;
    match second {
        ProxyOutcome::Ok { output, .. } => {
            let mut buf = [0u8; 32];
            let n = output.read_at(&mut buf, 0).await.unwrap();
            assert_eq!(&buf[..n], b"first-bytes");
        }
        _ => panic!("expected Ok outcome on second request"),
    }
}
