//! End-to-end: when the transform service fails, the proxy falls back to
//! streaming the origin image; when the origin also fails, the client sees
//! a 404-equivalent outcome (spec §8 scenarios 4 and 5).

mod support;

use std::collections::HashMap;
use std::sync::Arc;

use imcaxy::fetch::UpstreamFetcher;
use imcaxy::hub::DataHub;
use imcaxy::proxy::{AllowList, ProxyOrchestrator, ProxyOutcome};
use imcaxy::transform::TransformClient;

fn orchestrator(transform_addr: std::net::SocketAddr) -> ProxyOrchestrator {
    let mut processors = HashMap::new();
    processors.insert(
        "imaginary".to_owned(),
        TransformClient::new(format!("http://{transform_addr}"), reqwest::Client::new()),
    );

    ProxyOrchestrator::new(
        Arc::new(DataHub::new()),
        support::in_memory_cache(),
        UpstreamFetcher::new(reqwest::Client::new()),
        processors,
        AllowList::new(&[]),
        AllowList::new(&[]),
    )
}

#[tokio::test]
async fn transform_failure_falls_back_to_origin_bytes() {
    let transform_addr = support::spawn_not_found_server().await;
    let origin_addr = support::spawn_fixed_response_server(b"origin-bytes", "image/jpeg").await;
    let orchestrator = orchestrator(transform_addr);

    let path = format!("/imaginary/crop?url=http://{origin_addr}/photo.jpg&width=10");
    let outcome = orchestrator.handle(&path, "any-origin").await;

    match outcome {
        ProxyOutcome::Fallback { output } => {
            let mut buf = [0u8; 64];
            let n = output.read_at(&mut buf, 0).await.unwrap();
            assert_eq!(&buf[..n], b"origin-bytes");
        }
        _ => panic!("expected a Fallback outcome"),
    }
}

#[tokio::test]
async fn transform_and_origin_both_failing_is_not_found() {
    let transform_addr = support::spawn_not_found_server().await;
    let origin_addr = support::spawn_not_found_server().await;
    let orchestrator = orchestrator(transform_addr);

    let path = format!("/imaginary/crop?url=http://{origin_addr}/missing.jpg&width=10");
    let outcome = orchestrator.handle(&path, "any-origin").await;

    assert!(matches!(outcome, ProxyOutcome::NotFound));
}
