//! Proxy Orchestrator: origin/domain admission → fingerprint → Hub
//! coalescing → cache lookup → transform → write-through → respond;
//! fallback to the origin image on transform failure (spec §4.9).

mod admission;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, instrument, warn};

pub use admission::AllowList;

use crate::cache::{CacheFacade, CachedImage};
use crate::error::CacheError;
use crate::fetch::UpstreamFetcher;
use crate::hub::{DataHub, DataStreamOutput};
use crate::transform::TransformClient;

/// What the HTTP layer should do with the result of `Handle`.
pub enum ProxyOutcome {
    /// Serve `output` as the response body with `mime_type` (when known).
    Ok {
        output: DataStreamOutput,
        mime_type: Option<String>,
    },
    /// Transform failed but the origin image was fetched successfully: the
    /// client sees the original bytes with a 5xx status.
    Fallback { output: DataStreamOutput },
    /// Transform failed and the origin also 404'd.
    NotFound,
    BadRequest(&'static str),
    Forbidden(&'static str),
    Internal(String),
}

pub struct ProxyOrchestrator {
    hub: Arc<DataHub>,
    cache: Arc<dyn CacheFacade>,
    fetcher: UpstreamFetcher,
    processors: HashMap<String, TransformClient>,
    allowed_origins: AllowList,
    allowed_domains: AllowList,
}

impl ProxyOrchestrator {
    pub fn new(
        hub: Arc<DataHub>,
        cache: Arc<dyn CacheFacade>,
        fetcher: UpstreamFetcher,
        processors: HashMap<String, TransformClient>,
        allowed_origins: AllowList,
        allowed_domains: AllowList,
    ) -> Self {
        Self {
            hub,
            cache,
            fetcher,
            processors,
            allowed_origins,
            allowed_domains,
        }
    }

    #[instrument(skip(self), fields(%raw_path, %origin))]
    pub async fn handle(&self, raw_path: &str, origin: &str) -> ProxyOutcome {
        if admission::check_origin(&self.allowed_origins, origin).is_err() {
            return ProxyOutcome::Forbidden("request origin not allowed");
        }

        let (processor_name, endpoint_and_query) = match admission::parse_raw_request_path(raw_path) {
            Ok(parts) => parts,
            Err(_) => return ProxyOutcome::BadRequest("bad request"),
        };

        let Some(processor) = self.processors.get(&processor_name) else {
            return ProxyOutcome::BadRequest("unknown processor");
        };

        let parsed = match processor.parse_request(&endpoint_and_query) {
            Ok(parsed) => parsed,
            Err(_) => return ProxyOutcome::BadRequest("request parsing error"),
        };

        if admission::check_domain(&self.allowed_domains, &parsed.source_url).is_err() {
            return ProxyOutcome::Forbidden("source image domain not allowed");
        }

        let fingerprint = parsed.fingerprint.as_str().to_owned();
        let (output, input) = match self.hub.get_or_create_stream(&fingerprint).await {
            Ok(pair) => pair,
            Err(e) => return ProxyOutcome::Internal(format!("data stream creation error: {e}")),
        };

        let Some(input) = input else {
            // Coalesced: another task is already producing for this fingerprint.
            return ProxyOutcome::Ok {
                output,
                mime_type: None,
            };
        };

        let input = match self.cache.get(&fingerprint, &processor_name, input).await {
            Ok(()) => {
                return ProxyOutcome::Ok {
                    output,
                    mime_type: None,
                };
            }
            Err((input, CacheError::EntryNotFound)) => input,
            Err((input, e)) => {
                error!(error = %e, "cache lookup failed");
                let _ = input.close(None).await;
                let _ = output.close().await;
                return ProxyOutcome::Internal("cache error".to_owned());
            }
        };

        // Cache miss: the facade handed the same input handle back unclosed,
        // so the transform writes into the stream `output` already reads
        // from rather than racing to create a second producer for an id
        // that's still registered.
        match processor.process_image(&parsed, input).await {
            Ok((mime_type, byte_size)) => {
                self.schedule_write_through(&fingerprint, &processor_name, &parsed, &mime_type, byte_size, raw_path);
                ProxyOutcome::Ok {
                    output,
                    mime_type: Some(mime_type),
                }
            }
            Err(transform_err) => {
                warn!(error = %transform_err, "transform failed, falling back to origin");
                let fallback_input = match self.hub.create_stream(&format!("{fingerprint}::fallback")).await {
                    Ok(input) => input,
                    Err(e) => return ProxyOutcome::Internal(format!("fallback stream creation error: {e}")),
                };

                match self.fetcher.fetch(&parsed.source_url, fallback_input).await {
                    Ok(()) => {
                        let fallback_output = match self
                            .hub
                            .get_stream_output(&format!("{fingerprint}::fallback"))
                            .await
                        {
                            Ok(output) => output,
                            Err(e) => return ProxyOutcome::Internal(format!("fallback output error: {e}")),
                        };
                        ProxyOutcome::Fallback {
                            output: fallback_output,
                        }
                    }
                    Err(_) => ProxyOutcome::NotFound,
                }
            }
        }
    }

    fn schedule_write_through(
        &self,
        fingerprint: &str,
        processor_name: &str,
        parsed: &crate::transform::ParsedTransformRequest,
        mime_type: &str,
        byte_size: u64,
        raw_request: &str,
    ) {
        let hub = Arc::clone(&self.hub);
        let cache = Arc::clone(&self.cache);
        let fingerprint = fingerprint.to_owned();
        let processor_name = processor_name.to_owned();
        let info = CachedImage {
            raw_request: raw_request.to_owned(),
            fingerprint: fingerprint.clone(),
            processor_name: processor_name.clone(),
            endpoint: parsed.endpoint.clone(),
            mime_type: mime_type.to_owned(),
            byte_size: byte_size as i64,
            source_url: parsed.source_url.clone(),
            params: parsed.params.clone(),
        };

        // Detached: write-through must survive a client disconnect (spec §9).
        tokio::spawn(async move {
            let write_through_output = match hub.get_stream_output(&fingerprint).await {
                Ok(output) => output,
                Err(e) => {
                    warn!(error = %e, "failed to obtain write-through output");
                    return;
                }
            };

            if let Err(e) = cache.save(info, write_through_output).await {
                warn!(error = %e, "write-through cache save failed");
            }
        });
    }
}
