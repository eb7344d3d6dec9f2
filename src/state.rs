//! Wires the component modules into the shared `AppState` the HTTP layer
//! runs against (spec §6), the same role as the teacher's `state.rs`.

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::PgPool;

use crate::cache::{
    CacheFacade, CacheService, Invalidator, PostgresCachedImagesRepository,
    PostgresInvalidationsRepository, S3CachedImagesStorage,
};
use crate::config::Config;
use crate::fetch::UpstreamFetcher;
use crate::hub::DataHub;
use crate::proxy::{AllowList, ProxyOrchestrator};
use crate::transform::TransformClient;

#[derive(Clone)]
pub struct AppState {
    pub proxy: Arc<ProxyOrchestrator>,
    pub invalidator: Arc<Invalidator>,
    pub invalidate_security_token: Option<String>,
}

impl AppState {
    pub async fn new(config: &Config, pool: PgPool) -> Self {
        let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .endpoint_url(&config.s3_endpoint)
            .region(aws_sdk_s3::config::Region::new(config.s3_region.clone()))
            .credentials_provider(aws_sdk_s3::config::Credentials::new(
                &config.s3_access_key,
                &config.s3_secret_key,
                None,
                None,
                "imcaxy-static",
            ))
            .load()
            .await;
        let s3_client = aws_sdk_s3::Client::new(&s3_config);

        let repository = Arc::new(PostgresCachedImagesRepository::new(pool.clone()));
        let storage = Arc::new(S3CachedImagesStorage::new(s3_client, config.s3_bucket.clone()));
        let cache: Arc<dyn CacheFacade> = Arc::new(CacheService::new(repository, storage));

        let invalidations_repository = Arc::new(PostgresInvalidationsRepository::new(pool));
        let invalidator = Arc::new(Invalidator::new(Arc::clone(&cache), invalidations_repository));

        let http = reqwest::Client::new();
        let mut processors = HashMap::new();
        processors.insert(
            "imaginary".to_owned(),
            TransformClient::new(config.imaginary_service_url.clone(), http.clone()),
        );

        let proxy = Arc::new(ProxyOrchestrator::new(
            Arc::new(DataHub::new()),
            cache,
            UpstreamFetcher::new(http),
            processors,
            AllowList::new(&config.allowed_origins),
            AllowList::new(&config.allowed_domains),
        ));

        Self {
            proxy,
            invalidator,
            invalidate_security_token: config.invalidate_security_token.clone(),
        }
    }
}
