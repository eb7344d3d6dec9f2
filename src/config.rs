//! Environment-driven configuration (spec §6).

use std::env;

fn comma_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

pub struct Config {
    pub imaginary_service_url: String,
    pub allowed_domains: Vec<String>,
    pub allowed_origins: Vec<String>,
    pub invalidate_security_token: Option<String>,
    pub database_url: String,
    pub s3_endpoint: String,
    pub s3_bucket: String,
    pub s3_access_key: String,
    pub s3_secret_key: String,
    pub s3_region: String,
    pub bind_addr: String,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            imaginary_service_url: env::var("IMCAXY_IMAGINARY_SERVICE_URL")
                .expect("IMCAXY_IMAGINARY_SERVICE_URL must be set"),
            allowed_domains: comma_list(&env::var("IMCAXY_ALLOWED_DOMAINS").unwrap_or_else(|_| "*".to_owned())),
            allowed_origins: comma_list(&env::var("IMCAXY_ALLOWED_ORIGINS").unwrap_or_else(|_| "*".to_owned())),
            invalidate_security_token: env::var("IMCAXY_INVALIDATE_SECURITY_TOKEN").ok(),
            database_url: env::var("IMCAXY_DATABASE_URL").expect("IMCAXY_DATABASE_URL must be set"),
            s3_endpoint: env::var("IMCAXY_S3_ENDPOINT").expect("IMCAXY_S3_ENDPOINT must be set"),
            s3_bucket: env::var("IMCAXY_S3_BUCKET").expect("IMCAXY_S3_BUCKET must be set"),
            s3_access_key: env::var("IMCAXY_S3_ACCESS_KEY").expect("IMCAXY_S3_ACCESS_KEY must be set"),
            s3_secret_key: env::var("IMCAXY_S3_SECRET_KEY").expect("IMCAXY_S3_SECRET_KEY must be set"),
            s3_region: env::var("IMCAXY_S3_REGION").unwrap_or_else(|_| "us-east-1".to_owned()),
            bind_addr: env::var("IMCAXY_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned()),
        }
    }
}
