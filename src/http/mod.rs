mod handlers;
mod response;
mod stream_body;

pub use handlers::{healthz, invalidate_handler, last_invalidation_handler, proxy_handler};
pub use response::HttpErrorEnvelope;
