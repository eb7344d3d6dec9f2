//! Upstream Fetcher: streams an origin image URL into an input handle,
//! mapping status codes to typed errors (spec §4.8).

use futures_util::StreamExt;
use tracing::{instrument, warn};

use crate::error::{FetchError, HubError};
use crate::hub::DataStreamInput;

#[derive(Clone)]
pub struct UpstreamFetcher {
    http: reqwest::Client,
}

impl UpstreamFetcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// GETs `url`; maps 404 to `NotFound404` and any other non-200 to
    /// `StatusNotOk`. On success, spawns a detached pump copying the
    /// response body into `input` and closes it with the pump's outcome.
    /// A pre-pump failure closes `input` with the mapped error so the
    /// caller's response path can observe it immediately.
    #[instrument(skip(self, input), fields(%url))]
    pub async fn fetch(&self, url: &str, input: DataStreamInput) -> Result<(), FetchError> {
        let response = match self.http.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                let err = FetchError::Request(e);
                let _ = input.close(Some(HubError::Upstream(err.to_string()))).await;
                return Err(err);
            }
        };

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            let _ = input
                .close(Some(HubError::Upstream(FetchError::NotFound404.to_string())))
                .await;
            return Err(FetchError::NotFound404);
        }
        if status != reqwest::StatusCode::OK {
            let _ = input
                .close(Some(HubError::Upstream(FetchError::StatusNotOk.to_string())))
                .await;
            return Err(FetchError::StatusNotOk);
        }

        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut pump_err: Option<HubError> = None;

            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(bytes) => {
                        if let Err(e) = input.write(&bytes).await {
                            pump_err = Some(e);
                            break;
                        }
                    }
                    Err(e) => {
                        pump_err = Some(HubError::Upstream(e.to_string()));
                        break;
                    }
                }
            }

            if let Err(e) = input.close(pump_err).await {
                warn!(error = %e, "failed to close origin fetch input stream");
            }
        });

        Ok(())
    }
}
