//! Transform Client: parses a request path into `(endpoint, params,
//! fingerprint)` and drives the external transformation service (spec §4.7).

use std::collections::BTreeMap;

use tracing::{instrument, warn};
use url::Url;

use crate::error::{HubError, TransformError};
use crate::fingerprint::{self, Fingerprint};
use crate::hub::DataStreamInput;

/// The fixed endpoint allow-list the upstream `imaginary`-style transform
/// service exposes (spec §4.7; `original_source/pkg/processor/imaginary/processor.go`'s
/// `supportedImaginaryEndpoints`).
const SUPPORTED_ENDPOINTS: &[&str] = &[
    "/info",
    "/crop",
    "/smartcrop",
    "/resize",
    "/enlarge",
    "/extract",
    "/zoom",
    "/thumbnail",
    "/fit",
    "/rotate",
    "/autorotate",
    "/flip",
    "/flop",
    "/convert",
    "/pipeline",
    "/watermark",
    "/watermarkimage",
    "/blur",
];

/// The result of parsing a `/<endpoint>?<query>` request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTransformRequest {
    pub endpoint: String,
    pub source_url: String,
    pub params: BTreeMap<String, Vec<String>>,
    pub fingerprint: Fingerprint,
}

/// Issues requests to a configured `imaginary`-compatible transform
/// service and streams its response into a `DataStreamInput`.
#[derive(Clone)]
pub struct TransformClient {
    service_base: String,
    http: reqwest::Client,
}

impl TransformClient {
    pub fn new(service_base: String, http: reqwest::Client) -> Self {
        Self { service_base, http }
    }

    /// Parses `endpoint_path?query` (the portion of the request path after
    /// the processor name) into a `ParsedTransformRequest`. Requires a `url`
    /// query parameter and an endpoint in the fixed allow-list.
    pub fn parse_request(&self, endpoint_and_query: &str) -> Result<ParsedTransformRequest, TransformError> {
        let placeholder_base = Url::parse("http://placeholder.invalid").expect("static base parses");
        let full = placeholder_base
            .join(endpoint_and_query)
            .map_err(|e| TransformError::BadRequestPath(e.to_string()))?;

        let endpoint = full.path().to_owned();
        if !SUPPORTED_ENDPOINTS.contains(&endpoint.as_str()) {
            return Err(TransformError::OperationNotSupported);
        }

        let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (key, value) in full.query_pairs() {
            params.entry(key.into_owned()).or_default().push(value.into_owned());
        }

        let source_url = params
            .get("url")
            .and_then(|v| v.first())
            .ok_or(TransformError::UrlParamMissing)?
            .clone();

        let fingerprint = fingerprint::compute(&endpoint, &source_url, &params);

        Ok(ParsedTransformRequest {
            endpoint,
            source_url,
            params,
            fingerprint,
        })
    }

    /// Issues `GET {serviceBase}{endpoint}?{params}`, requires 200 plus a
    /// `Content-Type` and positive `Content-Length`, then spawns a detached
    /// pump that copies the response body into `input` and closes it with
    /// the pump's outcome. Returns `(mime_type, byte_size)` on success.
    ///
    /// A failure before the pump starts leaves `input` untouched so the
    /// caller can fall back to the origin fetcher with the same handle.
    #[instrument(skip(self, input), fields(endpoint = %parsed.endpoint))]
    pub async fn process_image(
        &self,
        parsed: &ParsedTransformRequest,
        input: DataStreamInput,
    ) -> Result<(String, u64), TransformError> {
        let mut url = Url::parse(&format!("{}{}", self.service_base, parsed.endpoint))
            .map_err(|e| TransformError::BadRequestPath(e.to_string()))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, values) in &parsed.params {
                for value in values {
                    pairs.append_pair(key, value);
                }
            }
        }

        let response = self.http.get(url).send().await?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(TransformError::StatusNotOk(response.status().as_u16()));
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .ok_or(TransformError::UnknownContentType)?;

        let byte_size = response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|n| *n > 0)
            .ok_or(TransformError::UnknownContentLength)?;

        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut pump_err: Option<HubError> = None;

            use futures_util::StreamExt;
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
                warn!(error = %e, "failed to close transform input stream");
            }
        });

        Ok((mime_type, byte_size))
    }
}
