//! Route handlers: the primary proxy GET, invalidation endpoints, and the
//! liveness probe (spec §6).

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::proxy::ProxyOutcome;
use crate::state::AppState;

use super::response::{bad_request, forbidden, internal_error, not_found, unauthorized};
use super::stream_body::into_body;

pub async fn proxy_handler(State(state): State<AppState>, uri: Uri, headers: HeaderMap) -> Response {
    let origin = headers
        .get(axum::http::header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let raw_path = match uri.path_and_query() {
        Some(pq) => pq.as_str(),
        None => uri.path(),
    };

    match state.proxy.handle(raw_path, origin).await {
        ProxyOutcome::Ok { output, mime_type } => {
            let mut response = into_body(output).into_response();
            if let Some(mime_type) = mime_type {
                if let Ok(value) = mime_type.parse() {
                    response
                        .headers_mut()
                        .insert(axum::http::header::CONTENT_TYPE, value);
                }
            }
            response
        }
        ProxyOutcome::Fallback { output } => {
            let mut response = into_body(output).into_response();
            *response.status_mut() = StatusCode::BAD_GATEWAY;
            response
        }
        ProxyOutcome::NotFound => not_found("source image not found"),
        ProxyOutcome::BadRequest(msg) => bad_request(msg),
        ProxyOutcome::Forbidden(msg) => forbidden(msg),
        ProxyOutcome::Internal(msg) => internal_error(msg),
    }
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn check_invalidate_auth(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    match &state.invalidate_security_token {
        None => Ok(()),
        Some(expected) => match extract_bearer(headers) {
            Some(token) if token == expected => Ok(()),
            _ => Err(unauthorized("missing or invalid bearer token")),
        },
    }
}

fn query_pairs(uri: &Uri) -> Vec<(String, String)> {
    uri.query()
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default()
}

pub async fn invalidate_handler(State(state): State<AppState>, uri: Uri, headers: HeaderMap) -> Response {
    if let Err(response) = check_invalidate_auth(&state, &headers) {
        return response;
    }

    let pairs = query_pairs(&uri);
    let project_name = pairs
        .iter()
        .find(|(k, _)| k == "projectName")
        .map(|(_, v)| v.clone());
    let commit_hash = pairs
        .iter()
        .find(|(k, _)| k == "latestCommitHash")
        .map(|(_, v)| v.clone());
    let urls: Vec<String> = pairs
        .iter()
        .filter(|(k, _)| k == "urls")
        .map(|(_, v)| v.clone())
        .collect();

    let (Some(project_name), Some(commit_hash)) = (project_name, commit_hash) else {
        return bad_request("projectName and latestCommitHash are required");
    };
    if urls.is_empty() {
        return bad_request("at least one urls parameter is required");
    }

    match state
        .invalidator
        .invalidate(&project_name, &commit_hash, &urls, chrono::Utc::now())
        .await
    {
        Ok(record) => Json(record).into_response(),
        Err(e) => {
            let status = StatusCode::INTERNAL_SERVER_ERROR;
            (status, Json(super::response::HttpErrorEnvelope {
                code: "INTERNAL_ERROR".to_owned(),
                message: e.to_string(),
                details: None,
            }))
                .into_response()
        }
    }
}

pub async fn last_invalidation_handler(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = check_invalidate_auth(&state, &headers) {
        return response;
    }

    let project_name = query_pairs(&uri)
        .into_iter()
        .find(|(k, _)| k == "projectName")
        .map(|(_, v)| v);

    let Some(project_name) = project_name else {
        return bad_request("projectName is required");
    };

    match state.invalidator.get_last_known_invalidation(&project_name).await {
        Ok(record) => Json(record).into_response(),
        Err(_) => not_found("no invalidation record for project"),
    }
}

pub async fn healthz() -> impl IntoResponse {
    "ok"
}
