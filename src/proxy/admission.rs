//! Origin/domain allow-lists (spec §4.9 steps 1 and 5), glob-matched the
//! same way `original_source/pkg/proxy/proxy_service.go` uses
//! `ryanuber/go-glob` — `globset` is this pack's Rust equivalent.

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::AdmissionError;

/// An empty allow-list means "allow all", matching
/// `len(p.config.AllowedOrigins) == 0` in the original.
pub struct AllowList {
    globs: Option<GlobSet>,
}

impl AllowList {
    pub fn new(patterns: &[String]) -> Self {
        if patterns.is_empty() || patterns.iter().any(|p| p == "*") {
            return Self { globs: None };
        }

        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            if let Ok(glob) = Glob::new(pattern) {
                builder.add(glob);
            }
        }

        Self {
            globs: builder.build().ok(),
        }
    }

    pub fn allows(&self, candidate: &str) -> bool {
        match &self.globs {
            None => true,
            Some(set) => set.is_match(candidate),
        }
    }
}

pub fn check_origin(allow_list: &AllowList, origin: &str) -> Result<(), AdmissionError> {
    if allow_list.allows(origin) {
        Ok(())
    } else {
        Err(AdmissionError::OriginNotAllowed)
    }
}

pub fn check_domain(allow_list: &AllowList, source_url: &str) -> Result<(), AdmissionError> {
    let host = url::Url::parse(source_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned));

    match host {
        Some(host) if allow_list.allows(&host) => Ok(()),
        _ => Err(AdmissionError::DomainNotAllowed),
    }
}

/// Splits `/<processor>/<endpoint>?<query>` into `(processor, "<endpoint>?<query>")`,
/// matching `parseRawRequestPath`'s `strings.SplitN(path, "/", 3)` with an
/// expected leading empty segment.
pub fn parse_raw_request_path(raw_path_and_query: &str) -> Result<(String, String), AdmissionError> {
    let (path, query) = match raw_path_and_query.split_once('?') {
        Some((p, q)) => (p, q),
        None => (raw_path_and_query, ""),
    };

    let segments: Vec<&str> = path.splitn(3, '/').collect();
    if segments.len() != 3 || !segments[0].is_empty() {
        return Err(AdmissionError::BadRequestPath);
    }

    let processor_name = segments[1].to_owned();
    let endpoint_and_query = if query.is_empty() {
        format!("/{}", segments[2])
    } else {
        format!("/{}?{}", segments[2], query)
    };

    Ok((processor_name, endpoint_and_query))
}
