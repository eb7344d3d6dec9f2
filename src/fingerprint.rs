//! Request fingerprint canonicalization (spec §3 "Request Fingerprint").
//!
//! `|{endpoint}|{sourceURL}|` followed by `|key=v1,v2,...|` for every
//! parameter key in lexicographic order, including the source URL's own
//! `url` key. This string doubles as the Hub's `streamID` and (with the
//! processor name) the cache key.

use std::collections::BTreeMap;

/// A canonical request identity. Wraps a `String` so it can't be confused
/// with an arbitrary stream id at the type level.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Fingerprint> for String {
    fn from(value: Fingerprint) -> Self {
        value.0
    }
}

/// Computes the canonical fingerprint for a transform request.
///
/// `source_url` gets its own `|`-delimited segment between the endpoint and
/// the params, matching `go-imaginary`'s `"|" + path + "|" + source + "|"`.
/// `params` also carries the source URL under its `url` key — the original
/// processor folds it into the same parameter bag it signs in addition to
/// the dedicated segment — so every key (the source URL's key included)
/// still sorts lexicographically into the tail of the string.
pub fn compute(endpoint: &str, source_url: &str, params: &BTreeMap<String, Vec<String>>) -> Fingerprint {
    let mut out = String::with_capacity(64);
    out.push('|');
    out.push_str(endpoint);
    out.push('|');
    out.push_str(source_url);
    out.push('|');

    // The BTreeMap already iterates keys in lexicographic order.
    for (key, values) in params {
        out.push_str(key);
        out.push('=');
        out.push_str(&values.join(","));
        out.push('|');
    }

    Fingerprint(out)
}
