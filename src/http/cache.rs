//! HTTP cache control module
//!
//! Provides content fingerprinting and conditional request negotiation.
//!
//! A file response goes through `INITIAL -> VALIDATING -> {FULL, NOT_MODIFIED}`.
//! Entering VALIDATING always sets `Cache-Control: no-cache` so clients
//! revalidate on every use instead of trusting a local expiry.

use chrono::{DateTime, Utc};
use hyper::header::{HeaderName, CACHE_CONTROL, ETAG, LAST_MODIFIED};
use hyper::StatusCode;
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use crate::config::ValidationStrategy;

const NO_CACHE: &str = "no-cache";

/// Lowercase hex SHA-256 digest of a file's bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the fingerprint of `content`
pub fn digest(content: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(content);
    Fingerprint(hex::encode(hasher.finalize()))
}

/// Check if client's `If-None-Match` header is exactly the fingerprint
///
/// The header is compared as an opaque string: quoting, weak prefixes,
/// lists and `*` are not interpreted, so none of them match.
pub fn validator_matches(if_none_match: Option<&str>, fingerprint: &Fingerprint) -> bool {
    if_none_match == Some(fingerprint.as_str())
}

/// Format a timestamp as an IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`)
pub fn format_http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// Parse an HTTP date header value
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Terminal state of a negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Send status 200 with the full body
    Full,
    /// Send status 304 with no body
    NotModified,
}

/// Result of negotiating one file response
#[derive(Debug, Clone)]
pub struct Negotiation {
    pub outcome: Outcome,
    pub headers: Vec<(HeaderName, String)>,
}

impl Negotiation {
    pub const fn status(&self) -> StatusCode {
        match self.outcome {
            Outcome::Full => StatusCode::OK,
            Outcome::NotModified => StatusCode::NOT_MODIFIED,
        }
    }

    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Decides between a full response and `304 Not Modified`
#[derive(Debug, Clone, Copy)]
pub struct CacheNegotiator {
    strategy: ValidationStrategy,
}

impl CacheNegotiator {
    pub const fn new(strategy: ValidationStrategy) -> Self {
        Self { strategy }
    }

    pub const fn strategy(&self) -> ValidationStrategy {
        self.strategy
    }

    /// Negotiate against a freshly computed content fingerprint
    ///
    /// A match yields 304; the `ETag` is repeated on the 304 so caches can
    /// refresh their stored validator. Anything else, including a missing
    /// header, yields 200 with `ETag` set to `fresh`.
    pub fn negotiate(&self, if_none_match: Option<&str>, fresh: &Fingerprint) -> Negotiation {
        let outcome = if validator_matches(if_none_match, fresh) {
            Outcome::NotModified
        } else {
            Outcome::Full
        };
        Negotiation {
            outcome,
            headers: vec![
                (CACHE_CONTROL, NO_CACHE.to_string()),
                (ETAG, fresh.to_string()),
            ],
        }
    }

    /// Negotiate against the file's modification time
    ///
    /// The mtime is compared at one-second resolution, the precision of an
    /// HTTP date. Unparsable `If-Modified-Since` values are ignored.
    pub fn negotiate_modified(
        &self,
        if_modified_since: Option<&str>,
        modified: SystemTime,
    ) -> Negotiation {
        let modified_secs = DateTime::<Utc>::from(modified).timestamp();
        let outcome = match if_modified_since.and_then(parse_http_date) {
            Some(since) if modified_secs <= since.timestamp() => Outcome::NotModified,
            _ => Outcome::Full,
        };
        Negotiation {
            outcome,
            headers: vec![
                (CACHE_CONTROL, NO_CACHE.to_string()),
                (LAST_MODIFIED, format_http_date(modified)),
            ],
        }
    }

    /// Full response without validators
    pub const fn unvalidated() -> Negotiation {
        Negotiation {
            outcome: Outcome::Full,
            headers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedFingerprint {
    modified: SystemTime,
    len: u64,
    fingerprint: Fingerprint,
}

/// In-memory map from file path to its last computed fingerprint
///
/// An entry is valid only while the file's mtime and length are unchanged.
pub struct FingerprintCache {
    entries: Mutex<LruCache<PathBuf, CachedFingerprint>>,
}

impl FingerprintCache {
    /// A zero capacity is treated as one entry
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Look up a fingerprint, evicting the entry if the file changed
    pub fn get(&self, path: &Path, modified: SystemTime, len: u64) -> Option<Fingerprint> {
        let mut entries = self.entries.lock().ok()?;
        let entry = entries.get(path)?;
        if entry.modified == modified && entry.len == len {
            return Some(entry.fingerprint.clone());
        }
        entries.pop(path);
        None
    }

    pub fn insert(&self, path: PathBuf, modified: SystemTime, len: u64, fingerprint: Fingerprint) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(
                path,
                CachedFingerprint {
                    modified,
                    len,
                    fingerprint,
                },
            );
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |entries| entries.len())
    }
}
