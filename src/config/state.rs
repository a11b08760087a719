// Application state module
// Holds the configuration and the per-process components shared by every request

use std::path::PathBuf;

use super::types::Config;
use crate::http::cache::{CacheNegotiator, FingerprintCache};

/// Application state
pub struct AppState {
    pub config: Config,
    /// Base directory for file lookups
    pub root_dir: PathBuf,
    pub negotiator: CacheNegotiator,
    /// Present only when `files.fingerprint_cache` is enabled
    pub fingerprints: Option<FingerprintCache>,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let fingerprints = config
            .files
            .fingerprint_cache
            .then(|| FingerprintCache::with_capacity(config.files.fingerprint_cache_capacity));

        Self {
            config: config.clone(),
            root_dir: PathBuf::from(&config.files.root_dir),
            negotiator: CacheNegotiator::new(config.files.validation),
            fingerprints,
        }
    }

    pub const fn access_log_enabled(&self) -> bool {
        self.config.logging.access_log
    }
}
