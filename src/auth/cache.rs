use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::{KeyLookup, KeyLookupError};

/// Public signing keys by key id, fetched lazily from a [`KeyLookup`].
///
/// Entries never expire; key material for a given id is treated as
/// immutable. Readers share the lock and never wait on a fetch another
/// request already completed. A miss holds no lock while the key authority
/// is being called.
///
/// By default concurrent misses for the same id each call the key authority
/// and the last write wins. With [`KeyCache::coalesce_misses`] they queue
/// behind a per-id gate and only the first one fetches.
pub struct KeyCache {
    lookup: Arc<dyn KeyLookup>,
    keys: RwLock<HashMap<String, Arc<str>>>,
    coalesce: bool,
    inflight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyCache {
    pub fn new(lookup: Arc<dyn KeyLookup>) -> Self {
        Self {
            lookup,
            keys: RwLock::new(HashMap::new()),
            coalesce: false,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn coalesce_misses(mut self, enabled: bool) -> Self {
        self.coalesce = enabled;
        self
    }

    /// The key authority behind the cache.
    pub fn lookup(&self) -> &Arc<dyn KeyLookup> {
        &self.lookup
    }

    /// Returns the public PEM for `kid`, fetching it on a miss.
    pub async fn resolve(&self, kid: &str) -> Result<Arc<str>, KeyLookupError> {
        if let Some(pem) = self.cached(kid) {
            return Ok(pem);
        }

        if !self.coalesce {
            return self.fetch(kid).await;
        }

        let gate = Arc::clone(self.inflight.lock().entry(kid.to_owned()).or_default());
        let _turn = gate.lock().await;

        // Whoever held the gate before us may have filled the entry.
        if let Some(pem) = self.cached(kid) {
            return Ok(pem);
        }

        let result = self.fetch(kid).await;
        self.inflight.lock().remove(kid);
        result
    }

    /// Drops one entry. Returns whether it was present.
    pub fn invalidate(&self, kid: &str) -> bool {
        self.keys.write().remove(kid).is_some()
    }

    pub fn clear(&self) {
        self.keys.write().clear();
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }

    fn cached(&self, kid: &str) -> Option<Arc<str>> {
        self.keys.read().get(kid).cloned()
    }

    async fn fetch(&self, kid: &str) -> Result<Arc<str>, KeyLookupError> {
        debug!(kid = %kid, "signing key cache miss");

        let pem: Arc<str> = self.lookup.public_key(kid).await?.into();
        self.keys.write().insert(kid.to_owned(), Arc::clone(&pem));
        Ok(pem)
    }
}
