use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{info, warn};

use super::KeyLookupError;

/// The key authority: resolves a key id to PEM-encoded key material.
#[async_trait]
pub trait KeyLookup: Send + Sync + 'static {
    async fn private_key(&self, kid: &str) -> Result<String, KeyLookupError>;
    async fn public_key(&self, kid: &str) -> Result<String, KeyLookupError>;
}

#[derive(Debug, Default)]
struct KeyPair {
    private: Option<String>,
    public: Option<String>,
}

/// An in-memory [`KeyLookup`].
///
/// [`KeyStore::from_dir`] loads a folder laid out as `<kid>.pem` (private)
/// and `<kid>.pub.pem` (public). A kid with only a public key can verify
/// tokens but not sign them.
#[derive(Debug, Default)]
pub struct KeyStore {
    keys: RwLock<HashMap<String, KeyPair>>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, kid: impl Into<String>, private_pem: Option<String>, public_pem: Option<String>) {
        self.keys.write().insert(kid.into(), KeyPair { private: private_pem, public: public_pem });
    }

    pub fn from_dir(dir: impl AsRef<Path>) -> io::Result<Self> {
        let mut keys: HashMap<String, KeyPair> = HashMap::new();

        for entry in fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            if let Some(kid) = name.strip_suffix(".pub.pem") {
                keys.entry(kid.to_owned()).or_default().public = Some(fs::read_to_string(&path)?);
            } else if let Some(kid) = name.strip_suffix(".pem") {
                keys.entry(kid.to_owned()).or_default().private = Some(fs::read_to_string(&path)?);
            }
        }

        for (kid, pair) in &keys {
            if pair.public.is_none() {
                warn!(kid = %kid, "no public key found, tokens signed with it cannot be verified");
            }
        }
        info!(dir = %dir.as_ref().display(), count = keys.len(), "loaded signing keys");

        Ok(Self { keys: RwLock::new(keys) })
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }

    fn get(&self, kid: &str, pick: impl Fn(&KeyPair) -> Option<&String>) -> Result<String, KeyLookupError> {
        self.keys
            .read()
            .get(kid)
            .and_then(pick)
            .cloned()
            .ok_or_else(|| KeyLookupError::NotFound { kid: kid.to_owned() })
    }
}

#[async_trait]
impl KeyLookup for KeyStore {
    async fn private_key(&self, kid: &str) -> Result<String, KeyLookupError> {
        self.get(kid, |pair| pair.private.as_ref())
    }

    async fn public_key(&self, kid: &str) -> Result<String, KeyLookupError> {
        self.get(kid, |pair| pair.public.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_pairs_from_a_folder() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("k1.pem"), "private-1").unwrap();
        fs::write(dir.path().join("k1.pub.pem"), "public-1").unwrap();
        fs::write(dir.path().join("k2.pub.pem"), "public-2").unwrap();
        fs::write(dir.path().join("README.md"), "ignored").unwrap();

        let store = KeyStore::from_dir(dir.path()).unwrap();
        assert_eq!(store.len(), 2);

        assert_eq!(store.private_key("k1").await.unwrap(), "private-1");
        assert_eq!(store.public_key("k1").await.unwrap(), "public-1");
        assert_eq!(store.public_key("k2").await.unwrap(), "public-2");
        assert!(matches!(store.private_key("k2").await, Err(KeyLookupError::NotFound { .. })));
    }

    #[tokio::test]
    async fn unknown_kid_is_not_found() {
        let store = KeyStore::new();
        store.insert("k1", None, Some("pub".into()));

        match store.public_key("nope").await {
            Err(KeyLookupError::NotFound { kid }) => assert_eq!(kid, "nope"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn missing_folder_is_an_io_error() {
        assert!(KeyStore::from_dir("/definitely/not/here").is_err());
    }
}
