//! Process-wide, read-mostly store of validated signing keys.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use openssl::x509::X509;

use crate::model::{Jwk, JwsHeader};

/// Key of the inner map: `(x5t, kid)`.
pub(crate) type KeyId = (String, String);

/// The inner map installed under one `jku`.
pub(crate) type KeyMap = HashMap<KeyId, Arc<ValidatedKey>>;

static GLOBAL: Lazy<KeyStore> = Lazy::new(KeyStore::new);

/// A signing key that survived the whole trust pipeline.
#[derive(Clone)]
pub struct ValidatedKey {
    /// JWK built solely from the declared algebraic parameters; this is
    /// what signature verification trusts.
    pub jwk: josekit::jwk::Jwk,
    /// The leaf certificate of the validated `x5c` chain.
    pub certificate: X509,
    /// The raw JWKS record the key was built from.
    pub key: Jwk,
}

impl fmt::Debug for ValidatedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatedKey")
            .field("kid", &self.key.kid)
            .field("x5t", &self.key.x5t)
            .field("kty", &self.key.kty)
            .finish_non_exhaustive()
    }
}

/// Concurrent map `jku → {(x5t, kid) → ValidatedKey}`.
///
/// Readers clone the inner `Arc` and work on a snapshot without holding
/// any lock across their use of it. Writers replace the whole inner map
/// for a `jku` in one shot; concurrent writers for the same `jku` race
/// and the last committed batch wins, which is sound because every
/// installed batch passed the same validation pipeline.
#[derive(Default)]
pub struct KeyStore {
    entries: DashMap<String, Arc<KeyMap>>,
}

impl KeyStore {
    /// Create an empty, private store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The store shared by the whole process, used by the crate-level
    /// [`load_pix`](crate::load_pix) / [`process_keys`](crate::process_keys)
    /// / [`lookup`](crate::lookup) functions.
    pub fn global() -> &'static KeyStore {
        &GLOBAL
    }

    /// Look up the key a JWS header points at.
    pub fn lookup(&self, header: &JwsHeader) -> Option<Arc<ValidatedKey>> {
        let snapshot = self.snapshot(&header.jku)?;
        snapshot
            .get(&(header.x5t.clone(), header.kid.clone()))
            .cloned()
    }

    /// Snapshot of everything currently installed under a `jku`.
    pub(crate) fn snapshot(&self, jku: &str) -> Option<Arc<KeyMap>> {
        // Clone the Arc and drop the shard guard immediately; the
        // snapshot stays valid while writers swap in new maps.
        self.entries.get(jku).map(|entry| Arc::clone(entry.value()))
    }

    /// Install a validated batch, replacing whatever was under `jku`.
    pub(crate) fn install(&self, jku: &str, keys: KeyMap) {
        self.entries.insert(jku.to_string(), Arc::new(keys));
    }

    /// Number of `jku` entries currently installed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been installed yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JwsHeader, KeyType};
    use openssl::pkey::PKey;
    use openssl::rsa::Rsa;
    use openssl::x509::X509;

    fn dummy_certificate() -> X509 {
        let rsa = Rsa::generate(2048).unwrap();
        let pkey = PKey::from_rsa(rsa).unwrap();
        let mut builder = X509::builder().unwrap();
        builder.set_pubkey(&pkey).unwrap();
        builder
            .set_not_before(&openssl::asn1::Asn1Time::days_from_now(0).unwrap())
            .unwrap();
        builder
            .set_not_after(&openssl::asn1::Asn1Time::days_from_now(1).unwrap())
            .unwrap();
        builder
            .sign(&pkey, openssl::hash::MessageDigest::sha256())
            .unwrap();
        builder.build()
    }

    fn validated_key(kid: &str, x5t: &str) -> Arc<ValidatedKey> {
        Arc::new(ValidatedKey {
            jwk: josekit::jwk::Jwk::new("RSA"),
            certificate: dummy_certificate(),
            key: Jwk {
                kty: KeyType::RSA,
                kid: kid.to_string(),
                x5t: x5t.to_string(),
                x5c: vec!["bGVhZg==".to_string(), "cm9vdA==".to_string()],
                key_ops: vec!["verify".to_string()],
                use_: None,
                alg: None,
                x5t_s256: None,
                x5u: None,
                n: Some("AQAB".to_string()),
                e: Some("AQAB".to_string()),
                crv: None,
                x: None,
                y: None,
            },
        })
    }

    fn header(jku: &str, x5t: &str, kid: &str) -> JwsHeader {
        JwsHeader {
            jku: jku.to_string(),
            kid: kid.to_string(),
            x5t: x5t.to_string(),
            alg: "RS256".to_string(),
        }
    }

    #[test]
    fn lookup_misses_on_empty_store() {
        let store = KeyStore::new();
        assert!(store
            .lookup(&header("https://psp.br/certs", "t1", "k1"))
            .is_none());
    }

    #[test]
    fn install_then_lookup_hits() {
        let store = KeyStore::new();
        let mut keys = KeyMap::new();
        keys.insert(("t1".into(), "k1".into()), validated_key("k1", "t1"));
        store.install("https://psp.br/certs", keys);

        let found = store.lookup(&header("https://psp.br/certs", "t1", "k1"));
        assert!(found.is_some());
        assert!(store
            .lookup(&header("https://psp.br/certs", "t1", "other"))
            .is_none());
        assert!(store
            .lookup(&header("https://other.br/certs", "t1", "k1"))
            .is_none());
    }

    #[test]
    fn install_replaces_the_whole_inner_map() {
        let store = KeyStore::new();

        let mut first = KeyMap::new();
        first.insert(("t1".into(), "k1".into()), validated_key("k1", "t1"));
        store.install("https://psp.br/certs", first);

        let mut second = KeyMap::new();
        second.insert(("t2".into(), "k2".into()), validated_key("k2", "t2"));
        store.install("https://psp.br/certs", second);

        assert!(store
            .lookup(&header("https://psp.br/certs", "t1", "k1"))
            .is_none());
        assert!(store
            .lookup(&header("https://psp.br/certs", "t2", "k2"))
            .is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn snapshots_survive_replacement() {
        let store = KeyStore::new();
        let mut first = KeyMap::new();
        first.insert(("t1".into(), "k1".into()), validated_key("k1", "t1"));
        store.install("https://psp.br/certs", first);

        let snapshot = store.snapshot("https://psp.br/certs").unwrap();
        store.install("https://psp.br/certs", KeyMap::new());

        // The old snapshot still resolves the key.
        assert!(snapshot.get(&("t1".to_string(), "k1".to_string())).is_some());
        // New lookups see the replacement.
        assert!(store
            .lookup(&header("https://psp.br/certs", "t1", "k1"))
            .is_none());
    }
}
