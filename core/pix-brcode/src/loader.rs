//! Orchestration of the dynamic PIX flow.
//!
//! ```text
//! GET url → peek JWS header → resolve validated key (store, else JWKS
//! fetch + trust pipeline) → certificate validity window → kty/alg
//! binding → signature verification → PixPayment cast
//! ```
//!
//! Every step short-circuits; an error at any stage stops the flow and
//! bubbles to the caller unchanged.

use chrono::Utc;
use openssl::asn1::Asn1Time;
use openssl::x509::X509;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::error::{PixError, Result};
use crate::http::HttpClient;
use crate::keys::{self, KeyStore, ValidatedKey};
use crate::model::{Jwks, JwsHeader, KeyType, PixPayment, Schema};
use crate::pipeline;

/// Fetch, verify and parse a dynamic PIX payment, using the process-wide
/// key store.
pub fn load_pix(client: &impl HttpClient, url: &str) -> Result<PixPayment> {
    load_pix_with_store(client, KeyStore::global(), url)
}

/// [`load_pix`] against an explicit key store.
pub fn load_pix_with_store(
    client: &impl HttpClient,
    store: &KeyStore,
    url: &str,
) -> Result<PixPayment> {
    debug!(url, "fetching dynamic PIX payload");
    let response = client.get(url).map_err(PixError::Transport)?;
    if !response.is_success() {
        return Err(PixError::HttpStatusNotSuccess {
            status: response.status,
        });
    }
    let jws = String::from_utf8(response.body)
        .map_err(|_| PixError::InvalidJws("body is not valid UTF-8".to_string()))?;

    let header = pipeline::jws::peek_header(&jws)?;
    let key = resolve_key(client, store, &header)?;

    check_validity_window(&key.certificate)?;
    check_algorithm_binding(&header.alg, key.key.kty)?;

    let verifier = pipeline::jws::verifier_for(&header.alg, &key.jwk)?;
    let payload = pipeline::jws::verify(&jws, verifier.as_ref())?;

    let value: Value = serde_json::from_slice(&payload)
        .map_err(|e| PixError::InvalidJws(format!("payload is not JSON: {e}")))?;
    PixPayment::cast(value)
}

/// Resolve the signing key from the store, fetching and validating the
/// JWKS at `header.jku` on a miss.
fn resolve_key(
    client: &impl HttpClient,
    store: &KeyStore,
    header: &JwsHeader,
) -> Result<Arc<ValidatedKey>> {
    if let Some(key) = store.lookup(header) {
        debug!(jku = %header.jku, kid = %header.kid, "validated key found in store");
        return Ok(key);
    }

    debug!(jku = %header.jku, "key store miss, fetching JWKS");
    let response = client.get(&header.jku).map_err(PixError::Transport)?;
    if !response.is_success() {
        return Err(PixError::HttpStatusNotSuccess {
            status: response.status,
        });
    }

    let value: Value =
        serde_json::from_slice(&response.body).map_err(|_| PixError::InvalidJwksContents)?;
    if !value.is_object() {
        return Err(PixError::InvalidJwksContents);
    }

    let jwks = Jwks::cast(value)?;
    keys::process_keys(store, &jwks.keys, &header.jku)?;

    store.lookup(header).ok_or(PixError::KeyNotFoundInJku)
}

/// Inclusive validity window check against wall-clock UTC, zero skew.
fn check_validity_window(certificate: &X509) -> Result<()> {
    let now = Asn1Time::from_unix(Utc::now().timestamp())
        .map_err(|e| PixError::Crypto(e.to_string()))?;
    if now < certificate.not_before() {
        return Err(PixError::CertificateNotYetValid);
    }
    if now > certificate.not_after() {
        return Err(PixError::CertificateExpired);
    }
    Ok(())
}

/// The header's `alg` must belong to the resolved key's family; anything
/// else is an algorithm-confusion attempt.
fn check_algorithm_binding(alg: &str, kty: KeyType) -> Result<()> {
    let compatible = match kty {
        KeyType::EC => matches!(alg, "ES256" | "ES384" | "ES512"),
        KeyType::RSA => matches!(
            alg,
            "RS256" | "RS384" | "RS512" | "PS256" | "PS384" | "PS512"
        ),
    };
    if compatible {
        Ok(())
    } else {
        Err(PixError::InvalidTokenSigningAlgorithm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpResponse;
    use crate::model::Jwk;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use openssl::hash::MessageDigest;
    use openssl::pkey::{PKey, Private};
    use openssl::rsa::Rsa;
    use serde_json::json;
    use std::collections::HashMap;

    const JKU: &str = "https://somepixpsp.br/pix/v2/certs";
    const KID: &str = "key-1";
    const X5T: &str = "dGh1bWI";

    /// Routes `url → (status, body)`; anything else is a transport error.
    struct MockClient {
        routes: HashMap<String, (u16, Vec<u8>)>,
    }

    impl MockClient {
        fn new(routes: Vec<(&str, u16, Vec<u8>)>) -> Self {
            Self {
                routes: routes
                    .into_iter()
                    .map(|(url, status, body)| (url.to_string(), (status, body)))
                    .collect(),
            }
        }
    }

    impl HttpClient for MockClient {
        fn get(&self, url: &str) -> std::result::Result<HttpResponse, crate::error::TransportError> {
            match self.routes.get(url) {
                Some((status, body)) => Ok(HttpResponse {
                    status: *status,
                    body: body.clone(),
                    headers: Vec::new(),
                }),
                None => Err(format!("connection refused: {url}").into()),
            }
        }
    }

    fn certificate(
        not_before: Asn1Time,
        not_after: Asn1Time,
    ) -> (X509, PKey<Private>) {
        let rsa = Rsa::generate(2048).unwrap();
        let pkey = PKey::from_rsa(rsa).unwrap();
        let mut builder = X509::builder().unwrap();
        builder.set_pubkey(&pkey).unwrap();
        builder.set_not_before(&not_before).unwrap();
        builder.set_not_after(&not_after).unwrap();
        builder.sign(&pkey, MessageDigest::sha256()).unwrap();
        (builder.build(), pkey)
    }

    fn validated_rsa_key(certificate: X509) -> ValidatedKey {
        ValidatedKey {
            jwk: josekit::jwk::Jwk::new("RSA"),
            certificate,
            key: Jwk {
                kty: KeyType::RSA,
                kid: KID.to_string(),
                x5t: X5T.to_string(),
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
        }
    }

    fn install(store: &KeyStore, key: ValidatedKey) {
        let mut keys = crate::keys::store::KeyMap::new();
        keys.insert((X5T.to_string(), KID.to_string()), Arc::new(key));
        store.install(JKU, keys);
    }

    fn jws_with_alg(alg: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&json!({
                "jku": JKU,
                "kid": KID,
                "x5t": X5T,
                "alg": alg
            }))
            .unwrap(),
        );
        format!("{header}.e30.c2ln")
    }

    #[test]
    fn non_success_status_on_payment_url_fails() {
        let client = MockClient::new(vec![("https://psp.br/pix", 404, Vec::new())]);
        let store = KeyStore::new();
        let err = load_pix_with_store(&client, &store, "https://psp.br/pix").unwrap_err();
        assert!(matches!(
            err,
            PixError::HttpStatusNotSuccess { status: 404 }
        ));
    }

    #[test]
    fn transport_errors_pass_through() {
        let client = MockClient::new(vec![]);
        let store = KeyStore::new();
        let err = load_pix_with_store(&client, &store, "https://psp.br/pix").unwrap_err();
        assert!(matches!(err, PixError::Transport(_)));
    }

    #[test]
    fn non_utf8_body_is_an_invalid_jws() {
        let client = MockClient::new(vec![("https://psp.br/pix", 200, vec![0xFF, 0xFE])]);
        let store = KeyStore::new();
        let err = load_pix_with_store(&client, &store, "https://psp.br/pix").unwrap_err();
        assert!(matches!(err, PixError::InvalidJws(_)));
    }

    #[test]
    fn jwks_fetch_with_non_success_status_fails() {
        let client = MockClient::new(vec![
            ("https://psp.br/pix", 200, jws_with_alg("RS256").into_bytes()),
            (JKU, 500, Vec::new()),
        ]);
        let store = KeyStore::new();
        let err = load_pix_with_store(&client, &store, "https://psp.br/pix").unwrap_err();
        assert!(matches!(
            err,
            PixError::HttpStatusNotSuccess { status: 500 }
        ));
    }

    #[test]
    fn non_object_jwks_body_is_rejected() {
        for body in [&b"not json"[..], &b"[]"[..], &b"\"keys\""[..]] {
            let client = MockClient::new(vec![
                ("https://psp.br/pix", 200, jws_with_alg("RS256").into_bytes()),
                (JKU, 200, body.to_vec()),
            ]);
            let store = KeyStore::new();
            let err = load_pix_with_store(&client, &store, "https://psp.br/pix").unwrap_err();
            assert!(matches!(err, PixError::InvalidJwksContents));
        }
    }

    #[test]
    fn expired_certificate_is_rejected_before_verification() {
        let past = Asn1Time::from_unix(Utc::now().timestamp() - 86_400).unwrap();
        let long_past = Asn1Time::from_unix(Utc::now().timestamp() - 172_800).unwrap();
        let (cert, _key) = certificate(long_past, past);

        let store = KeyStore::new();
        install(&store, validated_rsa_key(cert));

        let client = MockClient::new(vec![(
            "https://psp.br/pix",
            200,
            jws_with_alg("RS256").into_bytes(),
        )]);
        let err = load_pix_with_store(&client, &store, "https://psp.br/pix").unwrap_err();
        assert!(matches!(err, PixError::CertificateExpired));
    }

    #[test]
    fn not_yet_valid_certificate_is_rejected() {
        let tomorrow = Asn1Time::days_from_now(1).unwrap();
        let next_year = Asn1Time::days_from_now(365).unwrap();
        let (cert, _key) = certificate(tomorrow, next_year);

        let store = KeyStore::new();
        install(&store, validated_rsa_key(cert));

        let client = MockClient::new(vec![(
            "https://psp.br/pix",
            200,
            jws_with_alg("RS256").into_bytes(),
        )]);
        let err = load_pix_with_store(&client, &store, "https://psp.br/pix").unwrap_err();
        assert!(matches!(err, PixError::CertificateNotYetValid));
    }

    #[test]
    fn ec_algorithm_over_rsa_key_is_rejected() {
        let now = Asn1Time::days_from_now(0).unwrap();
        let next_year = Asn1Time::days_from_now(365).unwrap();
        let (cert, _key) = certificate(now, next_year);

        let store = KeyStore::new();
        install(&store, validated_rsa_key(cert));

        let client = MockClient::new(vec![(
            "https://psp.br/pix",
            200,
            jws_with_alg("ES256").into_bytes(),
        )]);
        let err = load_pix_with_store(&client, &store, "https://psp.br/pix").unwrap_err();
        assert!(matches!(err, PixError::InvalidTokenSigningAlgorithm));
    }

    #[test]
    fn algorithm_binding_table() {
        for alg in ["ES256", "ES384", "ES512"] {
            assert!(check_algorithm_binding(alg, KeyType::EC).is_ok());
            assert!(check_algorithm_binding(alg, KeyType::RSA).is_err());
        }
        for alg in ["RS256", "RS384", "RS512", "PS256", "PS384", "PS512"] {
            assert!(check_algorithm_binding(alg, KeyType::RSA).is_ok());
            assert!(check_algorithm_binding(alg, KeyType::EC).is_err());
        }
        assert!(check_algorithm_binding("XX999", KeyType::RSA).is_err());
    }
}
