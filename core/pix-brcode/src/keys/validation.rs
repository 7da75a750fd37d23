//! The certificate trust pipeline run over every JWKS batch.
//!
//! Each key must clear, in order:
//!
//! 1. a JWK built solely from its declared algebraic parameters;
//! 2. base64 decoding of the `x5c` chain, which must carry at least two
//!    certificates (the PSP publishes its root alongside the leaf — a
//!    deliberate divergence from the usual RFC 7517 §4.7 ordering);
//! 3. PKIX path validation with the *last* chain entry as trust anchor;
//! 4. SHA-1 thumbprint binding of the leaf against the key's `x5t`, and
//!    subject binding of the leaf CN / SAN dNSName against the `jku`
//!    authority;
//! 5. structural equality between the declared public key and the leaf
//!    certificate's public key.
//!
//! The batch is all-or-nothing: one bad key aborts the whole install and
//! the store keeps whatever it had before.

use std::sync::Arc;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Public};
use openssl::rsa::Rsa;
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::verify::X509VerifyFlags;
use openssl::x509::{X509StoreContext, X509};
use tracing::debug;
use url::Url;

use crate::error::{PixError, Result};
use crate::keys::store::{KeyMap, KeyStore, ValidatedKey};
use crate::model::{Jwk, KeyType};

/// Validate a JWKS batch and install it under `jku`.
///
/// Keys are processed in order and the first failure aborts the batch;
/// nothing is installed unless every key validates.
pub fn process_keys(store: &KeyStore, keys: &[Jwk], jku: &str) -> Result<()> {
    let authority = jku_authority(jku)?;

    let mut validated = KeyMap::with_capacity(keys.len());
    for key in keys {
        let validated_key = validate_key(key, &authority)?;
        validated.insert(
            (key.x5t.clone(), key.kid.clone()),
            Arc::new(validated_key),
        );
    }

    debug!(jku, keys = validated.len(), "installing validated key batch");
    store.install(jku, validated);
    Ok(())
}

fn jku_authority(jku: &str) -> Result<String> {
    let parsed =
        Url::parse(jku).map_err(|e| PixError::Crypto(format!("jku is not a valid URL: {e}")))?;
    Ok(parsed.authority().to_string())
}

fn validate_key(key: &Jwk, authority: &str) -> Result<ValidatedKey> {
    let declared_jwk = declared_jwk(key)?;
    let declared_pkey = declared_public_key(key)?;

    let ders = decode_chain(&key.x5c)?;
    if ders.len() < 2 {
        return Err(PixError::X5cMustHaveMoreThanOneCert);
    }
    let certs = parse_chain(&ders)?;

    let leaf = validate_path(&certs)?;

    let thumbprint = leaf
        .digest(MessageDigest::sha1())
        .map_err(|e| PixError::Crypto(e.to_string()))?;
    if URL_SAFE_NO_PAD.encode(&thumbprint) != key.x5t {
        return Err(PixError::KeyThumbprintAndLeafCertificateDiffer);
    }

    if !subject_matches(leaf, authority) {
        return Err(PixError::CertificateSubjectAndJkuUriAuthorityDiffer);
    }

    let leaf_pkey = leaf
        .public_key()
        .map_err(|e| PixError::Crypto(e.to_string()))?;
    if !declared_pkey.public_eq(&leaf_pkey) {
        return Err(PixError::KeyFromLeafCertificateDiffer);
    }

    debug!(kid = %key.kid, x5t = %key.x5t, "key cleared the trust pipeline");
    Ok(ValidatedKey {
        jwk: declared_jwk,
        certificate: leaf.clone(),
        key: key.clone(),
    })
}

/// Build a JWK carrying only the declared algebraic parameters; the
/// verifier is constructed from this, never from the certificate.
fn declared_jwk(key: &Jwk) -> Result<josekit::jwk::Jwk> {
    match key.kty {
        KeyType::EC => {
            let mut jwk = josekit::jwk::Jwk::new("EC");
            set_parameter(&mut jwk, "crv", &key.crv)?;
            set_parameter(&mut jwk, "x", &key.x)?;
            set_parameter(&mut jwk, "y", &key.y)?;
            Ok(jwk)
        }
        KeyType::RSA => {
            let mut jwk = josekit::jwk::Jwk::new("RSA");
            set_parameter(&mut jwk, "n", &key.n)?;
            set_parameter(&mut jwk, "e", &key.e)?;
            Ok(jwk)
        }
    }
}

fn set_parameter(
    jwk: &mut josekit::jwk::Jwk,
    name: &str,
    value: &Option<String>,
) -> Result<()> {
    let value = value
        .as_ref()
        .ok_or_else(|| PixError::Crypto(format!("key is missing the {name} parameter")))?;
    jwk.set_parameter(name, Some(serde_json::Value::String(value.clone())))
        .map_err(|e| PixError::Crypto(e.to_string()))
}

/// The declared parameters as an openssl key, for comparison with the
/// leaf certificate's public key.
fn declared_public_key(key: &Jwk) -> Result<PKey<Public>> {
    match key.kty {
        KeyType::RSA => {
            let n = decoded_bignum(&key.n, "n")?;
            let e = decoded_bignum(&key.e, "e")?;
            let rsa = Rsa::from_public_components(n, e)
                .map_err(|e| PixError::Crypto(e.to_string()))?;
            PKey::from_rsa(rsa).map_err(|e| PixError::Crypto(e.to_string()))
        }
        KeyType::EC => {
            let group = EcGroup::from_curve_name(curve_nid(key.crv.as_deref())?)
                .map_err(|e| PixError::Crypto(e.to_string()))?;
            let x = decoded_bignum(&key.x, "x")?;
            let y = decoded_bignum(&key.y, "y")?;
            let ec = EcKey::from_public_key_affine_coordinates(&group, &x, &y)
                .map_err(|e| PixError::Crypto(e.to_string()))?;
            PKey::from_ec_key(ec).map_err(|e| PixError::Crypto(e.to_string()))
        }
    }
}

fn decoded_bignum(value: &Option<String>, name: &str) -> Result<BigNum> {
    let value = value
        .as_ref()
        .ok_or_else(|| PixError::Crypto(format!("key is missing the {name} parameter")))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|_| PixError::Crypto(format!("key parameter {name} is not url-base64")))?;
    BigNum::from_slice(&bytes).map_err(|e| PixError::Crypto(e.to_string()))
}

fn curve_nid(crv: Option<&str>) -> Result<Nid> {
    match crv {
        Some("P-256") => Ok(Nid::X9_62_PRIME256V1),
        Some("P-384") => Ok(Nid::SECP384R1),
        Some("P-521") => Ok(Nid::SECP521R1),
        other => Err(PixError::Crypto(format!(
            "unsupported EC curve {other:?}"
        ))),
    }
}

fn decode_chain(x5c: &[String]) -> Result<Vec<Vec<u8>>> {
    x5c.iter()
        .map(|entry| {
            STANDARD
                .decode(entry)
                .map_err(|_| PixError::InvalidCertEncoding)
        })
        .collect()
}

fn parse_chain(ders: &[Vec<u8>]) -> Result<Vec<X509>> {
    ders.iter()
        .map(|der| X509::from_der(der).map_err(|_| PixError::InvalidCertificateEncoding))
        .collect()
}

/// PKIX path validation over the reversed chain: the last `x5c` entry is
/// the trust anchor, everything before it chains down to the leaf (the
/// first entry). Returns the leaf on success.
fn validate_path(certs: &[X509]) -> Result<&X509> {
    let Some((anchor, chain)) = certs.split_last() else {
        return Err(PixError::X5cMustHaveMoreThanOneCert);
    };
    let Some(leaf) = chain.first() else {
        return Err(PixError::X5cMustHaveMoreThanOneCert);
    };

    let mut builder = X509StoreBuilder::new().map_err(|e| PixError::Crypto(e.to_string()))?;
    builder
        .add_cert(anchor.clone())
        .map_err(|e| PixError::Crypto(e.to_string()))?;
    // The published anchor is trusted as given; it need not be self-signed.
    builder
        .set_flags(X509VerifyFlags::PARTIAL_CHAIN)
        .map_err(|e| PixError::Crypto(e.to_string()))?;
    let store = builder.build();

    let mut untrusted = Stack::new().map_err(|e| PixError::Crypto(e.to_string()))?;
    for cert in &chain[1..] {
        untrusted
            .push(cert.clone())
            .map_err(|e| PixError::Crypto(e.to_string()))?;
    }

    let mut context = X509StoreContext::new().map_err(|e| PixError::Crypto(e.to_string()))?;
    let (valid, verify_result) = context
        .init(&store, leaf, &untrusted, |ctx| {
            let valid = ctx.verify_cert()?;
            Ok((valid, ctx.error()))
        })
        .map_err(|e| PixError::Crypto(e.to_string()))?;

    if !valid {
        return Err(PixError::CertificatePathValidation(
            verify_result.error_string().to_string(),
        ));
    }
    Ok(leaf)
}

/// The `jku` authority must equal the subject CN or one of the SAN
/// dNSName entries, compared verbatim.
fn subject_matches(cert: &X509, authority: &str) -> bool {
    let cn_matches = cert
        .subject_name()
        .entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().as_utf8().ok())
        .map(|cn| cn.to_string() == authority)
        .unwrap_or(false);
    if cn_matches {
        return true;
    }

    cert.subject_alt_names()
        .map(|names| {
            names
                .iter()
                .any(|name| name.dnsname() == Some(authority))
        })
        .unwrap_or(false)
}
