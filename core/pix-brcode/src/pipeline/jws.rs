//! Compact-JWS handling: header peeking and signature verification.
//!
//! A compact JWS is `BASE64URL(header) '.' BASE64URL(payload) '.'
//! BASE64URL(signature)`. The protected header is peeked *without*
//! verification so the signing key can be resolved first; the signature
//! is then checked with a verifier constructed for exactly the header's
//! `alg`, so a header cannot smuggle in a different algorithm than the
//! one the key was resolved for.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use josekit::jws::{
    JwsVerifier, ES256, ES384, ES512, PS256, PS384, PS512, RS256, RS384, RS512,
};
use serde_json::Value;

use crate::error::{PixError, Result};
use crate::model::{JwsHeader, Schema};

/// Decode and validate the protected header of a compact JWS without
/// verifying its signature.
pub fn peek_header(jws: &str) -> Result<JwsHeader> {
    let mut segments = jws.trim().split('.');
    let (Some(header), Some(_payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(PixError::InvalidJws(
            "expected three dot-separated segments".to_string(),
        ));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|_| PixError::InvalidJws("protected header is not url-base64".to_string()))?;
    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|_| PixError::InvalidJws("protected header is not JSON".to_string()))?;
    JwsHeader::cast(value)
}

/// Build a verifier for `alg` over the validated key's declared JWK.
///
/// The verifier's algorithm always equals the header's `alg`; josekit
/// additionally checks that equality during deserialization.
pub fn verifier_for(alg: &str, jwk: &josekit::jwk::Jwk) -> Result<Box<dyn JwsVerifier>> {
    let verifier: Box<dyn JwsVerifier> = match alg {
        "RS256" => Box::new(RS256.verifier_from_jwk(jwk).map_err(jose_error)?),
        "RS384" => Box::new(RS384.verifier_from_jwk(jwk).map_err(jose_error)?),
        "RS512" => Box::new(RS512.verifier_from_jwk(jwk).map_err(jose_error)?),
        "PS256" => Box::new(PS256.verifier_from_jwk(jwk).map_err(jose_error)?),
        "PS384" => Box::new(PS384.verifier_from_jwk(jwk).map_err(jose_error)?),
        "PS512" => Box::new(PS512.verifier_from_jwk(jwk).map_err(jose_error)?),
        "ES256" => Box::new(ES256.verifier_from_jwk(jwk).map_err(jose_error)?),
        "ES384" => Box::new(ES384.verifier_from_jwk(jwk).map_err(jose_error)?),
        "ES512" => Box::new(ES512.verifier_from_jwk(jwk).map_err(jose_error)?),
        _ => return Err(PixError::InvalidTokenSigningAlgorithm),
    };
    Ok(verifier)
}

/// Verify the signature and return the raw payload bytes.
pub fn verify(jws: &str, verifier: &dyn JwsVerifier) -> Result<Vec<u8>> {
    let (payload, _header) = josekit::jws::deserialize_compact(jws.trim(), verifier)
        .map_err(|e| PixError::SignatureInvalid(e.to_string()))?;
    Ok(payload)
}

fn jose_error(e: josekit::JoseError) -> PixError {
    PixError::Crypto(e.to_string())
}
