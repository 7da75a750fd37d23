//! Error types for BR Code decoding and dynamic PIX verification.
//!
//! All fallible operations in this crate return [`PixError`]. Errors are
//! plain values; nothing in the library panics on malformed input. Schema
//! casts report *every* failing field at once through [`ValidationErrors`]
//! instead of stopping at the first problem.

use std::collections::BTreeMap;
use std::fmt;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PixError>;

/// Boxed transport error produced by an [`HttpClient`](crate::HttpClient)
/// implementation. Passed through unchanged.
pub type TransportError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for all public operations.
#[derive(Debug, thiserror::Error)]
pub enum PixError {
    /// The trailing CRC of the BR Code payload does not match the computed
    /// CRC-16/CCITT-FALSE value.
    #[error("BR Code CRC does not match its payload")]
    InvalidCrc,

    /// A structural or schema validation failure.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Raw error from the supplied HTTP client, passed through.
    #[error("transport error: {0}")]
    Transport(#[source] TransportError),

    /// An HTTP response had a status outside `[200, 300)`.
    #[error("HTTP request returned non-success status {status}")]
    HttpStatusNotSuccess {
        /// The status code returned by the server.
        status: u16,
    },

    /// The fetched body is not a well-formed compact JWS.
    #[error("invalid JWS: {0}")]
    InvalidJws(String),

    /// The fetched JWKS body is not a JSON object.
    #[error("JWKS contents are not a JSON object")]
    InvalidJwksContents,

    /// A JWKS key's `x5c` chain carries fewer than two certificates.
    #[error("x5c must have more than one certificate")]
    X5cMustHaveMoreThanOneCert,

    /// An `x5c` entry is not valid base64.
    #[error("x5c entry is not valid base64")]
    InvalidCertEncoding,

    /// An `x5c` entry does not decode as a DER X.509 certificate.
    #[error("x5c entry is not a DER-encoded X.509 certificate")]
    InvalidCertificateEncoding,

    /// PKIX path validation of the `x5c` chain failed.
    #[error("certificate path validation failed: {0}")]
    CertificatePathValidation(String),

    /// The key's `x5t` does not match the SHA-1 thumbprint of the leaf
    /// certificate.
    #[error("key thumbprint and leaf certificate differ")]
    KeyThumbprintAndLeafCertificateDiffer,

    /// The declared JWK parameters do not match the public key inside the
    /// leaf certificate.
    #[error("key from leaf certificate differs from declared key")]
    KeyFromLeafCertificateDiffer,

    /// Neither the leaf subject CN nor its SAN dNSName equals the `jku`
    /// URI authority.
    #[error("certificate subject and jku URI authority differ")]
    CertificateSubjectAndJkuUriAuthorityDiffer,

    /// After fetching and validating the JWKS, no key matched the JWS
    /// header's `(x5t, kid)`.
    #[error("key not found in jku JWKS")]
    KeyNotFoundInJku,

    /// The signing certificate's validity window has not started yet.
    #[error("certificate is not yet valid")]
    CertificateNotYetValid,

    /// The signing certificate's validity window has ended.
    #[error("certificate is expired")]
    CertificateExpired,

    /// The JWS header algorithm is incompatible with the resolved key type.
    #[error("token signing algorithm is invalid for the resolved key")]
    InvalidTokenSigningAlgorithm,

    /// The JWS signature did not verify against the validated key.
    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),

    /// Unexpected failure inside the crypto backend (openssl / josekit).
    #[error("crypto backend error: {0}")]
    Crypto(String),
}

/// Validation failures, tagged the way the decoder reports them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A TLV record's two-digit length field is not numeric.
    #[error("size is not an integer")]
    SizeNotAnInteger,

    /// A TLV record is truncated: fewer than four characters remain, or
    /// the value is shorter than its declared size.
    #[error("invalid tag-length-value record")]
    InvalidTagLengthValue,

    /// A tag with no entry in the key mapping was found (non-strict mode).
    #[error("unknown key {0:?}")]
    UnknownKey(String),

    /// One or more schema fields failed validation.
    #[error("{0}")]
    Schema(ValidationErrors),
}

/// Accumulated per-field validation messages.
///
/// A schema cast runs every check before failing, so a single error value
/// reports everything wrong with the input. Fields are keyed by their
/// dotted path (`"merchant_account_information.chave"`, `"keys[0].crv"`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    /// Create an empty error set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message against a field path.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Merge another error set under a field prefix.
    pub fn merge(&mut self, prefix: &str, other: ValidationErrors) {
        for (field, messages) in other.errors {
            let key = if field.is_empty() {
                prefix.to_string()
            } else {
                format!("{prefix}.{field}")
            };
            self.errors.entry(key).or_default().extend(messages);
        }
    }

    /// True when no messages have been recorded.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// All messages recorded for a field path, if any.
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.errors.get(field).map(Vec::as_slice)
    }

    /// Iterate over `(field, messages)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.errors.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// `Ok(())` when empty, otherwise a schema validation error.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(PixError::Validation(ValidationError::Schema(self)))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.errors {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_multiple_messages_per_field() {
        let mut errors = ValidationErrors::new();
        errors.add("chave", "is required");
        errors.add("chave", "is too short");
        errors.add("txid", "is invalid");

        assert_eq!(
            errors.get("chave"),
            Some(&["is required".to_string(), "is too short".to_string()][..])
        );
        assert_eq!(errors.iter().count(), 2);
    }

    #[test]
    fn merge_prefixes_nested_fields() {
        let mut inner = ValidationErrors::new();
        inner.add("gui", "is required");

        let mut outer = ValidationErrors::new();
        outer.merge("merchant_account_information", inner);

        assert!(outer.get("merchant_account_information.gui").is_some());
    }

    #[test]
    fn into_result_maps_empty_to_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());

        let mut errors = ValidationErrors::new();
        errors.add("crc", "is invalid");
        let err = errors.into_result().unwrap_err();
        assert!(matches!(
            err,
            PixError::Validation(ValidationError::Schema(_))
        ));
    }

    #[test]
    fn display_joins_fields_in_order() {
        let mut errors = ValidationErrors::new();
        errors.add("b", "second");
        errors.add("a", "first");
        assert_eq!(errors.to_string(), "a: first; b: second");
    }
}
