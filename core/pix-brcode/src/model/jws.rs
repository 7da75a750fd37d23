//! The protected JWS header carried by dynamic PIX payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{PixError, Result, ValidationError, ValidationErrors};
use crate::model::{required, Schema};

/// Algorithms that are never acceptable for PSP-signed payloads.
///
/// `none` disables signing altogether and the HMAC family would let the
/// verifier's "public" key forge signatures.
const REJECTED_ALGORITHMS: [&str; 4] = ["none", "HS256", "HS384", "HS512"];

/// A validated protected header of a compact JWS.
///
/// `jku` is normalized: a header without a scheme gets `https://`
/// prepended before the scheme check, so the stored value always parses
/// as an `https` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsHeader {
    /// URL of the JWKS holding the signing key.
    pub jku: String,
    /// Key identifier within the JWKS.
    pub kid: String,
    /// URL-base64 SHA-1 thumbprint of the signing certificate.
    pub x5t: String,
    /// Signature algorithm (one of the five-character JWS names).
    pub alg: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawHeader {
    jku: Option<String>,
    kid: Option<String>,
    x5t: Option<String>,
    alg: Option<String>,
}

impl Schema for JwsHeader {
    fn cast(value: Value) -> Result<Self> {
        let raw: RawHeader = serde_json::from_value(value).map_err(|e| {
            let mut errors = ValidationErrors::new();
            errors.add("header", format!("cannot be cast: {e}"));
            PixError::Validation(ValidationError::Schema(errors))
        })?;

        let mut errors = ValidationErrors::new();

        let jku = required(&mut errors, "jku", raw.jku).and_then(|jku| {
            let normalized = normalize_jku(&jku);
            match Url::parse(&normalized) {
                Ok(parsed) if parsed.scheme() == "https" => Some(normalized),
                Ok(_) => {
                    errors.add("jku", "scheme must be https");
                    None
                }
                Err(_) => {
                    errors.add("jku", "is not a valid URI");
                    None
                }
            }
        });

        let kid = required(&mut errors, "kid", raw.kid);
        let x5t = required(&mut errors, "x5t", raw.x5t);

        let alg = required(&mut errors, "alg", raw.alg);
        if let Some(alg) = &alg {
            if alg.len() != 5 {
                errors.add("alg", "length must equal 5");
            }
            if REJECTED_ALGORITHMS.contains(&alg.as_str()) {
                errors.add("alg", "is not an accepted JWS algorithm");
            }
        }

        match (jku, kid, x5t, alg) {
            (Some(jku), Some(kid), Some(x5t), Some(alg)) if errors.is_empty() => Ok(JwsHeader {
                jku,
                kid,
                x5t,
                alg,
            }),
            _ => Err(PixError::Validation(ValidationError::Schema(errors))),
        }
    }
}

/// Prepend `https://` when the header value carries no scheme.
fn normalize_jku(jku: &str) -> String {
    if jku.contains("://") {
        jku.to_string()
    } else {
        format!("https://{jku}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn header_value() -> Value {
        json!({
            "jku": "https://somepixpsp.br/pix/v2/certs",
            "kid": "key-1",
            "x5t": "dGh1bWI",
            "alg": "RS256"
        })
    }

    #[test]
    fn casts_a_valid_header() {
        let header = JwsHeader::cast(header_value()).unwrap();
        assert_eq!(header.jku, "https://somepixpsp.br/pix/v2/certs");
        assert_eq!(header.alg, "RS256");
    }

    #[test]
    fn prepends_https_to_schemeless_jku() {
        let mut value = header_value();
        value["jku"] = json!("somepixpsp.br/pix/v2/certs");
        let header = JwsHeader::cast(value).unwrap();
        assert_eq!(header.jku, "https://somepixpsp.br/pix/v2/certs");
    }

    #[test]
    fn rejects_non_https_scheme() {
        let mut value = header_value();
        value["jku"] = json!("http://somepixpsp.br/pix/v2/certs");
        let err = JwsHeader::cast(value).unwrap_err();
        let PixError::Validation(ValidationError::Schema(errors)) = err else {
            panic!("expected schema errors");
        };
        assert!(errors.get("jku").is_some());
    }

    #[test]
    fn rejects_hmac_and_none_algorithms() {
        for alg in ["none", "HS256", "HS384", "HS512"] {
            let mut value = header_value();
            value["alg"] = json!(alg);
            assert!(JwsHeader::cast(value).is_err(), "alg {alg} must be rejected");
        }
    }

    #[test]
    fn rejects_algorithms_of_wrong_length() {
        let mut value = header_value();
        value["alg"] = json!("RSA-OAEP");
        assert!(JwsHeader::cast(value).is_err());
    }

    #[test]
    fn missing_fields_are_all_reported() {
        let err = JwsHeader::cast(json!({})).unwrap_err();
        let PixError::Validation(ValidationError::Schema(errors)) = err else {
            panic!("expected schema errors");
        };
        for field in ["jku", "kid", "x5t", "alg"] {
            assert!(errors.get(field).is_some(), "{field} should be reported");
        }
    }
}
