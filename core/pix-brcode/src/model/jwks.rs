//! JWKS (RFC 7517) parsing and per-key parameter validation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PixError, Result, ValidationError, ValidationErrors};
use crate::model::Schema;

/// Every non-HMAC compact JWS algorithm this crate can verify.
pub const SUPPORTED_ALGORITHMS: [&str; 9] = [
    "RS256", "RS384", "RS512", "PS256", "PS384", "PS512", "ES256", "ES384", "ES512",
];

/// Curves acceptable for EC keys, matching the ES256/384/512 algorithms.
pub const SUPPORTED_CURVES: [&str; 3] = ["P-256", "P-384", "P-521"];

/// Key types a PSP may publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyType {
    /// Elliptic-curve key (`crv`/`x`/`y` parameters).
    EC,
    /// RSA key (`n`/`e` parameters).
    RSA,
}

/// A validated JWKS document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Jwks {
    /// At least one validated key.
    pub keys: Vec<Jwk>,
}

/// A single validated JWKS entry.
///
/// `x5c` is kept base64-encoded; the key store decodes and cross-checks
/// the chain when the key is processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type; only `EC` and `RSA` are accepted.
    pub kty: KeyType,
    /// Key identifier.
    pub kid: String,
    /// URL-base64 SHA-1 thumbprint of the leaf certificate.
    pub x5t: String,
    /// Base64 DER certificate chain (leaf first).
    pub x5c: Vec<String>,
    /// Permitted operations; every entry must be `"verify"`.
    pub key_ops: Vec<String>,
    /// Intended use.
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub use_: Option<String>,
    /// Declared algorithm; must be supported when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// SHA-256 thumbprint.
    #[serde(rename = "x5t#S256", skip_serializing_if = "Option::is_none")]
    pub x5t_s256: Option<String>,
    /// Certificate URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x5u: Option<String>,
    /// RSA modulus.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA public exponent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    /// EC curve name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    /// EC x coordinate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    /// EC y coordinate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawJwks {
    keys: Option<Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawJwk {
    kty: Option<String>,
    kid: Option<String>,
    x5t: Option<String>,
    x5c: Option<Vec<String>>,
    key_ops: Option<Vec<String>>,
    #[serde(rename = "use")]
    use_: Option<String>,
    alg: Option<String>,
    #[serde(rename = "x5t#S256")]
    x5t_s256: Option<String>,
    x5u: Option<String>,
    n: Option<String>,
    e: Option<String>,
    crv: Option<String>,
    x: Option<String>,
    y: Option<String>,
}

impl Schema for Jwks {
    fn cast(value: Value) -> Result<Self> {
        let raw: RawJwks = serde_json::from_value(value).map_err(|e| {
            let mut errors = ValidationErrors::new();
            errors.add("jwks", format!("cannot be cast: {e}"));
            PixError::Validation(ValidationError::Schema(errors))
        })?;

        let mut errors = ValidationErrors::new();
        let entries = match raw.keys {
            Some(entries) if !entries.is_empty() => entries,
            Some(_) => {
                errors.add("keys", "must contain at least one key");
                Vec::new()
            }
            None => {
                errors.add("keys", "is required");
                Vec::new()
            }
        };

        let mut keys = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            match cast_key(entry) {
                Ok(key) => keys.push(key),
                Err(key_errors) => errors.merge(&format!("keys[{index}]"), key_errors),
            }
        }

        errors.into_result()?;
        Ok(Jwks { keys })
    }
}

fn cast_key(value: Value) -> std::result::Result<Jwk, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let raw: RawJwk = match serde_json::from_value(value) {
        Ok(raw) => raw,
        Err(e) => {
            errors.add("", format!("cannot be cast: {e}"));
            return Err(errors);
        }
    };

    let kty = match raw.kty.as_deref() {
        Some("EC") => Some(KeyType::EC),
        Some("RSA") => Some(KeyType::RSA),
        Some(_) => {
            errors.add("kty", "must be EC or RSA");
            None
        }
        None => {
            errors.add("kty", "is required");
            None
        }
    };

    let kid = crate::model::required(&mut errors, "kid", raw.kid);
    let x5t = crate::model::required(&mut errors, "x5t", raw.x5t);

    let x5c = match raw.x5c {
        Some(x5c) if !x5c.is_empty() => Some(x5c),
        Some(_) => {
            errors.add("x5c", "must not be empty");
            None
        }
        None => {
            errors.add("x5c", "is required");
            None
        }
    };

    let key_ops = match raw.key_ops {
        Some(ops) => {
            if ops.iter().any(|op| op != "verify") {
                errors.add("key_ops", "may only contain \"verify\"");
            }
            Some(ops)
        }
        None => {
            errors.add("key_ops", "is required");
            None
        }
    };

    if let Some(alg) = &raw.alg {
        if !SUPPORTED_ALGORITHMS.contains(&alg.as_str()) {
            errors.add("alg", "is not a supported JWS algorithm");
        }
    }

    match kty {
        Some(KeyType::EC) => {
            for (field, value) in [("crv", &raw.crv), ("x", &raw.x), ("y", &raw.y)] {
                if value.is_none() {
                    errors.add(field, "is required for EC keys");
                }
            }
            if let Some(crv) = &raw.crv {
                if !SUPPORTED_CURVES.contains(&crv.as_str()) {
                    errors.add("crv", "is not a supported curve");
                }
            }
        }
        Some(KeyType::RSA) => {
            for (field, value) in [("n", &raw.n), ("e", &raw.e)] {
                if value.is_none() {
                    errors.add(field, "is required for RSA keys");
                }
            }
        }
        None => {}
    }

    match (kty, kid, x5t, x5c, key_ops) {
        (Some(kty), Some(kid), Some(x5t), Some(x5c), Some(key_ops)) if errors.is_empty() => {
            Ok(Jwk {
                kty,
                kid,
                x5t,
                x5c,
                key_ops,
                use_: raw.use_,
                alg: raw.alg,
                x5t_s256: raw.x5t_s256,
                x5u: raw.x5u,
                n: raw.n,
                e: raw.e,
                crv: raw.crv,
                x: raw.x,
                y: raw.y,
            })
        }
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rsa_key() -> Value {
        json!({
            "kty": "RSA",
            "kid": "key-1",
            "x5t": "dGh1bWI",
            "x5c": ["bGVhZg", "cm9vdA"],
            "key_ops": ["verify"],
            "n": "AQAB",
            "e": "AQAB"
        })
    }

    fn ec_key() -> Value {
        json!({
            "kty": "EC",
            "kid": "key-2",
            "x5t": "dGh1bWI",
            "x5c": ["bGVhZg", "cm9vdA"],
            "key_ops": ["verify"],
            "crv": "P-256",
            "x": "eA",
            "y": "eQ"
        })
    }

    #[test]
    fn casts_a_valid_jwks() {
        let jwks = Jwks::cast(json!({ "keys": [rsa_key(), ec_key()] })).unwrap();
        assert_eq!(jwks.keys.len(), 2);
        assert_eq!(jwks.keys[0].kty, KeyType::RSA);
        assert_eq!(jwks.keys[1].kty, KeyType::EC);
    }

    #[test]
    fn requires_a_non_empty_keys_array() {
        assert!(Jwks::cast(json!({})).is_err());
        assert!(Jwks::cast(json!({ "keys": [] })).is_err());
    }

    #[test]
    fn rejects_unknown_kty() {
        let mut key = rsa_key();
        key["kty"] = json!("OKP");
        assert!(Jwks::cast(json!({ "keys": [key] })).is_err());
    }

    #[test]
    fn rejects_key_ops_other_than_verify() {
        let mut key = rsa_key();
        key["key_ops"] = json!(["verify", "sign"]);
        let err = Jwks::cast(json!({ "keys": [key] })).unwrap_err();
        let PixError::Validation(ValidationError::Schema(errors)) = err else {
            panic!("expected schema errors");
        };
        assert!(errors.get("keys[0].key_ops").is_some());
    }

    #[test]
    fn ec_key_requires_curve_parameters() {
        let mut key = ec_key();
        key.as_object_mut().unwrap().remove("y");
        let err = Jwks::cast(json!({ "keys": [key] })).unwrap_err();
        let PixError::Validation(ValidationError::Schema(errors)) = err else {
            panic!("expected schema errors");
        };
        assert!(errors.get("keys[0].y").is_some());
    }

    #[test]
    fn rsa_key_requires_modulus_and_exponent() {
        let mut key = rsa_key();
        key.as_object_mut().unwrap().remove("n");
        assert!(Jwks::cast(json!({ "keys": [key] })).is_err());
    }

    #[test]
    fn rejects_unsupported_alg() {
        let mut key = rsa_key();
        key["alg"] = json!("HS256");
        assert!(Jwks::cast(json!({ "keys": [key] })).is_err());
    }

    #[test]
    fn rejects_unsupported_curve() {
        let mut key = ec_key();
        key["crv"] = json!("secp256k1");
        assert!(Jwks::cast(json!({ "keys": [key] })).is_err());
    }

    #[test]
    fn errors_carry_the_key_index() {
        let err = Jwks::cast(json!({ "keys": [rsa_key(), json!({})] })).unwrap_err();
        let PixError::Validation(ValidationError::Schema(errors)) = err else {
            panic!("expected schema errors");
        };
        assert!(errors.get("keys[1].kty").is_some());
    }
}
