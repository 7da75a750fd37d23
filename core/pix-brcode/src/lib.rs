//! # pix-brcode
//!
//! A Rust library for decoding BR Codes (the Brazilian central bank's TLV
//! QR-code payload for PIX) and securely loading the signed payment
//! details behind dynamic codes.
//!
//! ## Overview
//!
//! A BR Code is a CRC-protected TLV string. Static codes carry the payee
//! key (`chave`) inline; dynamic codes carry a PSP URL from which a
//! signed payment document is fetched and verified:
//!
//! ```text
//! Static:  BR Code string → TLV + CRC → BrCode (chave)
//! Dynamic: BR Code string → TLV + CRC → BrCode (url)
//!          → GET url → JWS → header (jku, kid, x5t, alg)
//!          → validated-key store → [GET jku → JWKS → trust pipeline]
//!          → signature verification → PixPayment
//! ```
//!
//! Key technologies:
//! - **TLV + CRC-16/CCITT-FALSE**: the EMV-style wire format of BR Codes
//! - **JWS (RFC 7515)**: compact-serialized signatures over payment data
//! - **JWKS (RFC 7517)**: PSP-published signing keys with `x5c` chains
//! - **X.509 path validation**: every key is bound to a certificate
//!   chain, a SHA-1 thumbprint and the PSP's registered host
//!
//! ## Quick Start
//!
//! ### Decoding a static BR Code
//!
//! ```rust,ignore
//! use pix_brcode::{decode_to, BrCode, BrCodeKind, DecodeOptions};
//!
//! let brcode: BrCode = decode_to(qr_contents, DecodeOptions::default())?;
//!
//! assert_eq!(brcode.kind, BrCodeKind::Static);
//! println!("payee key: {:?}", brcode.merchant_account_information.chave());
//! ```
//!
//! ### Loading a dynamic PIX payment
//!
//! ```rust,ignore
//! use pix_brcode::{decode_to, load_pix, BrCode, DecodeOptions, ReqwestClient};
//!
//! let brcode: BrCode = decode_to(qr_contents, DecodeOptions::default())?;
//! let url = brcode.merchant_account_information.url().expect("dynamic code");
//!
//! let client = ReqwestClient::new();
//! let payment = load_pix(&client, &format!("https://{url}"))?;
//!
//! println!("amount: {}", payment.valor.original);
//! ```
//!
//! ### Warming the key store out of band
//!
//! ```rust,ignore
//! use pix_brcode::{process_keys, Jwks, Schema};
//!
//! let jwks: Jwks = Schema::cast(jwks_json)?;
//! process_keys(&jwks.keys, "https://somepixpsp.br/pix/v2/certs")?;
//! ```
//!
//! ## Security model
//!
//! For a dynamic payment to verify, a single bypassed check would be a
//! security flaw, so every key entering the store must clear all of:
//!
//! - `x5c` chain of at least two certificates, PKIX-validated with the
//!   last entry as trust anchor
//! - SHA-1 thumbprint of the leaf equal to the key's `x5t`
//! - leaf subject CN or SAN dNSName equal to the `jku` authority
//! - declared JWK parameters equal to the leaf's public key
//!
//! and every verification additionally checks the certificate validity
//! window (inclusive, UTC, zero skew) and that the header algorithm
//! matches the key family (EC → `ES*`, RSA → `RS*`/`PS*`). HMAC and
//! `none` algorithms are rejected at header parse time.
//!
//! ## Concurrency
//!
//! All parsers and validators are pure synchronous functions; the only
//! shared state is the validated-key store, a read-mostly concurrent map
//! whose readers take lock-free snapshots. Concurrent cache misses for
//! the same `jku` may duplicate a JWKS fetch; every winner installs a
//! fully validated batch, so the race is benign.
//!
//! ## Features
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `reqwest-client` | ✓ | [`ReqwestClient`], an [`HttpClient`] backed by `reqwest::blocking` |
//!
//! Disable default features to supply your own [`HttpClient`].
//!
//! ## Modules
//!
//! - [`error`]: error types shared by all operations
//! - [`http`]: the HTTP client abstraction
//! - [`keys`]: the validated-key store and its trust pipeline
//! - [`model`]: BR Code, JWS header, JWKS and payment models
//! - [`options`]: decoding options
//! - [`pipeline`]: low-level CRC, TLV and JWS stages

pub mod error;
pub mod http;
pub mod keys;
pub mod loader;
pub mod model;
pub mod options;
pub mod pipeline;

pub use error::{PixError, Result, ValidationError, ValidationErrors};
pub use http::{HttpClient, HttpResponse};
pub use keys::{KeyStore, ValidatedKey};
pub use model::{
    AdditionalDataField, BrCode, BrCodeKind, Calendario, Devedor, InfoAdicional, Jwk, Jwks,
    JwsHeader, KeyType, MerchantAccountInformation, PaymentStatus, PixPayment, Schema,
    UnreservedTemplates, Valor,
};
pub use options::DecodeOptions;

#[cfg(feature = "reqwest-client")]
pub use http::ReqwestClient;

use std::sync::Arc;

/// Decode a BR Code into its named-field mapping.
///
/// The CRC is checked first; the TLV structure is then parsed against the
/// BR Code tag mapping. No schema validation is applied — use
/// [`decode_to`] for a validated [`BrCode`].
///
/// # Arguments
/// * `input` - The raw BR Code contents
/// * `options` - Decoding options (unknown-tag handling)
pub fn decode(
    input: &str,
    options: DecodeOptions,
) -> Result<serde_json::Map<String, serde_json::Value>> {
    pipeline::tlv::decode(input, options)
}

/// Decode a BR Code and cast it through a schema.
///
/// With `T = BrCode` this validates every field and classifies the code
/// as static or dynamic:
///
/// ```rust,ignore
/// let brcode: BrCode = decode_to(qr_contents, DecodeOptions::default())?;
/// ```
pub fn decode_to<T: Schema>(input: &str, options: DecodeOptions) -> Result<T> {
    let fields = pipeline::tlv::decode(input, options)?;
    T::cast(serde_json::Value::Object(fields))
}

/// Fetch, verify and parse a dynamic PIX payment.
///
/// Runs the full protocol against the process-wide key store: fetch the
/// JWS, resolve the signing key (fetching and validating the JWKS on a
/// store miss), check the certificate window and algorithm binding,
/// verify the signature and cast the payload.
pub fn load_pix(client: &impl HttpClient, url: &str) -> Result<PixPayment> {
    loader::load_pix(client, url)
}

/// Validate a JWKS batch and install it in the process-wide key store.
///
/// Exposed for out-of-band warm-up; [`load_pix`] calls this internally on
/// a store miss. The batch is all-or-nothing.
pub fn process_keys(keys: &[Jwk], jku: &str) -> Result<()> {
    keys::process_keys(KeyStore::global(), keys, jku)
}

/// Look up a validated key in the process-wide store by
/// `(jku, x5t, kid)`.
pub fn lookup(header: &JwsHeader) -> Option<Arc<ValidatedKey>> {
    KeyStore::global().lookup(header)
}
