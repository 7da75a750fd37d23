//! Validated signing-key material: the trust pipeline and the
//! process-wide cache it feeds.
//!
//! Keys enter through [`process_keys`], which runs the full certificate
//! trust pipeline over a JWKS batch and atomically installs the result
//! under its `jku`. Lookups are lock-free snapshots keyed by
//! `(jku, x5t, kid)`.

pub mod store;
pub mod validation;

pub use store::{KeyStore, ValidatedKey};
pub use validation::process_keys;
