//! Data structures produced by the decoding and verification pipelines.
//!
//! Every model is cast from dynamic JSON through the [`Schema`] trait:
//! deserialize a permissive raw shape, run every field check, and either
//! return the strongly-typed value or a schema error carrying *all*
//! failing fields.

use serde_json::Value;

use crate::error::Result;

pub mod br_code;
pub mod documents;
pub mod jwks;
pub mod jws;
pub mod payment;

pub use br_code::{
    AdditionalDataField, BrCode, BrCodeKind, MerchantAccountInformation, UnreservedTemplates,
};
pub use jwks::{Jwk, Jwks, KeyType};
pub use jws::JwsHeader;
pub use payment::{Calendario, Devedor, InfoAdicional, PaymentStatus, PixPayment, Valor};

/// Cast a dynamic JSON value into a validated model.
///
/// Implementations accumulate field errors and fail with a single
/// `{validation, errors}` value describing every problem at once.
pub trait Schema: Sized {
    /// Validate `value` and build the model.
    fn cast(value: Value) -> Result<Self>;
}

/// Record an `is required` error when `value` is absent.
pub(crate) fn required<T>(
    errors: &mut crate::error::ValidationErrors,
    field: &str,
    value: Option<T>,
) -> Option<T> {
    if value.is_none() {
        errors.add(field, "is required");
    }
    value
}
