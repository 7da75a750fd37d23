//! Mechanical decoding stages: CRC, TLV and compact-JWS handling.

pub mod crc;
pub mod jws;
pub mod tlv;
