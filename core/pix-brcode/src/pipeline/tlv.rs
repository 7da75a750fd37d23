//! TLV decoder for BR Code payloads.
//!
//! A BR Code is a sequence of `TT LL VVVV…` records over printable
//! characters: a 2-digit decimal tag, a 2-digit decimal length and exactly
//! `LL` characters of value. Tags `26`, `62` and `80` contain nested TLV
//! sequences of their own. Decoding produces a [`serde_json::Map`] keyed
//! by the canonical field names of the BR Code tag mapping, preserving the
//! order in which records appear.
//!
//! The trailing CRC is checked before any structural parsing; a payload
//! whose last four characters do not match the CRC-16/CCITT-FALSE of
//! everything before them fails fast with [`PixError::InvalidCrc`].

use serde_json::{Map, Value};

use crate::error::{PixError, Result, ValidationError};
use crate::options::DecodeOptions;
use crate::pipeline::crc;

/// Child tag mapping of `26` (merchant account information).
const MERCHANT_ACCOUNT_INFORMATION: &[(&str, &str)] = &[
    ("00", "gui"),
    ("01", "chave"),
    ("02", "info_adicional"),
    ("25", "url"),
];

/// Child tag mapping of `62` (additional data field template).
const ADDITIONAL_DATA_FIELD_TEMPLATE: &[(&str, &str)] = &[("05", "reference_label")];

/// Child tag mapping of `80` (unreserved templates).
const UNRESERVED_TEMPLATES: &[(&str, &str)] = &[("00", "gui")];

/// What a top-level tag decodes into.
enum TagKind {
    /// A plain string value.
    Scalar(&'static str),
    /// A nested TLV sequence with its own child tag mapping.
    Template(&'static str, &'static [(&'static str, &'static str)]),
}

fn top_level(tag: &str) -> Option<TagKind> {
    match tag {
        "00" => Some(TagKind::Scalar("payload_format_indicator")),
        "01" => Some(TagKind::Scalar("point_of_initiation_method")),
        "26" => Some(TagKind::Template(
            "merchant_account_information",
            MERCHANT_ACCOUNT_INFORMATION,
        )),
        "52" => Some(TagKind::Scalar("merchant_category_code")),
        "53" => Some(TagKind::Scalar("transaction_currency")),
        "54" => Some(TagKind::Scalar("transaction_amount")),
        "58" => Some(TagKind::Scalar("country_code")),
        "59" => Some(TagKind::Scalar("merchant_name")),
        "60" => Some(TagKind::Scalar("merchant_city")),
        "61" => Some(TagKind::Scalar("postal_code")),
        "62" => Some(TagKind::Template(
            "additional_data_field_template",
            ADDITIONAL_DATA_FIELD_TEMPLATE,
        )),
        "63" => Some(TagKind::Scalar("crc")),
        "80" => Some(TagKind::Template(
            "unreserved_templates",
            UNRESERVED_TEMPLATES,
        )),
        _ => None,
    }
}

/// Character-exact cursor over the payload.
///
/// Record lengths count characters, not bytes, so slicing goes through
/// `char_indices` to stay on UTF-8 boundaries for any input.
struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self { rest: input }
    }

    fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }

    /// Take exactly `n` characters, or `None` if fewer remain.
    fn take(&mut self, n: usize) -> Option<&'a str> {
        if n == 0 {
            return Some("");
        }
        let end = match self.rest.char_indices().nth(n) {
            Some((byte_offset, _)) => byte_offset,
            None => {
                if self.rest.chars().count() == n {
                    self.rest.len()
                } else {
                    return None;
                }
            }
        };
        let (head, tail) = self.rest.split_at(end);
        self.rest = tail;
        Some(head)
    }
}

/// Decode a complete BR Code payload into its named-field mapping.
///
/// The CRC is verified first; the structural parse only runs on payloads
/// whose trailing four characters check out. Unknown tags fail with
/// `{validation, unknown_key}` unless `options.strict_validation` is set,
/// in which case they are silently dropped.
pub fn decode(input: &str, options: DecodeOptions) -> Result<Map<String, Value>> {
    if !crc::verify(input) {
        return Err(PixError::InvalidCrc);
    }
    let mut cursor = Cursor::new(input);
    decode_sequence(&mut cursor, None, options.strict_validation)
}

/// Decode one TLV sequence. `children` selects a template's child mapping;
/// `None` means the top-level mapping.
fn decode_sequence(
    cursor: &mut Cursor<'_>,
    children: Option<&[(&str, &str)]>,
    strict: bool,
) -> Result<Map<String, Value>> {
    let mut fields = Map::new();

    while !cursor.is_empty() {
        let tag = cursor
            .take(2)
            .ok_or(ValidationError::InvalidTagLengthValue)?;
        let size = cursor
            .take(2)
            .ok_or(ValidationError::InvalidTagLengthValue)?;
        let size: usize = size
            .parse()
            .map_err(|_| ValidationError::SizeNotAnInteger)?;
        let value = cursor
            .take(size)
            .ok_or(ValidationError::InvalidTagLengthValue)?;

        match children {
            Some(mapping) => {
                match mapping.iter().find(|(t, _)| *t == tag) {
                    Some((_, name)) => {
                        fields.insert((*name).to_string(), Value::String(value.to_string()));
                    }
                    None if strict => {}
                    None => {
                        return Err(ValidationError::UnknownKey(tag.to_string()).into());
                    }
                }
            }
            None => match top_level(tag) {
                Some(TagKind::Scalar(name)) => {
                    fields.insert(name.to_string(), Value::String(value.to_string()));
                }
                Some(TagKind::Template(name, mapping)) => {
                    let mut nested = Cursor::new(value);
                    let object = decode_sequence(&mut nested, Some(mapping), strict)?;
                    fields.insert(name.to_string(), Value::Object(object));
                }
                None if strict => {}
                None => {
                    return Err(ValidationError::UnknownKey(tag.to_string()).into());
                }
            },
        }
    }

    Ok(fields)
}

/// Re-encode a decoded mapping back into TLV text.
///
/// Field order follows the mapping's insertion order, so encoding the
/// result of [`decode`] reproduces the original payload byte for byte
/// (including the CRC field, which is emitted as-is rather than
/// recomputed).
pub fn encode(fields: &Map<String, Value>) -> String {
    let mut out = String::new();
    for (name, value) in fields {
        let Some(tag) = tag_for(name) else { continue };
        match value {
            Value::String(s) => push_record(&mut out, tag, s),
            Value::Object(children) => {
                let mut nested = String::new();
                for (child_name, child_value) in children {
                    if let (Some(child_tag), Value::String(s)) =
                        (child_tag_for(name, child_name), child_value)
                    {
                        push_record(&mut nested, child_tag, s);
                    }
                }
                push_record(&mut out, tag, &nested);
            }
            _ => {}
        }
    }
    out
}

fn push_record(out: &mut String, tag: &str, value: &str) {
    out.push_str(tag);
    out.push_str(&format!("{:02}", value.chars().count()));
    out.push_str(value);
}

fn tag_for(name: &str) -> Option<&'static str> {
    let tag = match name {
        "payload_format_indicator" => "00",
        "point_of_initiation_method" => "01",
        "merchant_account_information" => "26",
        "merchant_category_code" => "52",
        "transaction_currency" => "53",
        "transaction_amount" => "54",
        "country_code" => "58",
        "merchant_name" => "59",
        "merchant_city" => "60",
        "postal_code" => "61",
        "additional_data_field_template" => "62",
        "crc" => "63",
        "unreserved_templates" => "80",
        _ => return None,
    };
    Some(tag)
}

fn child_tag_for(template: &str, name: &str) -> Option<&'static str> {
    let mapping = match template {
        "merchant_account_information" => MERCHANT_ACCOUNT_INFORMATION,
        "additional_data_field_template" => ADDITIONAL_DATA_FIELD_TEMPLATE,
        "unreserved_templates" => UNRESERVED_TEMPLATES,
        _ => return None,
    };
    mapping.iter().find(|(_, n)| *n == name).map(|(t, _)| *t)
}
