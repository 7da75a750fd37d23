//! The validated BR Code model and its classification rules.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{PixError, Result, ValidationError, ValidationErrors};
use crate::model::{required, Schema};

/// Guidelines accepted in the `gui` field of tag 26.
const PIX_GUIS: [&str; 2] = ["br.gov.bcb.pix", "BR.GOV.BCB.PIX"];

/// A decoded and validated BR Code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrCode {
    /// Tag 00. Always `"01"`.
    pub payload_format_indicator: String,
    /// Tag 01. When present, always `"12"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point_of_initiation_method: Option<String>,
    /// Tag 26. Either a PIX key (static) or a PSP URL (dynamic).
    pub merchant_account_information: MerchantAccountInformation,
    /// Tag 52. Defaults to `"0000"`.
    pub merchant_category_code: String,
    /// Tag 53. Always `"986"` (BRL).
    pub transaction_currency: String,
    /// Tag 54.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_amount: Option<String>,
    /// Tag 58. Always `"BR"`.
    pub country_code: String,
    /// Tag 59.
    pub merchant_name: String,
    /// Tag 60.
    pub merchant_city: String,
    /// Tag 61. Eight characters when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    /// Tag 62.
    pub additional_data_field_template: AdditionalDataField,
    /// Tag 80.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unreserved_templates: Option<UnreservedTemplates>,
    /// Tag 63: the trailing 4 hex characters of the payload.
    pub crc: String,
    /// Derived from the merchant account information after validation.
    #[serde(rename = "type")]
    pub kind: BrCodeKind,
}

/// Tag 26: the PIX merchant account information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MerchantAccountInformation {
    /// A static code carrying the payee key directly.
    Static {
        /// The PIX GUI (`br.gov.bcb.pix`).
        gui: String,
        /// The payee key (1..77 characters).
        chave: String,
        /// Free-form additional information (1..72 characters).
        #[serde(skip_serializing_if = "Option::is_none")]
        info_adicional: Option<String>,
    },
    /// A dynamic code carrying the PSP payload URL.
    Dynamic {
        /// The PIX GUI (`br.gov.bcb.pix`).
        gui: String,
        /// The scheme-less PSP URL (1..77 characters).
        url: String,
    },
}

impl MerchantAccountInformation {
    /// The payee key, when this is a static account.
    pub fn chave(&self) -> Option<&str> {
        match self {
            Self::Static { chave, .. } => Some(chave),
            Self::Dynamic { .. } => None,
        }
    }

    /// The PSP URL, when this is a dynamic account.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Static { .. } => None,
            Self::Dynamic { url, .. } => Some(url),
        }
    }

    /// The GUI carried in tag 26-00.
    pub fn gui(&self) -> &str {
        match self {
            Self::Static { gui, .. } | Self::Dynamic { gui, .. } => gui,
        }
    }
}

/// Tag 62: additional data field template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdditionalDataField {
    /// Tag 62-05 (1..25 characters).
    pub reference_label: String,
}

/// Tag 80: unreserved templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnreservedTemplates {
    /// Tag 80-00.
    pub gui: String,
}

/// How a BR Code is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrCodeKind {
    /// The payload carries the payee key; no network fetch is needed.
    Static,
    /// The payload points at a PSP URL for an immediate payment.
    DynamicPaymentImmediate,
    /// The payload points at a PSP URL for a payment with a due date.
    DynamicPaymentWithDueDate,
}

impl BrCode {
    /// True for the two dynamic variants.
    pub fn is_dynamic(&self) -> bool {
        !matches!(self.kind, BrCodeKind::Static)
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawBrCode {
    payload_format_indicator: Option<String>,
    point_of_initiation_method: Option<String>,
    merchant_account_information: Option<RawAccount>,
    merchant_category_code: Option<String>,
    transaction_currency: Option<String>,
    transaction_amount: Option<String>,
    country_code: Option<String>,
    merchant_name: Option<String>,
    merchant_city: Option<String>,
    postal_code: Option<String>,
    additional_data_field_template: Option<RawAdditionalDataField>,
    unreserved_templates: Option<RawUnreservedTemplates>,
    crc: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAccount {
    gui: Option<String>,
    chave: Option<String>,
    info_adicional: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAdditionalDataField {
    reference_label: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawUnreservedTemplates {
    gui: Option<String>,
}

impl Schema for BrCode {
    fn cast(value: Value) -> Result<Self> {
        let raw: RawBrCode = serde_json::from_value(value).map_err(|e| {
            let mut errors = ValidationErrors::new();
            errors.add("brcode", format!("cannot be cast: {e}"));
            PixError::Validation(ValidationError::Schema(errors))
        })?;

        let mut errors = ValidationErrors::new();

        let payload_format_indicator = required(
            &mut errors,
            "payload_format_indicator",
            raw.payload_format_indicator,
        );
        if let Some(value) = &payload_format_indicator {
            if value != "01" {
                errors.add("payload_format_indicator", "must equal \"01\"");
            }
        }

        if let Some(value) = &raw.point_of_initiation_method {
            if value != "12" {
                errors.add("point_of_initiation_method", "must equal \"12\"");
            }
        }

        let account = match raw.merchant_account_information {
            Some(account) => cast_account(account, &mut errors),
            None => {
                errors.add("merchant_account_information", "is required");
                None
            }
        };

        let merchant_category_code = raw
            .merchant_category_code
            .unwrap_or_else(|| "0000".to_string());
        if merchant_category_code.len() != 4
            || !merchant_category_code.chars().all(|c| c.is_ascii_digit())
        {
            errors.add("merchant_category_code", "must be 4 digits");
        }

        let transaction_currency =
            required(&mut errors, "transaction_currency", raw.transaction_currency);
        if let Some(value) = &transaction_currency {
            if value != "986" {
                errors.add("transaction_currency", "must equal \"986\"");
            }
        }

        if let Some(amount) = &raw.transaction_amount {
            match amount.parse::<Decimal>() {
                Ok(parsed) if parsed.is_sign_negative() => {
                    errors.add("transaction_amount", "must not be negative");
                }
                Ok(_) => {}
                Err(_) => errors.add("transaction_amount", "must be a decimal number"),
            }
        }

        let country_code = required(&mut errors, "country_code", raw.country_code);
        if let Some(value) = &country_code {
            if value != "BR" {
                errors.add("country_code", "must equal \"BR\"");
            }
        }

        let merchant_name = required(&mut errors, "merchant_name", raw.merchant_name);
        let merchant_city = required(&mut errors, "merchant_city", raw.merchant_city);

        if let Some(postal_code) = &raw.postal_code {
            if postal_code.chars().count() != 8 {
                errors.add("postal_code", "length must equal 8");
            }
        }

        let reference_label = match raw.additional_data_field_template {
            Some(template) => {
                let label = required(
                    &mut errors,
                    "additional_data_field_template.reference_label",
                    template.reference_label,
                );
                if let Some(label) = &label {
                    let length = label.chars().count();
                    if !(1..=25).contains(&length) {
                        errors.add(
                            "additional_data_field_template.reference_label",
                            "length must be between 1 and 25",
                        );
                    }
                }
                label
            }
            None => {
                errors.add("additional_data_field_template", "is required");
                None
            }
        };

        let unreserved_templates = match raw.unreserved_templates {
            Some(template) => {
                let gui = required(&mut errors, "unreserved_templates.gui", template.gui);
                gui.map(|gui| UnreservedTemplates { gui })
            }
            None => None,
        };

        let crc = required(&mut errors, "crc", raw.crc);
        if let Some(crc) = &crc {
            if crc.len() != 4 || !crc.chars().all(|c| c.is_ascii_hexdigit()) {
                errors.add("crc", "must be 4 hexadecimal characters");
            }
        }

        match (
            payload_format_indicator,
            account,
            transaction_currency,
            country_code,
            merchant_name,
            merchant_city,
            reference_label,
            crc,
        ) {
            (
                Some(payload_format_indicator),
                Some(account),
                Some(transaction_currency),
                Some(country_code),
                Some(merchant_name),
                Some(merchant_city),
                Some(reference_label),
                Some(crc),
            ) if errors.is_empty() => {
                let kind = classify(&account);
                Ok(BrCode {
                    payload_format_indicator,
                    point_of_initiation_method: raw.point_of_initiation_method,
                    merchant_account_information: account,
                    merchant_category_code,
                    transaction_currency,
                    transaction_amount: raw.transaction_amount,
                    country_code,
                    merchant_name,
                    merchant_city,
                    postal_code: raw.postal_code,
                    additional_data_field_template: AdditionalDataField { reference_label },
                    unreserved_templates,
                    crc,
                    kind,
                })
            }
            _ => Err(PixError::Validation(ValidationError::Schema(errors))),
        }
    }
}

/// Validate tag 26 and settle on the static or dynamic variant.
fn cast_account(
    raw: RawAccount,
    errors: &mut ValidationErrors,
) -> Option<MerchantAccountInformation> {
    let field = "merchant_account_information";

    let gui = required(errors, "merchant_account_information.gui", raw.gui);
    if let Some(gui) = &gui {
        if !PIX_GUIS.contains(&gui.as_str()) {
            errors.add(
                "merchant_account_information.gui",
                "must be the PIX arrangement GUI",
            );
        }
    }

    if let Some(chave) = &raw.chave {
        let length = chave.chars().count();
        if !(1..=77).contains(&length) {
            errors.add(
                "merchant_account_information.chave",
                "length must be between 1 and 77",
            );
        }
    }

    if let Some(url) = &raw.url {
        let length = url.chars().count();
        if !(1..=77).contains(&length) {
            errors.add(
                "merchant_account_information.url",
                "length must be between 1 and 77",
            );
        }
    }

    if let Some(info) = &raw.info_adicional {
        let length = info.chars().count();
        if !(1..=72).contains(&length) {
            errors.add(
                "merchant_account_information.info_adicional",
                "length must be between 1 and 72",
            );
        }
    }

    match (raw.chave, raw.url) {
        (Some(chave), None) => {
            let info_length = raw
                .info_adicional
                .as_deref()
                .map(|info| info.chars().count())
                .unwrap_or(0);
            if chave.chars().count() + info_length > 99 {
                errors.add(
                    field,
                    "combined length of chave and info_adicional must not exceed 99",
                );
            }
            gui.map(|gui| MerchantAccountInformation::Static {
                gui,
                chave,
                info_adicional: raw.info_adicional,
            })
        }
        (None, Some(url)) => {
            if raw.info_adicional.is_some() {
                errors.add(
                    "merchant_account_information.info_adicional",
                    "is not allowed together with url",
                );
            }
            if !has_resource_path(&url) {
                errors.add(
                    "merchant_account_information.url",
                    "must contain a resource path",
                );
            }
            gui.map(|gui| MerchantAccountInformation::Dynamic { gui, url })
        }
        (Some(_), Some(_)) => {
            errors.add(field, "must carry exactly one of chave or url");
            None
        }
        (None, None) => {
            errors.add(field, "must carry exactly one of chave or url");
            None
        }
    }
}

/// A dynamic URL must resolve to at least two non-root path segments when
/// parsed under an `https://` scheme.
fn has_resource_path(url: &str) -> bool {
    let Ok(parsed) = Url::parse(&format!("https://{url}")) else {
        return false;
    };
    parsed
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).count() >= 2)
        .unwrap_or(false)
}

fn classify(account: &MerchantAccountInformation) -> BrCodeKind {
    match account {
        MerchantAccountInformation::Static { .. } => BrCodeKind::Static,
        MerchantAccountInformation::Dynamic { url, .. } => {
            if url.to_lowercase().ends_with("/cobv") {
                BrCodeKind::DynamicPaymentWithDueDate
            } else {
                BrCodeKind::DynamicPaymentImmediate
            }
        }
    }
}
