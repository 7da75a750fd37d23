//! The signed payment document served by a PSP for dynamic BR Codes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PixError, Result, ValidationError, ValidationErrors};
use crate::model::documents;
use crate::model::{required, Schema};

/// Lifecycle of a PIX charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Open and payable.
    Ativa,
    /// Already settled.
    Concluida,
    /// Withdrawn by the receiving user.
    RemovidaPeloUsuarioRecebedor,
    /// Withdrawn by the PSP.
    RemovidaPeloPsp,
}

/// A validated dynamic PIX payment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PixPayment {
    /// Document revision, zero-based.
    pub revisao: u32,
    /// The payee key.
    pub chave: String,
    /// Transaction identifier (26..35 characters).
    pub txid: String,
    /// Charge status.
    pub status: PaymentStatus,
    /// Free-form request to the payer (at most 140 characters).
    #[serde(
        rename = "solicitacaoPagador",
        skip_serializing_if = "Option::is_none"
    )]
    pub solicitacao_pagador: Option<String>,
    /// Creation and presentation timestamps.
    pub calendario: Calendario,
    /// The debtor, when identified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub devedor: Option<Devedor>,
    /// The charged amount.
    pub valor: Valor,
    /// Extra key-value entries shown to the payer.
    #[serde(rename = "infoAdicionais")]
    pub info_adicionais: Vec<InfoAdicional>,
}

/// Charge timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Calendario {
    /// When the charge was created.
    pub criacao: DateTime<Utc>,
    /// When the charge was presented to the payer.
    pub apresentacao: DateTime<Utc>,
    /// Seconds the charge stays payable after creation.
    pub expiracao: i64,
}

/// The debtor named on the charge. Exactly one of `cpf` or `cnpj` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Devedor {
    /// Debtor name.
    pub nome: String,
    /// Individual taxpayer ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,
    /// Corporate taxpayer ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cnpj: Option<String>,
}

/// The charged amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Valor {
    /// Original amount; strictly positive.
    pub original: Decimal,
}

/// One extra key-value entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoAdicional {
    /// Entry label.
    pub nome: String,
    /// Entry content.
    pub valor: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawPayment {
    revisao: Option<i64>,
    chave: Option<String>,
    txid: Option<String>,
    status: Option<String>,
    #[serde(rename = "solicitacaoPagador")]
    solicitacao_pagador: Option<String>,
    calendario: Option<RawCalendario>,
    devedor: Option<RawDevedor>,
    valor: Option<RawValor>,
    // Kept dynamic: some PSPs emit an explicit `null` here, which is
    // coerced to an empty list.
    #[serde(rename = "infoAdicionais")]
    info_adicionais: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCalendario {
    criacao: Option<String>,
    apresentacao: Option<String>,
    expiracao: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDevedor {
    nome: Option<String>,
    cpf: Option<String>,
    cnpj: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawValor {
    original: Option<String>,
}

impl Schema for PixPayment {
    fn cast(value: Value) -> Result<Self> {
        let raw: RawPayment = serde_json::from_value(value).map_err(|e| {
            let mut errors = ValidationErrors::new();
            errors.add("payment", format!("cannot be cast: {e}"));
            PixError::Validation(ValidationError::Schema(errors))
        })?;

        let mut errors = ValidationErrors::new();

        let revisao = match raw.revisao {
            Some(revisao) if revisao >= 0 => match u32::try_from(revisao) {
                Ok(revisao) => Some(revisao),
                Err(_) => {
                    errors.add("revisao", "is out of range");
                    None
                }
            },
            Some(_) => {
                errors.add("revisao", "must be greater than or equal to 0");
                None
            }
            None => {
                errors.add("revisao", "is required");
                None
            }
        };

        let chave = required(&mut errors, "chave", raw.chave);

        let txid = required(&mut errors, "txid", raw.txid);
        if let Some(txid) = &txid {
            let length = txid.chars().count();
            if !(26..=35).contains(&length) {
                errors.add("txid", "length must be between 26 and 35");
            }
        }

        let status = match raw.status.as_deref() {
            Some("ATIVA") => Some(PaymentStatus::Ativa),
            Some("CONCLUIDA") => Some(PaymentStatus::Concluida),
            Some("REMOVIDA_PELO_USUARIO_RECEBEDOR") => {
                Some(PaymentStatus::RemovidaPeloUsuarioRecebedor)
            }
            Some("REMOVIDA_PELO_PSP") => Some(PaymentStatus::RemovidaPeloPsp),
            Some(_) => {
                errors.add("status", "is not a known status");
                None
            }
            None => {
                errors.add("status", "is required");
                None
            }
        };

        if let Some(text) = &raw.solicitacao_pagador {
            if text.chars().count() > 140 {
                errors.add("solicitacaoPagador", "length must be at most 140");
            }
        }

        let calendario = match raw.calendario {
            Some(calendario) => cast_calendario(calendario, &mut errors),
            None => {
                errors.add("calendario", "is required");
                None
            }
        };

        let devedor = match raw.devedor {
            Some(devedor) => cast_devedor(devedor, &mut errors),
            None => None,
        };

        let valor = match raw.valor {
            Some(valor) => cast_valor(valor, &mut errors),
            None => {
                errors.add("valor", "is required");
                None
            }
        };

        let info_adicionais = cast_info_adicionais(raw.info_adicionais, &mut errors);

        match (revisao, chave, txid, status, calendario, valor) {
            (Some(revisao), Some(chave), Some(txid), Some(status), Some(calendario), Some(valor))
                if errors.is_empty() =>
            {
                Ok(PixPayment {
                    revisao,
                    chave,
                    txid,
                    status,
                    solicitacao_pagador: raw.solicitacao_pagador,
                    calendario,
                    devedor,
                    valor,
                    info_adicionais,
                })
            }
            _ => Err(PixError::Validation(ValidationError::Schema(errors))),
        }
    }
}

fn cast_calendario(raw: RawCalendario, errors: &mut ValidationErrors) -> Option<Calendario> {
    let criacao = cast_timestamp("calendario.criacao", raw.criacao, errors);
    let apresentacao = cast_timestamp("calendario.apresentacao", raw.apresentacao, errors);
    let expiracao = raw.expiracao.unwrap_or(86_400);

    match (criacao, apresentacao) {
        (Some(criacao), Some(apresentacao)) => Some(Calendario {
            criacao,
            apresentacao,
            expiracao,
        }),
        _ => None,
    }
}

fn cast_timestamp(
    field: &str,
    value: Option<String>,
    errors: &mut ValidationErrors,
) -> Option<DateTime<Utc>> {
    match value {
        Some(text) => match DateTime::parse_from_rfc3339(&text) {
            Ok(parsed) => Some(parsed.with_timezone(&Utc)),
            Err(_) => {
                errors.add(field, "is not a valid RFC 3339 timestamp");
                None
            }
        },
        None => {
            errors.add(field, "is required");
            None
        }
    }
}

/// The field name selects the check-digit algorithm: a value under `cpf`
/// is never re-interpreted as a CNPJ by its length, and vice versa.
fn cast_devedor(raw: RawDevedor, errors: &mut ValidationErrors) -> Option<Devedor> {
    let nome = required(errors, "devedor.nome", raw.nome);

    match (&raw.cpf, &raw.cnpj) {
        (Some(cpf), None) => {
            if !documents::valid_cpf(cpf) {
                errors.add("devedor.cpf", "is not a valid CPF");
            }
        }
        (None, Some(cnpj)) => {
            if !documents::valid_cnpj(cnpj) {
                errors.add("devedor.cnpj", "is not a valid CNPJ");
            }
        }
        _ => {
            errors.add("devedor", "must carry exactly one of cpf or cnpj");
        }
    }

    nome.map(|nome| Devedor {
        nome,
        cpf: raw.cpf,
        cnpj: raw.cnpj,
    })
}

fn cast_valor(raw: RawValor, errors: &mut ValidationErrors) -> Option<Valor> {
    match required(errors, "valor.original", raw.original) {
        Some(text) => match text.parse::<Decimal>() {
            Ok(original) if original > Decimal::ZERO => Some(Valor { original }),
            Ok(_) => {
                errors.add("valor.original", "must be greater than 0");
                None
            }
            Err(_) => {
                errors.add("valor.original", "must be a decimal number");
                None
            }
        },
        None => None,
    }
}

/// A missing or explicitly `null` list is coerced to empty.
fn cast_info_adicionais(value: Option<Value>, errors: &mut ValidationErrors) -> Vec<InfoAdicional> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(entries)) => {
            let mut infos = Vec::with_capacity(entries.len());
            for (index, entry) in entries.into_iter().enumerate() {
                match serde_json::from_value::<InfoAdicional>(entry) {
                    Ok(info) => infos.push(info),
                    Err(_) => errors.add(
                        format!("infoAdicionais[{index}]"),
                        "must carry nome and valor",
                    ),
                }
            }
            infos
        }
        Some(_) => {
            errors.add("infoAdicionais", "must be a list");
            Vec::new()
        }
    }
}
