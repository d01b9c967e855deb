//! The RPS record and the string its signature (`<Assinatura>`) is computed
//! over.
//!
//! The authority rebuilds this string from the submitted XML and checks the
//! signature against it, so every width, filler and position below has to
//! match exactly. A mistake here is not reported locally; the RPS is simply
//! rejected with a signature error.
use std::fmt;

use chrono::NaiveDate;

use crate::{
    error::FormatError,
    format::{self, format_with, Overflow, Width},
};

/// Width of the tax id of the payer, CPFs are left padded to it as well.
const PAYER_ID_WIDTH: usize = 14;

/// Who pays for the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tomador {
    /// Individual, identified by CPF.
    Cpf(String),
    /// Company, identified by CNPJ.
    Cnpj(String),
    /// Foreign or unregistered payer.
    Unidentified,
}

impl Tomador {
    /// Build the payer from the optional ids found in a request. Empty ids
    /// count as absent; giving both is an error.
    pub fn from_ids(cpf: Option<&str>, cnpj: Option<&str>) -> Result<Self, FormatError> {
        let cpf = cpf.filter(|id| !id.trim().is_empty());
        let cnpj = cnpj.filter(|id| !id.trim().is_empty());
        match (cpf, cnpj) {
            (Some(_), Some(_)) => Err(FormatError::AmbiguousPayer),
            (Some(cpf), None) => Ok(Self::Cpf(cpf.to_owned())),
            (None, Some(cnpj)) => Ok(Self::Cnpj(cnpj.to_owned())),
            (None, None) => Ok(Self::Unidentified),
        }
    }

    fn discriminator(&self) -> char {
        match self {
            Self::Cpf(_) => '1',
            Self::Cnpj(_) => '2',
            Self::Unidentified => '3',
        }
    }

    fn id(&self) -> &str {
        match self {
            Self::Cpf(id) | Self::Cnpj(id) => id,
            Self::Unidentified => "",
        }
    }
}

/// One service invoice record (RPS), with the fields covered by its
/// signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceRecord {
    /// Municipal registration of the provider (`InscricaoPrestador`).
    pub registration: String,
    /// `SerieRPS`.
    pub series: String,
    /// `NumeroRPS`.
    pub number: String,
    /// `DataEmissao`.
    pub issued_on: NaiveDate,
    /// `TributacaoRPS`.
    pub taxation: String,
    /// `StatusRPS`.
    pub status: String,
    /// `ISSRetido`.
    pub iss_withheld: bool,
    /// `ValorServicos`, as sent (e.g. `"150.00"`).
    pub services_value: String,
    /// `ValorDeducoes`, as sent.
    pub deductions_value: String,
    /// `CodigoServico`.
    pub service_code: String,
    /// `CPFCNPJTomador`.
    pub payer: Tomador,
}

/// The ASCII payload that gets signed for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningString(String);

impl SigningString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SigningString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build the signing string of `record`, rejecting fields wider than their
/// slot.
pub fn build(record: &InvoiceRecord) -> Result<SigningString, FormatError> {
    build_with(record, Overflow::Reject)
}

/// Build the signing string of `record` with the given overflow policy.
pub fn build_with(
    record: &InvoiceRecord,
    overflow: Overflow,
) -> Result<SigningString, FormatError> {
    let mut out = Layout {
        buf: String::with_capacity(128),
        overflow,
    };

    out.push("registration", &record.registration, false, None)?;
    out.push("series", &record.series, false, Some(Width::right(5, ' ')))?;
    out.push("number", &record.number, false, Some(Width::left(12, '0')))?;
    out.push("issued_on", &format::date(&record.issued_on), true, None)?;
    out.push("taxation", &record.taxation, false, None)?;
    out.push("status", &record.status, false, None)?;
    out.push(
        "iss_withheld",
        if record.iss_withheld { "S" } else { "N" },
        false,
        None,
    )?;
    out.push(
        "services_value",
        &record.services_value,
        true,
        Some(Width::left(15, '0')),
    )?;
    out.push(
        "deductions_value",
        &record.deductions_value,
        true,
        Some(Width::left(15, '0')),
    )?;
    out.push(
        "service_code",
        &record.service_code,
        true,
        Some(Width::left(5, '0')),
    )?;
    out.buf.push(record.payer.discriminator());
    out.push(
        "payer",
        record.payer.id(),
        true,
        Some(Width::left(PAYER_ID_WIDTH, '0')),
    )?;

    tracing::debug!(len = out.buf.len(), "built RPS signing string");
    Ok(SigningString(out.buf))
}

struct Layout {
    buf: String,
    overflow: Overflow,
}

impl Layout {
    fn push(
        &mut self,
        field: &'static str,
        value: &str,
        numeric_only: bool,
        width: Option<Width>,
    ) -> Result<(), FormatError> {
        let formatted = format_with(field, value, numeric_only, width, self.overflow)?;
        if !formatted.is_ascii() {
            return Err(FormatError::NonAscii {
                field,
                value: formatted,
            });
        }
        self.buf.push_str(&formatted);
        Ok(())
    }
}
