//! JSON bodies accepted by the API.
use chrono::NaiveDate;
use rps_sign::{FormatError, InvoiceRecord, Tomador};
use serde::{Deserialize, Serialize};

/// Extra data sent back untouched with webhook deliveries.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct Attachments {
    /// When set, the request is answered right away and the result is
    /// POSTed here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Attachments {
    pub fn webhook(&self) -> Option<&str> {
        self.webhook.as_deref().filter(|url| !url.trim().is_empty())
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Endereco {
    pub tipo_logradouro: Option<String>,
    pub logradouro: Option<String>,
    pub numero: Option<String>,
    pub complemento: Option<String>,
    pub bairro: Option<String>,
    pub cidade: Option<String>,
    pub uf: Option<String>,
    pub cep: Option<String>,
}

/// The service payer.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TomadorData {
    pub cpf: Option<String>,
    pub cnpj: Option<String>,
    pub inscricao_municipal: Option<String>,
    pub razao_social: Option<String>,
    pub endereco: Option<Endereco>,
    pub email: Option<String>,
}

fn tipo_rps() -> String {
    "RPS".to_owned()
}

/// One RPS as sent by API callers.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rps {
    pub serie_rps: String,
    pub numero_rps: String,
    #[serde(default = "tipo_rps")]
    pub tipo_rps: String,
    pub data_emissao: NaiveDate,
    pub tributacao_rps: String,
    pub status_rps: String,
    #[serde(default)]
    pub iss_retido: bool,
    pub valor_servicos: String,
    pub valor_deducoes: String,
    pub codigo_servico: String,
    pub aliquota_servicos: Option<String>,
    #[serde(default)]
    pub tomador: TomadorData,
    #[serde(default)]
    pub discriminacao: String,
}

impl Rps {
    pub fn payer(&self) -> Result<Tomador, FormatError> {
        Tomador::from_ids(self.tomador.cpf.as_deref(), self.tomador.cnpj.as_deref())
    }

    /// The signed part of this RPS, for the provider registered as
    /// `registration`.
    pub fn record(&self, registration: &str) -> Result<InvoiceRecord, FormatError> {
        Ok(InvoiceRecord {
            registration: registration.to_owned(),
            series: self.serie_rps.clone(),
            number: self.numero_rps.clone(),
            issued_on: self.data_emissao,
            taxation: self.tributacao_rps.clone(),
            status: self.status_rps.clone(),
            iss_withheld: self.iss_retido,
            services_value: self.valor_servicos.clone(),
            deductions_value: self.valor_deducoes.clone(),
            service_code: self.codigo_servico.clone(),
            payer: self.payer()?,
        })
    }
}

/// Body of `/api/EnvioRPS`.
#[derive(Deserialize, Debug, Clone)]
pub struct EnvioRpsRequest {
    #[serde(flatten)]
    pub rps: Rps,
    pub attachments: Option<Attachments>,
}

/// Body of `/api/EnvioLoteRPS`.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EnvioLoteRpsRequest {
    /// Whether the authority should reject the whole batch if one RPS is
    /// invalid.
    #[serde(default = "transacao")]
    pub transacao: bool,
    pub dt_inicio: NaiveDate,
    pub dt_fim: NaiveDate,
    pub valor_total_servicos: String,
    pub valor_total_deducoes: String,
    pub rps: Vec<Rps>,
    pub attachments: Option<Attachments>,
}

fn transacao() -> bool {
    true
}

/// Body of `/api/ConsultaNFe`. Looks up either by NFS-e number or by the RPS
/// that generated it.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ConsultaNfeRequest {
    #[serde(rename = "numeroNFe")]
    pub numero_nfe: Option<String>,
    pub codigo_verificacao: Option<String>,
    pub serie_rps: Option<String>,
    pub numero_rps: Option<String>,
    pub attachments: Option<Attachments>,
}
