//! Templates of the messages sent to the web service.
pub use askama::Template;
use chrono::NaiveDate;
use rps_sign::{KeyMaterial, Tomador};

use crate::{envelope::Operation, error::Error, request::Rps};

mod filters {
    /// Keep only the digits, for tax ids typed with punctuation.
    pub fn digits<T: std::fmt::Display>(s: T) -> askama::Result<String> {
        Ok(rps_sign::format::digits(&s.to_string()))
    }
}

/// An RPS with its `<Assinatura>` computed.
#[derive(Debug)]
pub struct SignedRps<'a> {
    pub data: &'a Rps,
    pub registration: &'a str,
    pub payer: Tomador,
    pub signature: String,
}

impl<'a> SignedRps<'a> {
    #[tracing::instrument(level = "debug", skip(key, data), fields(serie = %data.serie_rps, numero = %data.numero_rps))]
    pub fn sign(key: &KeyMaterial, registration: &'a str, data: &'a Rps) -> Result<Self, Error> {
        let record = data.record(registration)?;
        let signature = rps_sign::sign_record(key, &record)?;
        Ok(Self {
            data,
            registration,
            payer: record.payer,
            signature,
        })
    }
}

/// `PedidoEnvioRPS`: a single RPS.
#[derive(Template)]
#[template(path = "envio_rps.xml")]
pub struct EnvioRps<'a> {
    pub cnpj_remetente: &'a str,
    pub rps: SignedRps<'a>,
}

/// `PedidoEnvioLoteRPS`: a batch of RPS.
#[derive(Template)]
#[template(path = "envio_lote_rps.xml")]
pub struct EnvioLoteRps<'a> {
    pub cnpj_remetente: &'a str,
    pub transacao: bool,
    pub dt_inicio: NaiveDate,
    pub dt_fim: NaiveDate,
    pub valor_total_servicos: &'a str,
    pub valor_total_deducoes: &'a str,
    pub rps_list: Vec<SignedRps<'a>>,
}

/// Which NFS-e a `PedidoConsultaNFe` is about.
#[derive(Debug, Clone, PartialEq)]
pub enum Chave<'a> {
    /// NFS-e number and optional verification code.
    Nfe(&'a str, Option<&'a str>),
    /// Series (optional) and number of the RPS it was issued for.
    Rps(Option<&'a str>, &'a str),
}

/// `PedidoConsultaNFe`.
#[derive(Template)]
#[template(path = "consulta_nfe.xml")]
pub struct ConsultaNfe<'a> {
    pub cnpj_remetente: &'a str,
    pub inscricao_prestador: &'a str,
    pub chave: Chave<'a>,
}

/// SOAP 1.1 envelope around a signed message.
#[derive(Template)]
#[template(path = "envelope.xml")]
pub struct Envelope<'a> {
    pub operation: Operation,
    pub message: &'a str,
}
