//! Assembly of the SOAP request: render the inner message, sign it and wrap
//! it in the envelope of its operation.
use std::fmt;

use rps_sign::KeyMaterial;

use crate::{
    error::Error,
    templates::{Envelope, Template},
};

/// Web service operations we call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    EnvioRps,
    EnvioLoteRps,
    ConsultaNfe,
}

impl Operation {
    /// Element of the SOAP body carrying the message.
    pub fn request_element(&self) -> &'static str {
        match self {
            Operation::EnvioRps => "EnvioRPSRequest",
            Operation::EnvioLoteRps => "EnvioLoteRPSRequest",
            Operation::ConsultaNfe => "ConsultaNFeRequest",
        }
    }

    pub fn soap_action(&self) -> &'static str {
        match self {
            Operation::EnvioRps => "http://www.prefeitura.sp.gov.br/nfe/ws/envioRPS",
            Operation::EnvioLoteRps => "http://www.prefeitura.sp.gov.br/nfe/ws/envioLoteRPS",
            Operation::ConsultaNfe => "http://www.prefeitura.sp.gov.br/nfe/ws/consultaNFe",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::EnvioRps => write!(f, "EnvioRPS"),
            Operation::EnvioLoteRps => write!(f, "EnvioLoteRPS"),
            Operation::ConsultaNfe => write!(f, "ConsultaNFe"),
        }
    }
}

/// Wrap an already signed message in the SOAP envelope of `operation`. The
/// message is escaped into `MensagemXML`.
pub fn assemble(operation: Operation, signed_message: &str) -> Result<String, Error> {
    Ok(Envelope {
        operation,
        message: signed_message,
    }
    .render()?)
}

/// Render `message`, sign it with `key` and assemble the envelope.
#[tracing::instrument(level = "debug", skip(key, message))]
pub fn build_envelope<T: Template>(
    key: &KeyMaterial,
    message: &T,
    operation: Operation,
) -> Result<String, Error> {
    let message = message.render()?;
    let signed = rps_sign::sign_enveloped(&message, key)?;
    tracing::debug!("Signed message: {}", signed);
    assemble(operation, &signed)
}
