use std::path::PathBuf;

use rps_sign::{FormatError, ParseError, SigningError};
use thiserror::Error;

use crate::transport::TransportError;

/// Errors used within the app.
///
/// Anything caused by the content of the request maps to a 400, transport
/// failures are kept apart so callers can tell them from our own failures.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to render template: {0}")]
    TemplateError(#[from] askama::Error),
    #[error("Invalid RPS field: {0}")]
    FormatError(#[from] FormatError),
    #[error("Failed to sign: {0}")]
    SigningError(#[from] SigningError),
    #[error("Failed to parse response: {0}")]
    ParseError(#[from] ParseError),
    #[error("Failed to send request: {0}")]
    TransportError(#[from] TransportError),
    #[error("Missing field {0}")]
    MissingField(&'static str),
    #[error("Failed to read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid settings: {0}")]
    ConfigError(#[from] serde_json::Error),
    #[error("Failed to deliver webhook: {0}")]
    WebhookError(#[source] reqwest::Error),
}

impl From<rps_sign::Error> for Error {
    fn from(e: rps_sign::Error) -> Self {
        match e {
            rps_sign::Error::Format(e) => e.into(),
            rps_sign::Error::Signing(e) => e.into(),
            rps_sign::Error::Parse(e) => e.into(),
        }
    }
}

impl Error {
    /// Error code reported to API callers.
    pub fn code(&self) -> &'static str {
        match self {
            Error::TemplateError(_) => "TemplateError",
            Error::FormatError(_) => "FormatError",
            Error::SigningError(_) => "SigningError",
            Error::ParseError(_) => "ParseError",
            Error::TransportError(_) => "SendingRequestError",
            Error::MissingField(_) => "MissingField",
            Error::ReadError { .. } | Error::ConfigError(_) => "ConfigError",
            Error::WebhookError(_) => "WebhookError",
        }
    }

    /// HTTP status of the reply carrying this error.
    pub fn status(&self) -> u16 {
        match self {
            Error::FormatError(_) | Error::MissingField(_) => 400,
            Error::TransportError(_) => 502,
            _ => 500,
        }
    }
}
