//! Delivery of SOAP envelopes to the web service.
use async_trait::async_trait;
use thiserror::Error;

use crate::{credentials::Credentials, envelope::Operation};

/// Failures to get a reply from the web service, as opposed to replies we
/// could not make sense of.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to build HTTPS client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("Request to {endpoint} failed: {source}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Web service replied with status {status}: {body}")]
    Status { status: u16, body: String },
}

#[async_trait]
pub trait Transport {
    /// Send `envelope` and return the body of the reply.
    async fn send(&self, operation: Operation, envelope: String) -> Result<String, TransportError>;
}

/// Transport over HTTPS, authenticating with the provider's certificate.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: &str, credentials: &Credentials) -> Result<Self, TransportError> {
        let identity = credentials.identity().map_err(TransportError::Client)?;
        let client = reqwest::Client::builder()
            .identity(identity)
            .build()
            .map_err(TransportError::Client)?;
        Ok(Self {
            client,
            endpoint: endpoint.to_owned(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[tracing::instrument(level = "info", skip(self, envelope), fields(endpoint = %self.endpoint))]
    async fn send(&self, operation: Operation, envelope: String) -> Result<String, TransportError> {
        let request_failed = |source| TransportError::Request {
            endpoint: self.endpoint.clone(),
            source,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", operation.soap_action())
            .body(envelope)
            .send()
            .await
            .map_err(request_failed)?;

        let status = response.status();
        let body = response.text().await.map_err(request_failed)?;
        tracing::info!(status = status.as_u16(), "Web service replied");
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}
