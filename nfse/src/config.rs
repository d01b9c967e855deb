//! Settings of the provider on whose behalf RPS are submitted.
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Error;

pub const DEFAULT_ENDPOINT: &str = "https://nfe.prefeitura.sp.gov.br/ws/lotenfe.asmx";

/// Environment variable overriding [Settings::endpoint].
pub const ENDPOINT_VAR: &str = "NFSE_ENDPOINT";

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// CNPJ of the sender, used in every `Cabecalho`.
    pub cnpj: String,
    /// Municipal registration of the provider, put in every RPS.
    #[serde(alias = "incricaoMunicipal")]
    pub inscricao_municipal: String,
    #[serde(default = "default_cert_path")]
    pub cert_path: PathBuf,
    #[serde(default = "default_key_path")]
    pub key_path: PathBuf,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

fn default_cert_path() -> PathBuf {
    "ssl/cert.pem".into()
}

fn default_key_path() -> PathBuf {
    "ssl/key.pem".into()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_owned()
}

impl Settings {
    /// Parse settings from JSON, then apply environment overrides.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let mut settings: Settings = serde_json::from_str(json)?;
        if let Ok(endpoint) = std::env::var(ENDPOINT_VAR) {
            tracing::info!("Using endpoint {} from {}", endpoint, ENDPOINT_VAR);
            settings.endpoint = endpoint;
        }
        Ok(settings)
    }

    #[tracing::instrument(level = "info")]
    pub async fn load(path: &Path) -> Result<Self, Error> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| Error::ReadError {
                path: path.to_owned(),
                source,
            })?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let settings =
            Settings::from_json(r#"{"cnpj": "12345678000199", "inscricaoMunicipal": "123"}"#)
                .unwrap();
        assert_eq!(settings.cert_path, PathBuf::from("ssl/cert.pem"));
        assert_eq!(settings.key_path, PathBuf::from("ssl/key.pem"));
        assert_eq!(settings.inscricao_municipal, "123");
    }

    #[test]
    fn test_legacy_registration_key() {
        let settings = Settings::from_json(
            r#"{"cnpj": "1", "incricaoMunicipal": "456", "certPath": "/c.pem", "keyPath": "/k.pem"}"#,
        )
        .unwrap();
        assert_eq!(settings.inscricao_municipal, "456");
        assert_eq!(settings.cert_path, PathBuf::from("/c.pem"));
    }

    #[test]
    fn test_missing_cnpj() {
        let err = Settings::from_json(r#"{"inscricaoMunicipal": "123"}"#).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = Settings::load(Path::new("does/not/exist.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ReadError { .. }));
    }
}
