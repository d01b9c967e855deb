//! Certificate and private key of the provider, read from disk once at
//! start-up.
use std::{fmt, path::Path};

use rps_sign::{KeyMaterial, SigningError};

use crate::error::Error;

pub struct Credentials {
    key: KeyMaterial,
    certificate_pem: Vec<u8>,
    // The TLS client identity wants PKCS#8, whatever the file had.
    private_key_pkcs8: Vec<u8>,
}

impl Credentials {
    pub fn from_pem(certificate_pem: Vec<u8>, private_key_pem: &[u8]) -> Result<Self, Error> {
        let key = KeyMaterial::from_pem(&certificate_pem, private_key_pem)?;
        let private_key_pkcs8 = key
            .private_key()
            .private_key_to_pem_pkcs8()
            .map_err(SigningError::from)?;
        Ok(Self {
            key,
            certificate_pem,
            private_key_pkcs8,
        })
    }

    #[tracing::instrument(level = "info")]
    pub async fn load(certificate_path: &Path, private_key_path: &Path) -> Result<Self, Error> {
        let certificate_pem = read(certificate_path).await?;
        let private_key_pem = read(private_key_path).await?;
        let credentials = Self::from_pem(certificate_pem, &private_key_pem)?;
        tracing::info!("Loaded {:?}", credentials.key);
        Ok(credentials)
    }

    pub fn key(&self) -> &KeyMaterial {
        &self.key
    }

    pub fn into_key(self) -> KeyMaterial {
        self.key
    }

    /// Client certificate for mutual TLS with the web service.
    pub fn identity(&self) -> Result<reqwest::Identity, reqwest::Error> {
        reqwest::Identity::from_pkcs8_pem(&self.certificate_pem, &self.private_key_pkcs8)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credentials {{ key: {:?} }}", self.key)
    }
}

async fn read(path: &Path) -> Result<Vec<u8>, Error> {
    tokio::fs::read(path).await.map_err(|source| Error::ReadError {
        path: path.to_owned(),
        source,
    })
}
