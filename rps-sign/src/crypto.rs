//! Key material and RSA-SHA1 signatures.
use std::fmt;

use openssl::{
    hash::MessageDigest,
    pkey::{Id, PKey, PKeyRef, Private, Public},
    sign::{Signer, Verifier},
    x509::X509,
};

use crate::{
    error::{Error, SigningError},
    rps::{self, InvoiceRecord},
};

/// Private key and certificate of the provider.
///
/// Loaded once and shared read-only by every signing operation. The
/// [fmt::Debug] impl only shows the certificate subject so the key can't end
/// up in logs.
pub struct KeyMaterial {
    private_key: PKey<Private>,
    certificate: X509,
    certificate_body: String,
}

impl KeyMaterial {
    /// Parse a PEM certificate and a PEM private key (PKCS#1 or PKCS#8).
    pub fn from_pem(certificate_pem: &[u8], private_key_pem: &[u8]) -> Result<Self, SigningError> {
        let certificate =
            X509::from_pem(certificate_pem).map_err(SigningError::InvalidCertificate)?;
        let private_key =
            PKey::private_key_from_pem(private_key_pem).map_err(SigningError::InvalidKey)?;
        let certificate_body = match std::str::from_utf8(certificate_pem)
            .ok()
            .and_then(pem_body)
        {
            Some(body) => body,
            None => base64::encode(certificate.to_der()?),
        };
        Self::new(private_key, certificate, certificate_body)
    }

    /// Build from DER encoded certificate and PKCS#8 private key.
    pub fn from_der(certificate_der: &[u8], private_key_der: &[u8]) -> Result<Self, SigningError> {
        let certificate =
            X509::from_der(certificate_der).map_err(SigningError::InvalidCertificate)?;
        let private_key =
            PKey::private_key_from_der(private_key_der).map_err(SigningError::InvalidKey)?;
        let certificate_body = base64::encode(certificate_der);
        Self::new(private_key, certificate, certificate_body)
    }

    fn new(
        private_key: PKey<Private>,
        certificate: X509,
        certificate_body: String,
    ) -> Result<Self, SigningError> {
        if private_key.id() != Id::RSA {
            return Err(SigningError::UnsupportedKey(private_key.id()));
        }
        Ok(Self {
            private_key,
            certificate,
            certificate_body,
        })
    }

    /// Certificate as embedded in `<X509Certificate>`: base64 DER without PEM
    /// markers or line breaks.
    pub fn certificate_body(&self) -> &str {
        &self.certificate_body
    }

    pub fn private_key(&self) -> &PKeyRef<Private> {
        &self.private_key
    }

    pub fn certificate(&self) -> &X509 {
        &self.certificate
    }

    pub fn public_key(&self) -> Result<PKey<Public>, SigningError> {
        Ok(self.certificate.public_key()?)
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subject: Vec<String> = self
            .certificate
            .subject_name()
            .entries()
            .filter_map(|entry| entry.data().as_utf8().ok().map(|s| s.to_string()))
            .collect();
        write!(f, "KeyMaterial {{ subject: {:?}, key: <redacted> }}", subject)
    }
}

/// Base64 body of the first PEM block in `pem`, with line breaks removed.
pub fn pem_body(pem: &str) -> Option<String> {
    let flat: String = pem.chars().filter(|c| *c != '\r' && *c != '\n').collect();
    // "-----BEGIN X-----" body "-----END X-----"
    let body = flat.split("-----").nth(2)?.trim();
    if body.is_empty() {
        None
    } else {
        Some(body.to_owned())
    }
}

/// RSA-SHA1 (PKCS#1 v1.5) signature of `payload`, base64 encoded.
pub fn sign(key: &KeyMaterial, payload: &[u8]) -> Result<String, SigningError> {
    Ok(base64::encode(sign_raw(key.private_key(), payload)?))
}

pub(crate) fn sign_raw(key: &PKeyRef<Private>, payload: &[u8]) -> Result<Vec<u8>, SigningError> {
    let mut signer = Signer::new(MessageDigest::sha1(), key)?;
    signer.update(payload)?;
    Ok(signer.sign_to_vec()?)
}

/// Check a base64 RSA-SHA1 signature of `payload`.
pub fn verify(
    public_key: &PKeyRef<Public>,
    payload: &[u8],
    signature_b64: &str,
) -> Result<bool, SigningError> {
    let signature = base64::decode(signature_b64.trim())?;
    let mut verifier = Verifier::new(MessageDigest::sha1(), public_key)?;
    verifier.update(payload)?;
    Ok(verifier.verify(&signature)?)
}

/// Signature of one RPS, the value of its `<Assinatura>` element.
#[tracing::instrument(level = "debug", skip(key, record), fields(series = %record.series, number = %record.number))]
pub fn sign_record(key: &KeyMaterial, record: &InvoiceRecord) -> Result<String, Error> {
    let signing = rps::build(record)?;
    tracing::debug!("Signing string: {}", signing);
    Ok(sign(key, signing.as_bytes())?)
}

/// SHA-1 digest, base64 encoded.
pub(crate) fn sha1_base64(data: &[u8]) -> Result<String, SigningError> {
    let digest = openssl::hash::hash(MessageDigest::sha1(), data)?;
    Ok(base64::encode(&*digest))
}
