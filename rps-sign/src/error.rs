use thiserror::Error;

/// A field could not be laid out in the signing string.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FormatError {
    #[error("Field {field} is {actual} characters long, more than its width of {width}")]
    Overflow {
        field: &'static str,
        width: usize,
        actual: usize,
    },
    #[error("Field {field} contains non-ASCII characters: {value:?}")]
    NonAscii { field: &'static str, value: String },
    #[error("Payer has both a CPF and a CNPJ")]
    AmbiguousPayer,
}

/// Errors raised while producing an RSA or XML-DSig signature.
#[derive(Error, Debug)]
pub enum SigningError {
    #[error("Failed to load private key: {0}")]
    InvalidKey(#[source] openssl::error::ErrorStack),
    #[error("Failed to load certificate: {0}")]
    InvalidCertificate(#[source] openssl::error::ErrorStack),
    #[error("Only RSA keys are supported, got key type {0:?}")]
    UnsupportedKey(openssl::pkey::Id),
    #[error("Crypto provider failure: {0}")]
    Crypto(#[from] openssl::error::ErrorStack),
    #[error("Document to sign is not well-formed XML: {0}")]
    MalformedXml(String),
    #[error("Signature could not be verified with the certificate's public key")]
    KeyMismatch,
    #[error("Signature element not found or incomplete: missing {0}")]
    MissingSignaturePart(&'static str),
    #[error("Digest of the signed document does not match the reference")]
    DigestMismatch,
    #[error("Failed to decode base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Errors raised while reading the authority's response body.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Response does not contain a <RetornoXML> payload")]
    MissingMarkers,
    #[error("Failed to decode entities in response payload: {0}")]
    Entity(#[from] quick_xml::escape::EscapeError),
    #[error("Response payload is not valid XML: {0}")]
    Xml(#[from] roxmltree::Error),
}

/// Any failure of the signing and parsing pipeline.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}
