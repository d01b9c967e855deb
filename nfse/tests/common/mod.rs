use std::sync::Mutex;

use async_trait::async_trait;
use nfse::{
    config::Settings,
    envelope::Operation,
    transport::{Transport, TransportError},
    Context,
};
use once_cell::sync::Lazy;
use openssl::{
    asn1::Asn1Time,
    hash::MessageDigest,
    pkey::PKey,
    rsa::Rsa,
    sign::Verifier,
    x509::{X509NameBuilder, X509},
};
use rps_sign::KeyMaterial;

pub struct Pem {
    pub certificate: Vec<u8>,
    pub private_key: Vec<u8>,
}

// Key generation is slow, do it once per test binary.
pub static PEM: Lazy<Pem> = Lazy::new(|| {
    let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", "EMPRESA TESTE LTDA").unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder
        .set_not_before(Asn1Time::days_from_now(0).unwrap().as_ref())
        .unwrap();
    builder
        .set_not_after(Asn1Time::days_from_now(365).unwrap().as_ref())
        .unwrap();
    builder.set_pubkey(&key).unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();

    Pem {
        certificate: builder.build().to_pem().unwrap(),
        private_key: key.private_key_to_pem_pkcs8().unwrap(),
    }
});

pub fn settings() -> Settings {
    Settings {
        cnpj: "12.345.678/0001-99".into(),
        inscricao_municipal: "123".into(),
        cert_path: "unused".into(),
        key_path: "unused".into(),
        endpoint: "http://localhost/unused".into(),
    }
}

/// RSA-SHA1 check of a base64 signature with the test certificate.
pub fn verifies(payload: &[u8], signature_b64: &str) -> bool {
    let certificate = X509::from_pem(&PEM.certificate).unwrap();
    let public_key = certificate.public_key().unwrap();
    let signature = base64_decode(signature_b64);
    let mut verifier = Verifier::new(MessageDigest::sha1(), &public_key).unwrap();
    verifier.update(payload).unwrap();
    verifier.verify(&signature).unwrap()
}

fn base64_decode(b64: &str) -> Vec<u8> {
    openssl::base64::decode_block(b64.trim()).unwrap()
}

/// Transport answering every request with the same canned reply.
pub struct FakeTransport {
    reply: Result<String, u16>,
    sent: Mutex<Vec<(Operation, String)>>,
}

impl FakeTransport {
    pub fn replying(body: &str) -> Self {
        Self {
            reply: Ok(body.to_owned()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            reply: Err(status),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<(Operation, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, operation: Operation, envelope: String) -> Result<String, TransportError> {
        self.sent.lock().unwrap().push((operation, envelope));
        match &self.reply {
            Ok(body) => Ok(body.clone()),
            Err(status) => Err(TransportError::Status {
                status: *status,
                body: "Service Unavailable".into(),
            }),
        }
    }
}

pub fn context(transport: FakeTransport) -> Context<FakeTransport> {
    let key = KeyMaterial::from_pem(&PEM.certificate, &PEM.private_key).unwrap();
    Context::new(settings(), key, transport)
}

/// The signed message inside a SOAP envelope, unescaped.
pub fn message_of(envelope: &str) -> String {
    let doc = roxmltree::Document::parse(envelope).unwrap();
    doc.descendants()
        .find(|n| n.has_tag_name("MensagemXML"))
        .and_then(|n| n.text())
        .unwrap()
        .to_owned()
}

pub const RETORNO_ENVIO_RPS: &str = concat!(
    r#"<?xml version="1.0" encoding="utf-8"?>"#,
    r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body>"#,
    r#"<EnvioRPSResponse xmlns="http://www.prefeitura.sp.gov.br/nfe"><RetornoXML>"#,
    r#"&lt;?xml version="1.0" encoding="UTF-8"?&gt;"#,
    r#"&lt;RetornoEnvioRPS xmlns="http://www.prefeitura.sp.gov.br/nfe"&gt;"#,
    r#"&lt;Cabecalho Versao="1" xmlns=""&gt;&lt;Sucesso&gt;true&lt;/Sucesso&gt;&lt;/Cabecalho&gt;"#,
    r#"&lt;ChaveNFeRPS xmlns=""&gt;&lt;ChaveNFe&gt;&lt;NumeroNFe&gt;42&lt;/NumeroNFe&gt;&lt;/ChaveNFe&gt;&lt;/ChaveNFeRPS&gt;"#,
    r#"&lt;/RetornoEnvioRPS&gt;"#,
    r#"</RetornoXML></EnvioRPSResponse></soap:Body></soap:Envelope>"#,
);
