use once_cell::sync::Lazy;
use openssl::{
    asn1::Asn1Time,
    hash::MessageDigest,
    pkey::{PKey, Private},
    rsa::Rsa,
    x509::{X509NameBuilder, X509},
};
use rps_sign::KeyMaterial;

pub struct Pem {
    pub certificate: String,
    pub private_key: String,
}

fn generate(common_name: &str) -> Pem {
    let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
    let certificate = self_signed(&key, common_name);
    Pem {
        certificate: String::from_utf8(certificate.to_pem().unwrap()).unwrap(),
        private_key: String::from_utf8(key.private_key_to_pem_pkcs8().unwrap()).unwrap(),
    }
}

pub fn self_signed(key: &PKey<Private>, common_name: &str) -> X509 {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", common_name).unwrap();
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
    builder.set_pubkey(key).unwrap();
    builder.sign(key, MessageDigest::sha256()).unwrap();
    builder.build()
}

// Key generation is slow, do it once per test binary.
pub static PROVIDER: Lazy<Pem> = Lazy::new(|| generate("EMPRESA TESTE LTDA:12345678000199"));
pub static OTHER: Lazy<Pem> = Lazy::new(|| generate("OUTRA EMPRESA"));

pub fn key_material() -> KeyMaterial {
    KeyMaterial::from_pem(
        PROVIDER.certificate.as_bytes(),
        PROVIDER.private_key.as_bytes(),
    )
    .unwrap()
}

pub const PEDIDO: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
    "\n",
    r#"<PedidoEnvioRPS xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns="http://www.prefeitura.sp.gov.br/nfe">"#,
    r#"<Cabecalho xmlns="" Versao="1"><CPFCNPJRemetente><CNPJ>12345678000199</CNPJ></CPFCNPJRemetente></Cabecalho>"#,
    r#"<RPS xmlns=""><Assinatura>c2lnbg==</Assinatura>"#,
    r#"<ChaveRPS><InscricaoPrestador>123</InscricaoPrestador><SerieRPS>A</SerieRPS><NumeroRPS>1</NumeroRPS></ChaveRPS>"#,
    r#"<ValorServicos>150.00</ValorServicos>"#,
    r#"<Discriminacao>Servi&#231;os de &lt;consultoria&gt; &amp; suporte</Discriminacao>"#,
    r#"</RPS></PedidoEnvioRPS>"#,
);
