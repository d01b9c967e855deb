//! Enveloped XML-DSig signatures (RSA-SHA1, exclusive c14n) over the whole
//! message, the way the authority's web service expects them.
use openssl::x509::X509;

use crate::{
    c14n::{self, Match, Options},
    crypto::{self, KeyMaterial},
    error::SigningError,
};

pub const DSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";
pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
pub const RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
pub const SHA1: &str = "http://www.w3.org/2000/09/xmldsig#sha1";
pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

const SIGNATURE: Match<'static> = Match {
    namespace: DSIG_NS,
    name: "Signature",
};

const SIGNED_INFO: Match<'static> = Match {
    namespace: DSIG_NS,
    name: "SignedInfo",
};

/// Canonical form of the document as seen through the enveloped-signature
/// and exclusive c14n transforms.
fn referenced_content(xml: &str) -> Result<String, SigningError> {
    c14n::canonicalize_with(
        xml,
        &Options {
            subtree: None,
            exclude: Some(SIGNATURE),
        },
    )
}

fn signed_info(digest: &str) -> String {
    format!(
        concat!(
            r#"<SignedInfo>"#,
            r#"<CanonicalizationMethod Algorithm="{c14n}"/>"#,
            r#"<SignatureMethod Algorithm="{method}"/>"#,
            r#"<Reference URI="">"#,
            r#"<Transforms>"#,
            r#"<Transform Algorithm="{enveloped}"/>"#,
            r#"<Transform Algorithm="{c14n}"/>"#,
            r#"</Transforms>"#,
            r#"<DigestMethod Algorithm="{digest_method}"/>"#,
            r#"<DigestValue>{digest}</DigestValue>"#,
            r#"</Reference>"#,
            r#"</SignedInfo>"#,
        ),
        c14n = EXC_C14N,
        method = RSA_SHA1,
        enveloped = ENVELOPED_SIGNATURE,
        digest_method = SHA1,
        digest = digest,
    )
}

/// Sign `xml` with an enveloped signature appended to its document element.
///
/// The reference has an empty URI, i.e. it covers the whole document minus
/// the signature itself. The certificate goes into `KeyInfo/X509Data`. The
/// produced signature is checked against the certificate's public key, so a
/// certificate that doesn't belong to the key fails here and not at the
/// authority.
#[tracing::instrument(level = "debug", skip(xml, key))]
pub fn sign_enveloped(xml: &str, key: &KeyMaterial) -> Result<String, SigningError> {
    let content = referenced_content(xml)?;
    let digest = crypto::sha1_base64(content.as_bytes())?;

    let signed_info = signed_info(&digest);
    // SignedInfo is canonicalized as it will appear in the document, where
    // it inherits the dsig default namespace from <Signature>.
    let canonical_signed_info = c14n::canonicalize_with(
        &format!(r#"<Signature xmlns="{}">{}</Signature>"#, DSIG_NS, signed_info),
        &Options {
            subtree: Some(SIGNED_INFO),
            exclude: None,
        },
    )?;
    let signature_value = crypto::sign(key, canonical_signed_info.as_bytes())?;

    let public_key = key.public_key()?;
    if !crypto::verify(
        &public_key,
        canonical_signed_info.as_bytes(),
        &signature_value,
    )? {
        tracing::error!("Signature does not verify with the configured certificate");
        return Err(SigningError::KeyMismatch);
    }

    let signature = format!(
        concat!(
            r#"<Signature xmlns="{ns}">"#,
            "{signed_info}",
            "<SignatureValue>{value}</SignatureValue>",
            "<KeyInfo><X509Data><X509Certificate>{certificate}</X509Certificate></X509Data></KeyInfo>",
            "</Signature>",
        ),
        ns = DSIG_NS,
        signed_info = signed_info,
        value = signature_value,
        certificate = key.certificate_body(),
    );
    tracing::debug!(digest = %digest, "Signed document");
    append_to_root(xml, &signature)
}

// Insert `child` right before the closing tag of the document element,
// expanding `<root/>` if needed.
fn append_to_root(xml: &str, child: &str) -> Result<String, SigningError> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| SigningError::MalformedXml(e.to_string()))?;
    let range = doc.root_element().range();
    let element = &xml[range.clone()];

    let mut out = String::with_capacity(xml.len() + child.len() + 16);
    if element.ends_with("/>") {
        let qname_len = element[1..]
            .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
            .unwrap_or(element.len() - 1);
        let qname = &element[1..=qname_len];
        out.push_str(&xml[..range.end - 2]);
        out.push('>');
        out.push_str(child);
        out.push_str("</");
        out.push_str(qname);
        out.push('>');
    } else {
        let closing = element
            .rfind("</")
            .ok_or_else(|| SigningError::MalformedXml("document element is not closed".into()))?;
        out.push_str(&xml[..range.start + closing]);
        out.push_str(child);
        out.push_str(&xml[range.start + closing..range.end]);
    }
    out.push_str(&xml[range.end..]);
    Ok(out)
}

/// Check an enveloped signature made by [sign_enveloped] against the
/// certificate embedded in it.
pub fn verify_enveloped(xml: &str) -> Result<(), SigningError> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| SigningError::MalformedXml(e.to_string()))?;
    let signature = doc
        .root_element()
        .children()
        .find(|n| n.has_tag_name((DSIG_NS, "Signature")))
        .ok_or(SigningError::MissingSignaturePart("Signature"))?;
    let text_of = |name: &'static str| {
        signature
            .descendants()
            .find(|n| n.has_tag_name((DSIG_NS, name)))
            .and_then(|n| n.text())
            .map(str::trim)
            .ok_or(SigningError::MissingSignaturePart(name))
    };

    let reference_uri = signature
        .descendants()
        .find(|n| n.has_tag_name((DSIG_NS, "Reference")))
        .and_then(|n| n.attribute("URI"))
        .ok_or(SigningError::MissingSignaturePart("Reference"))?;
    if !reference_uri.is_empty() {
        return Err(SigningError::MissingSignaturePart("Reference URI=\"\""));
    }

    let digest = crypto::sha1_base64(referenced_content(xml)?.as_bytes())?;
    if digest != text_of("DigestValue")? {
        return Err(SigningError::DigestMismatch);
    }

    let certificate = base64::decode(text_of("X509Certificate")?)?;
    let certificate =
        X509::from_der(&certificate).map_err(SigningError::InvalidCertificate)?;
    let canonical_signed_info = c14n::canonicalize_with(
        xml,
        &Options {
            subtree: Some(SIGNED_INFO),
            exclude: None,
        },
    )?;
    let public_key = certificate.public_key()?;
    if crypto::verify(
        &*public_key,
        canonical_signed_info.as_bytes(),
        text_of("SignatureValue")?,
    )? {
        Ok(())
    } else {
        Err(SigningError::KeyMismatch)
    }
}
