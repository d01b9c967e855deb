// Exclusive [XML canonicalization](https://www.w3.org/TR/xml-exc-c14n/),
// without comments and without an InclusiveNamespaces prefix list, done by
// libxml2.
use std::{
    convert::TryFrom,
    ffi::CStr,
    os::raw::{c_char, c_int},
    ptr,
};

use libxml::{
    bindings,
    parser::Parser,
    tree::{
        c14n::{CanonicalizationMode, CanonicalizationOptions},
        Document, Node,
    },
};

use crate::error::SigningError;

/// Element selector by namespace URI and local name.
#[derive(Debug, Clone, Copy)]
pub struct Match<'a> {
    pub namespace: &'a str,
    pub name: &'a str,
}

impl Match<'_> {
    fn matches(&self, node: &Node) -> bool {
        node.get_name() == self.name
            && node
                .get_namespace()
                .map_or(false, |ns| ns.get_href() == self.namespace)
    }
}

/// Which part of the document is canonicalized.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options<'a> {
    /// Only output the first element matching this (and its content) instead
    /// of the whole document.
    pub subtree: Option<Match<'a>>,
    /// Leave out elements matching this, with everything inside them. This is
    /// the enveloped-signature transform when it matches `ds:Signature`.
    pub exclude: Option<Match<'a>>,
}

/// Canonical form of the whole document.
pub fn canonicalize(xml: &str) -> Result<String, SigningError> {
    canonicalize_with(xml, &Options::default())
}

pub fn canonicalize_with(xml: &str, options: &Options<'_>) -> Result<String, SigningError> {
    let document = parse(xml)?;
    let root = document
        .get_root_element()
        .ok_or_else(|| SigningError::MalformedXml("no document element".into()))?;

    let mut kept = Vec::new();
    let mut excluded = Vec::new();
    walk(root, options.exclude, &mut kept, &mut excluded);
    for element in &kept {
        check_prefixes(element)?;
    }
    for element in &mut excluded {
        element.unlink();
    }

    let c14n_options = CanonicalizationOptions {
        mode: CanonicalizationMode::ExclusiveCanonical1_0,
        inclusive_ns_prefixes: vec![],
        with_comments: false,
    };
    let canonical = match options.subtree {
        Some(m) => {
            // The node must be the only handle on its element for libxml to
            // hand out its pointer.
            let mut node = kept.into_iter().find(|e| m.matches(e)).ok_or_else(|| {
                SigningError::MalformedXml(format!(
                    "no <{}> element in namespace {:?}",
                    m.name, m.namespace
                ))
            })?;
            node.canonicalize(c14n_options)
        }
        None => document.canonicalize(c14n_options, None),
    };
    canonical.map_err(|()| SigningError::MalformedXml("libxml2 failed to canonicalize".into()))
}

fn parse(xml: &str) -> Result<Document, SigningError> {
    // Makes sure libxml2 is initialized.
    let _ = Parser::default();

    let len = c_int::try_from(xml.len())
        .map_err(|_| SigningError::MalformedXml("document too large".into()))?;
    // DTD attribute defaults are part of the canonical form. No recovery:
    // anything not well-formed is rejected.
    let flags = (bindings::xmlParserOption_XML_PARSE_DTDATTR
        | bindings::xmlParserOption_XML_PARSE_NONET
        | bindings::xmlParserOption_XML_PARSE_NOERROR
        | bindings::xmlParserOption_XML_PARSE_NOWARNING) as c_int;

    // SAFETY: `xml` outlives the call and libxml2 copies what it keeps.
    let doc = unsafe {
        bindings::xmlReadMemory(
            xml.as_ptr() as *const c_char,
            len,
            ptr::null(),
            ptr::null(),
            flags,
        )
    };
    if doc.is_null() {
        return Err(SigningError::MalformedXml(last_error()));
    }
    Ok(Document::new_ptr(doc))
}

fn last_error() -> String {
    // SAFETY: libxml2 owns the error, it is only read here.
    unsafe {
        let error = bindings::xmlGetLastError();
        if error.is_null() || (*error).message.is_null() {
            return "not well-formed".into();
        }
        CStr::from_ptr((*error).message)
            .to_string_lossy()
            .trim_end()
            .to_owned()
    }
}

// Elements in document order, except those matching `exclude` which are
// collected on their own without descending into them.
fn walk(node: Node, exclude: Option<Match<'_>>, kept: &mut Vec<Node>, excluded: &mut Vec<Node>) {
    if exclude.map_or(false, |m| m.matches(&node)) {
        excluded.push(node);
        return;
    }
    let children = node.get_child_elements();
    kept.push(node);
    for child in children {
        walk(child, exclude, kept, excluded);
    }
}

// libxml2 only warns about undeclared prefixes and keeps the qualified name
// without a namespace.
fn check_prefixes(element: &Node) -> Result<(), SigningError> {
    let unbound = |name: &str| {
        SigningError::MalformedXml(format!("namespace prefix of {} is not declared", name))
    };
    let name = element.get_name();
    if name.contains(':') && element.get_namespace().is_none() {
        return Err(unbound(&name));
    }
    for (name, namespace) in element.get_attributes_ns().keys() {
        if name.contains(':') && namespace.is_none() {
            return Err(unbound(name));
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    const DS: &str = "http://www.w3.org/2000/09/xmldsig#";

    #[test]
    fn test_sorts_attributes_and_drops_comments() {
        let out = canonicalize(r#"<e b="2" a="1"><!--c--><child/></e>"#).unwrap();
        assert_eq!(out, r#"<e a="1" b="2"><child></child></e>"#);
    }

    #[test]
    fn test_drops_declaration_and_outer_whitespace() {
        let xml = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<a>\n  <b>x</b>\n</a>\n";
        assert_eq!(canonicalize(xml).unwrap(), "<a>\n  <b>x</b>\n</a>");
    }

    #[test]
    fn test_unused_namespaces_are_dropped() {
        let xml = r#"<p:Pedido xmlns:p="urn:p" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema"><Cabecalho Versao="1"/></p:Pedido>"#;
        assert_eq!(
            canonicalize(xml).unwrap(),
            r#"<p:Pedido xmlns:p="urn:p"><Cabecalho Versao="1"></Cabecalho></p:Pedido>"#
        );
    }

    #[test]
    fn test_default_namespace_reset() {
        let xml = r#"<PedidoEnvioRPS xmlns="http://www.prefeitura.sp.gov.br/nfe"><Cabecalho xmlns="" Versao="1"><CNPJ>1</CNPJ></Cabecalho></PedidoEnvioRPS>"#;
        assert_eq!(
            canonicalize(xml).unwrap(),
            r#"<PedidoEnvioRPS xmlns="http://www.prefeitura.sp.gov.br/nfe"><Cabecalho xmlns="" Versao="1"><CNPJ>1</CNPJ></Cabecalho></PedidoEnvioRPS>"#
        );
    }

    #[test]
    fn test_empty_default_namespace_not_emitted_at_top() {
        let xml = r#"<a xmlns=""><b/></a>"#;
        assert_eq!(canonicalize(xml).unwrap(), "<a><b></b></a>");
    }

    #[test]
    fn test_namespace_pushed_down_to_where_it_is_used() {
        let xml = r#"<a xmlns:n="urn:n"><b><n:c n:x="1" y="2"/></b></a>"#;
        assert_eq!(
            canonicalize(xml).unwrap(),
            r#"<a><b><n:c xmlns:n="urn:n" y="2" n:x="1"></n:c></b></a>"#
        );
    }

    #[test]
    fn test_escaping() {
        let xml = "<a t=\"&lt;&amp;&quot;&#9;x\">1 &lt; 2 &amp;&amp; 3 &gt; 2 &#13;</a>";
        assert_eq!(
            canonicalize(xml).unwrap(),
            "<a t=\"&lt;&amp;&quot;&#x9;x\">1 &lt; 2 &amp;&amp; 3 &gt; 2 &#xD;</a>"
        );
    }

    #[test]
    fn test_attribute_whitespace_is_normalized() {
        let xml = "<a t=\"x\ny\tz\"/>";
        assert_eq!(canonicalize(xml).unwrap(), "<a t=\"x y z\"></a>");
    }

    #[test]
    fn test_cdata_becomes_text() {
        let xml = "<a><![CDATA[x < y & z]]></a>";
        assert_eq!(canonicalize(xml).unwrap(), "<a>x &lt; y &amp; z</a>");
    }

    #[test]
    fn test_line_endings_are_normalized() {
        assert_eq!(canonicalize("<a>x\r\ny\rz</a>").unwrap(), "<a>x\ny\nz</a>");
    }

    #[test]
    fn test_subtree_gets_its_namespace() {
        let xml = format!(
            r#"<Root xmlns="urn:r"><Signature xmlns="{}"><SignedInfo><Reference URI=""/></SignedInfo><SignatureValue>x</SignatureValue></Signature></Root>"#,
            DS
        );
        let options = Options {
            subtree: Some(Match {
                namespace: DS,
                name: "SignedInfo",
            }),
            exclude: None,
        };
        assert_eq!(
            canonicalize_with(&xml, &options).unwrap(),
            format!(
                r#"<SignedInfo xmlns="{}"><Reference URI=""></Reference></SignedInfo>"#,
                DS
            )
        );
    }

    #[test]
    fn test_excluded_element_is_left_out() {
        let xml = format!(
            r#"<Root><A>1</A><Signature xmlns="{}"><SignatureValue>x</SignatureValue></Signature></Root>"#,
            DS
        );
        let options = Options {
            subtree: None,
            exclude: Some(Match {
                namespace: DS,
                name: "Signature",
            }),
        };
        assert_eq!(
            canonicalize_with(&xml, &options).unwrap(),
            "<Root><A>1</A></Root>"
        );
    }

    #[test]
    fn test_processing_instructions_around_root() {
        let xml = "<?a x?><r><?b  y?></r><?c?>";
        assert_eq!(canonicalize(xml).unwrap(), "<?a x?>\n<r><?b y?></r>\n<?c?>");
    }

    #[test]
    fn test_dtd_default_attributes_are_included() {
        let xml = r#"<!DOCTYPE a [<!ATTLIST a d CDATA "def">]><a/>"#;
        assert_eq!(canonicalize(xml).unwrap(), r#"<a d="def"></a>"#);
    }

    #[test]
    fn test_missing_subtree() {
        let options = Options {
            subtree: Some(Match {
                namespace: DS,
                name: "SignedInfo",
            }),
            exclude: None,
        };
        let err = canonicalize_with("<a><SignedInfo/></a>", &options).unwrap_err();
        assert!(matches!(err, SigningError::MalformedXml(_)));
    }

    #[test]
    fn test_malformed_documents() {
        for xml in &[
            "<a><b></a>",
            "<a>",
            "<a/><b/>",
            "",
            "text<a/>",
            "<p:a/>",
            r#"<a q:x="1"/>"#,
            "<a>&unknown;</a>",
        ] {
            let err = canonicalize(xml).unwrap_err();
            assert!(
                matches!(err, SigningError::MalformedXml(_)),
                "{:?} gave {:?}",
                xml,
                err
            );
        }
    }
}
