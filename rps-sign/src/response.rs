//! Parsing of the authority's SOAP replies.
//!
//! The interesting part of a reply is an escaped XML document inside
//! `<RetornoXML>`. It is turned into a [ResponseTree]: leaf elements become
//! strings, other elements nested trees, and siblings sharing a name an
//! ordered sequence.
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::error::ParseError;

const OPEN_MARKER: &str = "<RetornoXML>";
const CLOSE_MARKER: &str = "</RetornoXML>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseValue {
    Scalar(String),
    Node(ResponseTree),
    Sequence(Vec<ResponseValue>),
}

impl ResponseValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_tree(&self) -> Option<&ResponseTree> {
        match self {
            Self::Node(tree) => Some(tree),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[ResponseValue]> {
        match self {
            Self::Sequence(values) => Some(values),
            _ => None,
        }
    }
}

/// Element names mapped to their values, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseTree {
    entries: Vec<(String, ResponseValue)>,
}

impl ResponseTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value` under `name`. A name seen before at this level turns into
    /// a sequence holding every value in insertion order.
    pub fn insert(&mut self, name: &str, value: ResponseValue) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some((_, ResponseValue::Sequence(values))) => values.push(value),
            Some((_, existing)) => {
                let first = std::mem::replace(existing, ResponseValue::Sequence(Vec::new()));
                *existing = ResponseValue::Sequence(vec![first, value]);
            }
            None => self.entries.push((name.to_owned(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ResponseValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResponseValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ResponseTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl Serialize for ResponseValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Scalar(s) => serializer.serialize_str(s),
            Self::Node(tree) => tree.serialize(serializer),
            Self::Sequence(values) => {
                let mut seq = serializer.serialize_seq(Some(values.len()))?;
                for value in values {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
        }
    }
}

/// The still escaped payload between the `RetornoXML` markers.
fn embedded_payload(body: &str) -> Result<&str, ParseError> {
    let start = body.find(OPEN_MARKER).ok_or(ParseError::MissingMarkers)? + OPEN_MARKER.len();
    let len = body[start..]
        .find(CLOSE_MARKER)
        .ok_or(ParseError::MissingMarkers)?;
    Ok(&body[start..start + len])
}

/// Parse a SOAP reply body into a [ResponseTree] whose single top-level entry
/// is the document element of the embedded result.
///
/// Keys are local names: a prefixed `<p:Alerta>` is keyed `Alerta`. The
/// authority's replies put everything in the default namespace, so their keys
/// are the names as written.
pub fn parse(body: &str) -> Result<ResponseTree, ParseError> {
    let payload = quick_xml::escape::unescape(embedded_payload(body)?)?;
    let doc = roxmltree::Document::parse(&payload)?;

    let root = doc.root_element();
    let mut tree = ResponseTree::new();
    tree.insert(root.tag_name().name(), convert(root));
    tracing::debug!(root = root.tag_name().name(), "parsed response");
    Ok(tree)
}

fn convert(node: roxmltree::Node<'_, '_>) -> ResponseValue {
    let mut children = node.children();
    if let (Some(only), None) = (children.next(), children.next()) {
        if only.is_text() {
            return ResponseValue::Scalar(only.text().unwrap_or_default().to_owned());
        }
    }

    let mut tree = ResponseTree::new();
    for child in node.children().filter(|n| n.is_element()) {
        tree.insert(child.tag_name().name(), convert(child));
    }
    ResponseValue::Node(tree)
}
