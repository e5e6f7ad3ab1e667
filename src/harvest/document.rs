//! Owned XML element tree.
//!
//! `roxmltree` documents borrow their source text, which makes them awkward
//! to hand from the parse stage to the extract stage. Parsing copies the
//! element structure into [`XmlDocument`], which owns everything it needs.

use roxmltree::{Node, ParsingOptions};
use thiserror::Error;

/// Deepest element nesting accepted. The parser recurses once per level, so
/// anything deeper is rejected before it reaches the parser.
pub const MAX_ELEMENT_DEPTH: usize = 256;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error(transparent)]
    Xml(#[from] roxmltree::Error),

    #[error("Elements nested deeper than {0} levels")]
    TooDeep(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub namespace: Option<String>,
    pub name: String,
    /// Attributes without a namespace, in document order.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    pub root: XmlElement,
}

impl XmlDocument {
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        let text = text.trim_start_matches('\u{feff}');
        if nesting_exceeds(text.as_bytes(), MAX_ELEMENT_DEPTH) {
            return Err(DocumentError::TooDeep(MAX_ELEMENT_DEPTH));
        }
        let mut options = ParsingOptions::default();
        options.allow_dtd = true;
        let document = roxmltree::Document::parse_with_options(text, options)?;
        Ok(Self {
            root: XmlElement::from_node(document.root_element()),
        })
    }

    /// Every element in the document, root included, in document order.
    pub fn descendants(&self) -> Descendants<'_> {
        self.root.descendants()
    }

    /// Descendant elements with the given namespace and local name.
    pub fn descendants_named<'a>(
        &'a self,
        namespace: Option<&'a str>,
        name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.descendants().filter(move |e| e.is_named(namespace, name))
    }
}

impl XmlElement {
    fn from_node(node: Node<'_, '_>) -> Self {
        let tag = node.tag_name();
        Self {
            namespace: tag.namespace().map(str::to_string),
            name: tag.name().to_string(),
            attributes: node
                .attributes()
                .filter(|a| a.namespace().is_none())
                .map(|a| (a.name().to_string(), a.value().to_string()))
                .collect(),
            children: node
                .children()
                .filter(Node::is_element)
                .map(XmlElement::from_node)
                .collect(),
        }
    }

    pub fn is_named(&self, namespace: Option<&str>, name: &str) -> bool {
        self.namespace.as_deref() == namespace && self.name == name
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Direct children with the given namespace and local name.
    pub fn children_named<'a>(
        &'a self,
        namespace: Option<&'a str>,
        name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children
            .iter()
            .filter(move |e| e.is_named(namespace, name))
    }

    /// First direct child with the given namespace and local name.
    pub fn child(&self, namespace: Option<&str>, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|e| e.is_named(namespace, name))
    }

    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }
}

/// Cheap tag scan that reports whether element nesting goes past `limit`.
///
/// Comments, CDATA, processing instructions and declarations are skipped, and
/// `>` inside quoted attribute values does not end a tag. Malformed input is
/// left for the parser to reject.
fn nesting_exceeds(text: &[u8], limit: usize) -> bool {
    let mut depth = 0usize;
    let mut pos = 0;

    while let Some(offset) = text[pos..].iter().position(|&b| b == b'<') {
        let start = pos + offset;
        let rest = &text[start..];

        pos = if rest.starts_with(b"<!--") {
            skip_past(text, start + 4, b"-->")
        } else if rest.starts_with(b"<![CDATA[") {
            skip_past(text, start + 9, b"]]>")
        } else if rest.starts_with(b"<?") {
            skip_past(text, start + 2, b"?>")
        } else if rest.starts_with(b"<!") {
            start + 2
        } else if rest.starts_with(b"</") {
            depth = depth.saturating_sub(1);
            start + 2
        } else {
            let (end, self_closing) = start_tag_end(text, start + 1);
            if !self_closing {
                depth += 1;
                if depth > limit {
                    return true;
                }
            }
            end
        };
    }

    false
}

fn skip_past(text: &[u8], from: usize, terminator: &[u8]) -> usize {
    text[from.min(text.len())..]
        .windows(terminator.len())
        .position(|window| window == terminator)
        .map_or(text.len(), |offset| from + offset + terminator.len())
}

/// Index just past the `>` closing a start tag, and whether it was `/>`.
fn start_tag_end(text: &[u8], from: usize) -> (usize, bool) {
    let mut quote = None;
    for (i, &b) in text.iter().enumerate().skip(from) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return (i + 1, i > from && text[i - 1] == b'/'),
            None => {}
        }
    }
    (text.len(), true)
}

/// Pre-order walk over an element and everything below it.
pub struct Descendants<'a> {
    stack: Vec<&'a XmlElement>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a XmlElement;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack.extend(next.children.iter().rev());
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_structure_and_namespaces() {
        let doc = XmlDocument::parse(
            r#"<?xml version="1.0" encoding="utf-8"?>
            <configuration>
              <runtime>
                <assemblyBinding xmlns="urn:schemas-microsoft-com:asm.v1">
                  <dependentAssembly>
                    <assemblyIdentity name="System.Foo" culture="neutral" />
                  </dependentAssembly>
                </assemblyBinding>
              </runtime>
            </configuration>"#,
        )
        .unwrap();

        assert_eq!(doc.root.name, "configuration");
        assert_eq!(doc.root.namespace, None);

        let ns = Some("urn:schemas-microsoft-com:asm.v1");
        let binding: Vec<_> = doc.descendants_named(ns, "assemblyBinding").collect();
        assert_eq!(binding.len(), 1);

        let identity = binding[0]
            .child(ns, "dependentAssembly")
            .and_then(|d| d.child(ns, "assemblyIdentity"))
            .unwrap();
        assert_eq!(identity.attribute("name"), Some("System.Foo"));
        assert_eq!(identity.attribute("missing"), None);

        // Namespaced elements do not match a namespace-less lookup.
        assert_eq!(doc.descendants_named(None, "assemblyBinding").count(), 0);
    }

    #[test]
    fn test_descendants_are_pre_order() {
        let doc = XmlDocument::parse("<a><b><c/></b><d/></a>").unwrap();
        let names: Vec<&str> = doc.descendants().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_byte_order_mark_and_dtd_accepted() {
        let doc = XmlDocument::parse("\u{feff}<!DOCTYPE packages><packages/>").unwrap();
        assert_eq!(doc.root.name, "packages");
    }

    #[test]
    fn test_malformed_input_is_an_error() {
        assert!(XmlDocument::parse("<Project><ItemGroup></Project>").is_err());
        assert!(XmlDocument::parse("not xml at all").is_err());
        assert!(XmlDocument::parse("").is_err());
    }

    fn nested(depth: usize) -> String {
        format!("{}{}", "<a>".repeat(depth), "</a>".repeat(depth))
    }

    #[test]
    fn test_deeply_nested_document_is_rejected() {
        // Runs on a worker-sized stack; the parser alone overflows it at this depth.
        let outcome = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(|| XmlDocument::parse(&nested(10_000)).map(|_| ()))
            .unwrap()
            .join()
            .unwrap();

        assert!(matches!(outcome, Err(DocumentError::TooDeep(MAX_ELEMENT_DEPTH))));
    }

    #[test]
    fn test_nesting_at_limit_parses() {
        assert!(XmlDocument::parse(&nested(MAX_ELEMENT_DEPTH)).is_ok());
        assert!(matches!(
            XmlDocument::parse(&nested(MAX_ELEMENT_DEPTH + 1)),
            Err(DocumentError::TooDeep(_))
        ));
    }

    #[test]
    fn test_depth_scan_ignores_markup_that_is_not_an_element() {
        assert!(!nesting_exceeds(b"<a><b/><c x='>'/></a>", 1));
        assert!(!nesting_exceeds(b"<a><!-- <b><c> --><![CDATA[<d><e>]]></a>", 1));
        assert!(!nesting_exceeds(b"<?xml version=\"1.0\"?><!DOCTYPE a><a/>", 0));
        assert!(nesting_exceeds(b"<a><b></b></a>", 1));
        assert!(!nesting_exceeds(b"<a></a><b></b>", 1));
    }
}
