use quick_xml::events::Event;
use quick_xml::reader::Reader;
use sdsim_common::{Diagnostic, ErrorCode, Span};

/// A generic, already-fully-read XML element: tag name, attributes,
/// children, and the concatenation of its direct text content.
/// Mirrors the `NodeBuilder` tree the original loader builds before
/// walking it a second time to extract the XMILE-specific shape -
/// parsing and interpretation stay separate passes here too.
pub struct XmlNode {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
    pub text: String,
}

impl XmlNode {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn text_of(&self, name: &str) -> Option<&str> {
        self.child(name).filter(|c| !c.text.is_empty()).map(|c| c.text.as_str())
    }
}

fn bad_xml(reason: impl Into<String>) -> Diagnostic {
    Diagnostic::new(ErrorCode::BadXml, reason, Span::empty())
}

/// Reads the whole document into one `XmlNode` tree, rooted at the
/// document's single top-level element. A document with no element,
/// or mismatched start/end tags, is a `BadXml` diagnostic.
pub fn parse_tree(xml: &str) -> Result<XmlNode, Diagnostic> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlNode> = vec![];
    let mut root: Option<XmlNode> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(|e| bad_xml(e.to_string()))? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let attrs = read_attrs(&e)?;
                stack.push(XmlNode {
                    name,
                    attrs,
                    children: vec![],
                    text: String::new(),
                });
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let attrs = read_attrs(&e)?;
                let node = XmlNode {
                    name,
                    attrs,
                    children: vec![],
                    text: String::new(),
                };
                push_finished(&mut stack, &mut root, node);
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let node = stack.pop().ok_or_else(|| bad_xml(format!("unmatched closing tag `{}`", name)))?;
                if node.name != name {
                    return Err(bad_xml(format!(
                        "mismatched closing tag: expected `{}`, found `{}`",
                        node.name, name
                    )));
                }
                push_finished(&mut stack, &mut root, node);
            }
            Event::Text(e) => {
                let text = e.unescape().unwrap_or_default().into_owned();
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(text.trim());
                }
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(text.trim());
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    root.ok_or_else(|| bad_xml("empty document"))
}

fn push_finished(stack: &mut Vec<XmlNode>, root: &mut Option<XmlNode>, node: XmlNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => *root = Some(node),
    }
}

fn read_attrs(e: &quick_xml::events::BytesStart) -> Result<Vec<(String, String)>, Diagnostic> {
    let mut attrs = vec![];
    for attr in e.attributes() {
        let attr = attr.map_err(|err| bad_xml(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| bad_xml(err.to_string()))?
            .into_owned();
        attrs.push((key, value));
    }
    Ok(attrs)
}
